pub mod config;
pub mod metrics;
pub mod scheduler;
pub mod seed;
