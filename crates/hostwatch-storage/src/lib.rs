//! Durable store for alert rules, alerts, audit history, and comments.
//!
//! A single SQLite database behind a mutexed connection. The mutex plus
//! per-operation transactions give the serialization guarantees the alert
//! state machine needs: concurrent transitions on the same alert cannot
//! interleave, and the cooldown claim on a rule is a single atomic
//! check-and-set `UPDATE`.

pub mod error;
pub mod store;


pub use error::{Result, StoreError};
pub use store::alerts::{AlertFilter, AlertTransition, NewComment};
pub use store::rules::{RuleFilter, RuleUpdate};
pub use store::PanelStore;
