pub mod email;
pub mod slack;
pub mod webhook;

pub use email::EmailChannel;
pub use slack::SlackChannel;
pub use webhook::WebhookChannel;
