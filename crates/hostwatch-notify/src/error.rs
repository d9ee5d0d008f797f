/// Errors raised while constructing the notification dispatcher.
///
/// Delivery failures are not errors at this level; they are reported
/// per channel in the dispatch report so one broken channel cannot
/// abort the others.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The SMTP relay settings could not be turned into a transport.
    #[error("Notify: invalid SMTP configuration: {0}")]
    Smtp(String),
}
