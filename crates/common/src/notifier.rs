use async_trait::async_trait;

use crate::Result;

/// Outbound notification channel (email in production).
///
/// `HttpMailer` delivers through a transactional email API, `LogMailer` only
/// logs. Failures are reported as `Error::NotifierFailure`.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message to every address in `to` and return the
    /// provider's delivery id.
    async fn send(&self, to: &[String], subject: &str, body: &str) -> Result<String>;
}
