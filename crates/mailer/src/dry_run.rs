use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::info;

use common::{Error, Notifier, Result};

/// Notifier for dry runs: every message is logged, nothing leaves the host.
#[derive(Default)]
pub struct LogMailer {
    sent: AtomicU64,
}

impl LogMailer {
    pub fn new() -> Self {
        info!("LogMailer initialized, notifications will only be logged");
        Self::default()
    }

    /// Number of messages "delivered" so far.
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Notifier for LogMailer {
    async fn send(&self, to: &[String], subject: &str, body: &str) -> Result<String> {
        if to.is_empty() {
            return Err(Error::NotifierFailure("no recipients".into()));
        }

        let delivery_id = format!("dry-run-{}", uuid::Uuid::new_v4());
        info!(to = ?to, subject, body, %delivery_id, "Notification (dry run)");
        self.sent.fetch_add(1, Ordering::Relaxed);
        Ok(delivery_id)
    }
}
