use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use common::{Error, Notifier, Result};

/// Sends email through a transactional email HTTP API
/// (`POST {url}` with a bearer key, JSON body, `{"id": ...}` response).
pub struct HttpMailer {
    url: String,
    api_key: String,
    from: String,
    http: Client,
}

impl HttpMailer {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        from: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            api_key: api_key.into(),
            from: from.into(),
            http,
        })
    }

    fn payload<'a>(&'a self, to: &'a [String], subject: &'a str, body: &'a str) -> EmailRequest<'a> {
        EmailRequest {
            from: &self.from,
            to,
            subject,
            text: body,
        }
    }
}

#[async_trait]
impl Notifier for HttpMailer {
    async fn send(&self, to: &[String], subject: &str, body: &str) -> Result<String> {
        if to.is_empty() {
            return Err(Error::NotifierFailure("no recipients".into()));
        }

        debug!(recipients = to.len(), subject, "Sending email");
        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&self.payload(to, subject, body))
            .send()
            .await
            .map_err(send_error)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::NotifierFailure(format!("HTTP {status}: {text}")));
        }

        // Accepted from here on; a garbled receipt does not undo the delivery.
        match resp.json::<EmailReceipt>().await {
            Ok(receipt) => Ok(receipt.id),
            Err(e) => {
                warn!(%status, error = %e, "Email accepted without a readable receipt");
                Ok(format!("unconfirmed-{}", uuid::Uuid::new_v4()))
            }
        }
    }
}

/// A request that never reached the provider failed outright. Anything that
/// broke after the request went out may still have been delivered.
fn send_error(e: reqwest::Error) -> Error {
    if e.is_connect() || e.is_builder() {
        Error::NotifierFailure(e.to_string())
    } else {
        Error::DeliveryUnknown(e.to_string())
    }
}

// ─── Wire types ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct EmailRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct EmailReceipt {
    id: String,
}
