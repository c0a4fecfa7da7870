//! HTTP mail-relay adapter.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use kardex_accounts::mailer::{MailError, Mailer};

/// Delivery timeout; the sign-up path treats a slow relay as a failure
/// rather than holding the request open.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Mailer that posts messages to an HTTP mail-relay API.
#[derive(Clone)]
pub struct HttpMailer {
    http: reqwest::Client,
    api_url: String,
    api_token: String,
    from: String,
}

impl HttpMailer {
    pub fn new(
        api_url: impl Into<String>,
        api_token: impl Into<String>,
        from: impl Into<String>,
    ) -> Result<Self, MailError> {
        let http = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| MailError::Delivery(e.to_string()))?;

        Ok(Self {
            http,
            api_url: api_url.into(),
            api_token: api_token.into(),
            from: from.into(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_token)
            .json(&json!({
                "from": self.from,
                "to": to,
                "subject": subject,
                "text": body,
            }))
            .send()
            .await
            .map_err(|e| MailError::Delivery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MailError::Delivery(format!(
                "relay returned {}",
                response.status()
            )));
        }

        debug!(to = %to, "mail accepted by relay");
        Ok(())
    }
}
