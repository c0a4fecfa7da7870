//! Outbound mail port.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum MailError {
    #[error("email delivery failed: {0}")]
    Delivery(String),
}

/// Delivers mail. Implementations should be time-bounded; the flows treat a
/// slow relay the same as a failed one.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}
