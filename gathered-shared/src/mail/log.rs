use async_trait::async_trait;
use tracing::info;

use super::{Email, MailError, Mailer};

/// Logs every message instead of sending it
///
/// Meant for local development: the verification code or link shows up in
/// the server log.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl LogMailer {
    pub fn new() -> Self {
        LogMailer
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        info!(
            to = %email.to,
            subject = %email.subject,
            body = %email.text,
            "Outbound email (log mailer, not delivered)"
        );
        Ok(())
    }
}
