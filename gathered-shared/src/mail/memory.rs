use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{Email, MailError, Mailer};

/// Keeps sent messages in memory
///
/// Clones share the same outbox, so a test can keep one handle while the
/// application owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryMailer {
    outbox: Arc<Mutex<Vec<Email>>>,
    fail: Arc<AtomicBool>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `send` fail with a delivery error
    pub fn fail_deliveries(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// All messages sent so far
    pub async fn sent(&self) -> Vec<Email> {
        self.outbox.lock().await.clone()
    }

    /// Most recent message addressed to `to`
    pub async fn last_to(&self, to: &str) -> Option<Email> {
        self.outbox
            .lock()
            .await
            .iter()
            .rev()
            .find(|email| email.to == to)
            .cloned()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MailError::Delivery("simulated outage".to_string()));
        }
        self.outbox.lock().await.push(email);
        Ok(())
    }
}
