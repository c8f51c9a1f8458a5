/// Outbound email
///
/// Delivery sits behind the [`Mailer`] trait so the registration flow never
/// knows which provider is configured.
///
/// # Implementations
///
/// - [`LogMailer`]: writes messages to the log (development)
/// - [`HttpMailer`]: posts to a Brevo-style transactional email API
/// - [`MemoryMailer`]: keeps an outbox in memory (tests)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod http;
pub mod log;
pub mod memory;
pub mod messages;

pub use http::{HttpMailer, HttpMailerConfig};
pub use log::LogMailer;
pub use memory::MemoryMailer;

/// Error type for mail delivery
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// Provider settings are missing or invalid
    #[error("Mailer not configured: {0}")]
    NotConfigured(String),

    /// Provider rejected or failed to accept the message
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// A single outbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    /// Recipient address
    pub to: String,

    /// Recipient display name
    pub to_name: Option<String>,

    /// Subject line
    pub subject: String,

    /// Plain-text body
    pub text: String,

    /// Optional HTML body
    pub html: Option<String>,
}

/// Message delivery
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Hands one message to the provider
    async fn send(&self, email: Email) -> Result<(), MailError>;
}
