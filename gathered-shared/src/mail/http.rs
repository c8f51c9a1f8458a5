/// Transactional email over a JSON HTTP API
///
/// The request body follows the Brevo `/v3/smtp/email` shape:
///
/// ```json
/// {
///   "sender": { "email": "no-reply@school.edu", "name": "GatherEd" },
///   "to": [{ "email": "student@school.edu", "name": "Ada" }],
///   "subject": "GatherEd Account Confirmation",
///   "textContent": "...",
///   "htmlContent": "..."
/// }
/// ```

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{Email, MailError, Mailer};

/// Settings for [`HttpMailer`]
#[derive(Debug, Clone)]
pub struct HttpMailerConfig {
    /// Endpoint that accepts the JSON payload
    pub api_url: String,

    /// Value of the `api-key` header
    pub api_key: String,

    /// Sender address
    pub sender_email: String,

    /// Sender display name
    pub sender_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Address {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailBody {
    sender: Address,
    to: Vec<Address>,
    subject: String,
    text_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    html_content: Option<String>,
}

/// Delivers mail through an HTTP API
#[derive(Debug, Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    config: HttpMailerConfig,
}

impl HttpMailer {
    /// Builds the mailer, rejecting blank settings up front
    pub fn new(config: HttpMailerConfig) -> Result<Self, MailError> {
        for (key, value) in [
            ("MAIL_API_URL", &config.api_url),
            ("MAIL_API_KEY", &config.api_key),
            ("MAIL_SENDER_EMAIL", &config.sender_email),
        ] {
            if value.trim().is_empty() {
                return Err(MailError::NotConfigured(format!("{key} is required")));
            }
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("GatherEd/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MailError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn body(&self, email: Email) -> SendEmailBody {
        SendEmailBody {
            sender: Address {
                email: self.config.sender_email.clone(),
                name: self.config.sender_name.clone(),
            },
            to: vec![Address {
                email: email.to,
                name: email.to_name,
            }],
            subject: email.subject,
            text_content: email.text,
            html_content: email.html,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        let to = email.to.clone();
        let body = self.body(email);

        let response = self
            .client
            .post(&self.config.api_url)
            .header("api-key", &self.config.api_key)
            .header("accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| MailError::Delivery(format!("request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            debug!(to = %to, "Email accepted by provider");
            return Ok(());
        }

        let detail = response.text().await.unwrap_or_default();
        warn!(to = %to, status = %status, "Email provider rejected message");
        Err(MailError::Delivery(format!("status={status}: {detail}")))
    }
}
