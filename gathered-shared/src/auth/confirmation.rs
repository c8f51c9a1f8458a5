/// Emailed confirmation links
///
/// A confirmation link is `<callback_url>?token=<jwt>` where the token is a
/// [`TokenType::Confirmation`] JWT whose subject is the unverified identity.
/// Redeeming the link validates the token and yields that identity id.

use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::jwt::{create_token, validate_token, Claims, JwtError, TokenType};
use crate::mail::{messages, MailError, Mailer};

/// Error type for confirmation links
#[derive(Debug, thiserror::Error)]
pub enum ConfirmationError {
    /// Token could not be minted or did not validate
    #[error(transparent)]
    Token(#[from] JwtError),

    /// The link email could not be delivered
    #[error(transparent)]
    Mail(#[from] MailError),
}

/// Issues and redeems confirmation links
#[derive(Clone)]
pub struct ConfirmationLinks {
    secret: String,
    mailer: Arc<dyn Mailer>,
    ttl: Duration,
}

impl ConfirmationLinks {
    pub fn new(secret: impl Into<String>, mailer: Arc<dyn Mailer>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            mailer,
            ttl,
        }
    }

    /// Builds the link for an identity without sending it
    pub fn link_for(&self, identity_id: Uuid, callback_url: &str) -> Result<String, JwtError> {
        let claims = Claims::confirmation(identity_id, self.ttl);
        let token = create_token(&claims, &self.secret)?;

        let separator = if callback_url.contains('?') { '&' } else { '?' };
        Ok(format!("{callback_url}{separator}token={token}"))
    }

    /// Mails a fresh link to `email`
    pub async fn issue(
        &self,
        identity_id: Uuid,
        email: &str,
        callback_url: &str,
    ) -> Result<(), ConfirmationError> {
        let link = self.link_for(identity_id, callback_url)?;
        let message = messages::confirmation_link(email, &link, self.ttl.num_hours());

        self.mailer.send(message).await.map_err(|e| {
            warn!(identity_id = %identity_id, error = %e, "Confirmation link not delivered");
            e
        })?;

        debug!(identity_id = %identity_id, "Confirmation link sent");
        Ok(())
    }

    /// Validates a link token and returns the identity it confirms
    pub fn redeem(&self, token: &str) -> Result<Uuid, JwtError> {
        let claims = validate_token(token, &self.secret, TokenType::Confirmation)?;
        Ok(claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::MemoryMailer;

    const SECRET: &str = "confirmation-secret-at-least-32-bytes";

    fn links(mailer: &MemoryMailer, ttl: Duration) -> ConfirmationLinks {
        ConfirmationLinks::new(SECRET, Arc::new(mailer.clone()), ttl)
    }

    #[tokio::test]
    async fn test_issue_and_redeem() {
        let mailer = MemoryMailer::new();
        let links = links(&mailer, Duration::hours(24));
        let id = Uuid::new_v4();

        links
            .issue(id, "ada@cit.edu", "http://localhost:8080/auth/callback")
            .await
            .unwrap();

        let email = mailer.last_to("ada@cit.edu").await.expect("link mailed");
        let token = email
            .text
            .split("token=")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .unwrap();

        assert_eq!(links.redeem(token).unwrap(), id);
    }

    #[test]
    fn test_link_keeps_existing_query() {
        let links = links(&MemoryMailer::new(), Duration::hours(1));
        let link = links
            .link_for(Uuid::new_v4(), "http://localhost/cb?next=1")
            .unwrap();

        assert!(link.starts_with("http://localhost/cb?next=1&token="));
    }

    #[test]
    fn test_expired_link_rejected() {
        let links = links(&MemoryMailer::new(), Duration::hours(-2));
        let link = links.link_for(Uuid::new_v4(), "http://x/cb").unwrap();
        let token = link.split("token=").nth(1).unwrap();

        assert!(matches!(links.redeem(token), Err(JwtError::Expired)));
    }

    #[tokio::test]
    async fn test_delivery_failure_surfaces() {
        let mailer = MemoryMailer::new();
        mailer.fail_deliveries(true);
        let links = links(&mailer, Duration::hours(1));

        let result = links.issue(Uuid::new_v4(), "a@x.edu", "http://x/cb").await;
        assert!(matches!(result, Err(ConfirmationError::Mail(_))));
    }
}
