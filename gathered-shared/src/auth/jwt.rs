/// Signed token generation and validation
///
/// GatherEd signs three kinds of short statements with HS256:
///
/// - **Session**: the logged-in identity plus its resolved role and school,
///   carried in the session cookie
/// - **Pending**: points a browser at its pending registration record
/// - **Confirmation**: the token embedded in an emailed confirmation link
///
/// The `token_type` claim is always checked, so a token minted for one
/// purpose is never accepted for another.
///
/// # Example
///
/// ```
/// use gathered_shared::auth::jwt::{create_token, validate_token, Claims, TokenType};
/// use gathered_shared::models::profile::Role;
/// use chrono::Duration;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let identity_id = Uuid::new_v4();
/// let claims = Claims::session(identity_id, Role::Student, None, Duration::hours(24));
/// let token = create_token(&claims, "your-secret-key")?;
///
/// let validated = validate_token(&token, "your-secret-key", TokenType::Session)?;
/// assert_eq!(validated.sub, identity_id);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::profile::Role;

const ISSUER: &str = "gathered";

/// Error type for token operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Failed to validate token
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Token was minted for another purpose
    #[error("Wrong token type: expected {expected:?}, got {actual:?}")]
    WrongType {
        expected: TokenType,
        actual: TokenType,
    },
}

/// Token purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Logged-in browser session
    Session,

    /// Browser-held pointer to a pending registration
    Pending,

    /// Emailed confirmation link
    Confirmation,
}

/// Token claims
///
/// `sub` is the identity id for session and confirmation tokens and the
/// pending registration id for pending tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject
    pub sub: Uuid,

    /// Issuer - always "gathered"
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Token purpose
    pub token_type: TokenType,

    /// Resolved role (session tokens only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// School of the resolved profile (session tokens only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<Uuid>,
}

impl Claims {
    fn base(sub: Uuid, token_type: TokenType, expires_in: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            token_type,
            role: None,
            school_id: None,
        }
    }

    /// Session claims for a logged-in identity
    pub fn session(
        identity_id: Uuid,
        role: Role,
        school_id: Option<Uuid>,
        expires_in: Duration,
    ) -> Self {
        Self {
            role: Some(role),
            school_id,
            ..Self::base(identity_id, TokenType::Session, expires_in)
        }
    }

    /// Claims pointing at a pending registration record
    pub fn pending(pending_id: Uuid, expires_in: Duration) -> Self {
        Self::base(pending_id, TokenType::Pending, expires_in)
    }

    /// Claims for an emailed confirmation link
    pub fn confirmation(identity_id: Uuid, expires_in: Duration) -> Self {
        Self::base(identity_id, TokenType::Confirmation, expires_in)
    }

    /// Checks if the token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signs claims with HS256
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates signature, expiry, issuer and purpose
///
/// # Errors
///
/// - `JwtError::Expired` once `exp` has passed
/// - `JwtError::WrongType` if the token was minted for another purpose
/// - `JwtError::ValidationError` for anything else (bad signature, garbage)
pub fn validate_token(token: &str, secret: &str, expected: TokenType) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    let claims = token_data.claims;
    if claims.token_type != expected {
        return Err(JwtError::WrongType {
            expected,
            actual: claims.token_type,
        });
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_session_claims() {
        let id = Uuid::new_v4();
        let school = Uuid::new_v4();

        let claims = Claims::session(id, Role::Administrator, Some(school), Duration::hours(1));

        assert_eq!(claims.sub, id);
        assert_eq!(claims.iss, "gathered");
        assert_eq!(claims.token_type, TokenType::Session);
        assert_eq!(claims.role, Some(Role::Administrator));
        assert_eq!(claims.school_id, Some(school));
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_create_and_validate_session_token() {
        let id = Uuid::new_v4();
        let claims = Claims::session(id, Role::Student, None, Duration::hours(24));
        let token = create_token(&claims, SECRET).expect("Should create token");

        let validated = validate_token(&token, SECRET, TokenType::Session).expect("Should validate");
        assert_eq!(validated.sub, id);
        assert_eq!(validated.role, Some(Role::Student));
        assert_eq!(validated.school_id, None);
    }

    #[test]
    fn test_validate_with_wrong_secret() {
        let claims = Claims::pending(Uuid::new_v4(), Duration::minutes(10));
        let token = create_token(&claims, "secret1").unwrap();

        assert!(matches!(
            validate_token(&token, "wrong-secret", TokenType::Pending),
            Err(JwtError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_expired_token() {
        let claims = Claims::confirmation(Uuid::new_v4(), Duration::seconds(-3600));
        assert!(claims.is_expired());

        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(
            validate_token(&token, SECRET, TokenType::Confirmation),
            Err(JwtError::Expired)
        ));
    }

    #[test]
    fn test_token_type_is_enforced() {
        let claims = Claims::pending(Uuid::new_v4(), Duration::minutes(10));
        let token = create_token(&claims, SECRET).unwrap();

        let err = validate_token(&token, SECRET, TokenType::Session).unwrap_err();
        assert!(matches!(
            err,
            JwtError::WrongType {
                expected: TokenType::Session,
                actual: TokenType::Pending
            }
        ));
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(validate_token("not-a-token", SECRET, TokenType::Session).is_err());
    }
}
