/// Registration policy
///
/// Deployment-level switches for the registration flow: which email domain
/// may register, whether an institutional id is required, and how the
/// email address is verified.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Number of digits in an institutional id
pub const INSTITUTIONAL_ID_DIGITS: usize = 9;

/// How a registration proves control of its email address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMode {
    /// A six-digit code is mailed and typed back in
    Code,

    /// A signed link is mailed and clicked
    Link,
}

impl FromStr for VerificationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "code" | "otp" => Ok(VerificationMode::Code),
            "link" => Ok(VerificationMode::Link),
            other => Err(format!("unknown verification mode '{other}' (expected code or link)")),
        }
    }
}

/// Registration settings
#[derive(Debug, Clone)]
pub struct RegistrationPolicy {
    /// Required email domain, e.g. `cit.edu`
    pub email_domain: Option<String>,

    /// Whether the form must carry a 9-digit institutional id
    pub require_institutional_id: bool,

    pub verification: VerificationMode,

    /// Lifetime of a mailed code
    pub code_ttl: Duration,

    /// Lifetime of a mailed link
    pub link_ttl: Duration,

    /// Absolute URL of `/auth/callback`, used in link mode
    pub callback_url: String,
}

impl Default for RegistrationPolicy {
    fn default() -> Self {
        Self {
            email_domain: None,
            require_institutional_id: false,
            verification: VerificationMode::Code,
            code_ttl: Duration::minutes(10),
            link_ttl: Duration::hours(24),
            callback_url: "http://localhost:8080/auth/callback".to_string(),
        }
    }
}

impl RegistrationPolicy {
    /// True if `email` (already lowercased) satisfies the domain policy
    pub fn email_allowed(&self, email: &str) -> bool {
        match &self.email_domain {
            Some(domain) => {
                let domain = domain.trim_start_matches('@').to_ascii_lowercase();
                email.ends_with(&format!("@{domain}"))
            }
            None => true,
        }
    }
}

/// Normalizes an institutional id to `XX-XXXX-XXX`
///
/// Dashes and whitespace are removed; what remains must be exactly nine
/// ASCII digits. Returns `None` otherwise.
pub fn normalize_institutional_id(raw: &str) -> Option<String> {
    let digits: String = raw
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect();

    if digits.len() != INSTITUTIONAL_ID_DIGITS || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    Some(format!("{}-{}-{}", &digits[0..2], &digits[2..6], &digits[6..9]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_plain_digits() {
        assert_eq!(
            normalize_institutional_id("123456789").as_deref(),
            Some("12-3456-789")
        );
    }

    #[test]
    fn test_normalize_strips_separators() {
        assert_eq!(
            normalize_institutional_id(" 12-3456 789 ").as_deref(),
            Some("12-3456-789")
        );
        assert_eq!(
            normalize_institutional_id("1-2-3-4-5-6-7-8-9").as_deref(),
            Some("12-3456-789")
        );
    }

    #[test]
    fn test_normalize_rejects_wrong_length() {
        assert_eq!(normalize_institutional_id("12345678"), None);
        assert_eq!(normalize_institutional_id("1234567890"), None);
        assert_eq!(normalize_institutional_id(""), None);
    }

    #[test]
    fn test_normalize_rejects_non_digits() {
        assert_eq!(normalize_institutional_id("12-3456-78a"), None);
        assert_eq!(normalize_institutional_id("１２３４５６７８９"), None);
    }

    #[test]
    fn test_email_domain() {
        let policy = RegistrationPolicy {
            email_domain: Some("cit.edu".to_string()),
            ..Default::default()
        };

        assert!(policy.email_allowed("ada@cit.edu"));
        assert!(!policy.email_allowed("ada@notcit.edu"));
        assert!(!policy.email_allowed("ada@cit.edu.evil.com"));
        assert!(RegistrationPolicy::default().email_allowed("ada@anything.org"));
    }

    #[test]
    fn test_verification_mode_parse() {
        assert_eq!("code".parse::<VerificationMode>().unwrap(), VerificationMode::Code);
        assert_eq!(" LINK ".parse::<VerificationMode>().unwrap(), VerificationMode::Link);
        assert!("sms".parse::<VerificationMode>().is_err());
    }
}
