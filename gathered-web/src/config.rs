/// Configuration management for the web server
///
/// Loads configuration from environment variables (and a `.env` file when
/// present) into typed sections.
///
/// # Environment Variables
///
/// - `APP_HOST` / `APP_PORT`: bind address (default `0.0.0.0:8080`)
/// - `APP_PUBLIC_URL`: external base URL, used in confirmation links
/// - `APP_PRODUCTION`: enables HSTS and `Secure` cookies
/// - `APP_BACKEND`: `postgres` (default) or `memory`
/// - `DATABASE_URL`: PostgreSQL connection string (postgres backend only)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default 10)
/// - `SESSION_SECRET`: token signing key, at least 32 characters (required)
/// - `SESSION_TTL_HOURS`: session lifetime (default 24)
/// - `REGISTRATION_EMAIL_DOMAIN`: only this email domain may register
/// - `REGISTRATION_REQUIRE_ID`: require a 9-digit institutional id
/// - `VERIFICATION_MODE`: `code` (default) or `link`
/// - `OTP_TTL_MINUTES` / `CONFIRMATION_TTL_HOURS`: challenge lifetimes
/// - `MAIL_PROVIDER`: `log` (default) or `http`
/// - `MAIL_API_URL`, `MAIL_API_KEY`, `MAIL_SENDER_EMAIL`, `MAIL_SENDER_NAME`
///
/// # Example
///
/// ```no_run
/// use gathered_web::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use chrono::Duration;
use gathered_shared::flow::{RegistrationPolicy, VerificationMode};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub registration: RegistrationConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Base URL browsers use to reach the server
    pub public_url: String,

    /// Production mode: HSTS and `Secure` cookies
    pub production: bool,
}

/// Which store backend to run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => anyhow::bail!("APP_BACKEND must be postgres or memory, got '{other}'"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,

    /// PostgreSQL connection URL (postgres backend only)
    pub url: Option<String>,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Signing key for session, pending and confirmation tokens
    ///
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,

    pub ttl_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    pub email_domain: Option<String>,
    pub require_institutional_id: bool,
    pub verification: VerificationMode,
    pub otp_ttl_minutes: i64,
    pub confirmation_ttl_hours: i64,
}

/// Mail delivery provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailProvider {
    /// Write messages to the log
    Log,

    /// Deliver through the HTTP email API
    Http,
}

impl FromStr for MailProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(MailProvider::Log),
            "http" | "brevo" => Ok(MailProvider::Http),
            other => anyhow::bail!("MAIL_PROVIDER must be log or http, got '{other}'"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub provider: MailProvider,
    pub api_url: String,
    pub api_key: String,
    pub sender_email: String,
    pub sender_name: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `SESSION_SECRET` is missing or shorter than 32 characters
    /// - `DATABASE_URL` is missing while the postgres backend is selected
    /// - a variable has an invalid value
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = var("APP_PORT", "8080")
            .parse::<u16>()
            .map_err(|e| anyhow::anyhow!("APP_PORT: {e}"))?;

        let backend: StorageBackend = var("APP_BACKEND", "postgres").parse()?;
        let database_url = optional("DATABASE_URL");
        if backend == StorageBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL environment variable is required");
        }

        let secret = lookup("SESSION_SECRET")
            .ok_or_else(|| anyhow::anyhow!("SESSION_SECRET environment variable is required"))?;
        if secret.len() < 32 {
            anyhow::bail!("SESSION_SECRET must be at least 32 characters long");
        }

        let verification = var("VERIFICATION_MODE", "code")
            .parse::<VerificationMode>()
            .map_err(|e| anyhow::anyhow!("VERIFICATION_MODE: {e}"))?;

        Ok(Self {
            server: ServerConfig {
                host: var("APP_HOST", "0.0.0.0"),
                port,
                public_url: var("APP_PUBLIC_URL", "http://localhost:8080"),
                production: parse_bool(&var("APP_PRODUCTION", "false"), "APP_PRODUCTION")?,
            },
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections: var("DATABASE_MAX_CONNECTIONS", "10")
                    .parse::<u32>()
                    .map_err(|e| anyhow::anyhow!("DATABASE_MAX_CONNECTIONS: {e}"))?,
            },
            session: SessionConfig {
                secret,
                ttl_hours: parse_positive(&var("SESSION_TTL_HOURS", "24"), "SESSION_TTL_HOURS")?,
            },
            registration: RegistrationConfig {
                email_domain: optional("REGISTRATION_EMAIL_DOMAIN"),
                require_institutional_id: parse_bool(
                    &var("REGISTRATION_REQUIRE_ID", "false"),
                    "REGISTRATION_REQUIRE_ID",
                )?,
                verification,
                otp_ttl_minutes: parse_positive(&var("OTP_TTL_MINUTES", "10"), "OTP_TTL_MINUTES")?,
                confirmation_ttl_hours: parse_positive(
                    &var("CONFIRMATION_TTL_HOURS", "24"),
                    "CONFIRMATION_TTL_HOURS",
                )?,
            },
            mail: MailConfig {
                provider: var("MAIL_PROVIDER", "log").parse()?,
                api_url: var("MAIL_API_URL", "https://api.brevo.com/v3/smtp/email"),
                api_key: var("MAIL_API_KEY", ""),
                sender_email: var("MAIL_SENDER_EMAIL", ""),
                sender_name: optional("MAIL_SENDER_NAME"),
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Absolute URL of the confirmation callback
    pub fn callback_url(&self) -> String {
        format!("{}/auth/callback", self.server.public_url.trim_end_matches('/'))
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::hours(self.session.ttl_hours)
    }

    pub fn confirmation_ttl(&self) -> Duration {
        Duration::hours(self.registration.confirmation_ttl_hours)
    }

    /// Registration policy derived from this configuration
    pub fn registration_policy(&self) -> RegistrationPolicy {
        RegistrationPolicy {
            email_domain: self.registration.email_domain.clone(),
            require_institutional_id: self.registration.require_institutional_id,
            verification: self.registration.verification,
            code_ttl: Duration::minutes(self.registration.otp_ttl_minutes),
            link_ttl: self.confirmation_ttl(),
            callback_url: self.callback_url(),
        }
    }
}

fn parse_bool(value: &str, key: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("{key} must be true or false, got '{other}'"),
    }
}

fn parse_positive(value: &str, key: &str) -> anyhow::Result<i64> {
    let parsed = value
        .trim()
        .parse::<i64>()
        .map_err(|e| anyhow::anyhow!("{key}: {e}"))?;
    if parsed <= 0 {
        anyhow::bail!("{key} must be positive");
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("APP_BACKEND", "memory"), ("SESSION_SECRET", SECRET)]).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.callback_url(), "http://localhost:8080/auth/callback");
        assert_eq!(config.registration.verification, VerificationMode::Code);
        assert_eq!(config.mail.provider, MailProvider::Log);
        assert!(!config.server.production);

        let policy = config.registration_policy();
        assert_eq!(policy.code_ttl, Duration::minutes(10));
        assert_eq!(policy.link_ttl, Duration::hours(24));
    }

    #[test]
    fn test_secret_required() {
        let err = load(&[("APP_BACKEND", "memory")]).unwrap_err();
        assert!(err.to_string().contains("SESSION_SECRET"));

        let err = load(&[("APP_BACKEND", "memory"), ("SESSION_SECRET", "short")]).unwrap_err();
        assert!(err.to_string().contains("at least 32"));
    }

    #[test]
    fn test_postgres_requires_url() {
        let err = load(&[("SESSION_SECRET", SECRET)]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));

        let config = load(&[
            ("SESSION_SECRET", SECRET),
            ("DATABASE_URL", "postgresql://localhost/gathered"),
        ])
        .unwrap();
        assert_eq!(config.database.backend, StorageBackend::Postgres);
    }

    #[test]
    fn test_registration_settings() {
        let config = load(&[
            ("APP_BACKEND", "memory"),
            ("SESSION_SECRET", SECRET),
            ("APP_PUBLIC_URL", "https://gathered.cit.edu/"),
            ("REGISTRATION_EMAIL_DOMAIN", "cit.edu"),
            ("REGISTRATION_REQUIRE_ID", "true"),
            ("VERIFICATION_MODE", "link"),
        ])
        .unwrap();

        let policy = config.registration_policy();
        assert_eq!(policy.email_domain.as_deref(), Some("cit.edu"));
        assert!(policy.require_institutional_id);
        assert_eq!(policy.verification, VerificationMode::Link);
        assert_eq!(policy.callback_url, "https://gathered.cit.edu/auth/callback");
    }

    #[test]
    fn test_invalid_values() {
        assert!(load(&[
            ("APP_BACKEND", "memory"),
            ("SESSION_SECRET", SECRET),
            ("APP_PORT", "eighty"),
        ])
        .is_err());
        assert!(load(&[
            ("APP_BACKEND", "memory"),
            ("SESSION_SECRET", SECRET),
            ("OTP_TTL_MINUTES", "0"),
        ])
        .is_err());
        assert!(load(&[("APP_BACKEND", "sqlite"), ("SESSION_SECRET", SECRET)]).is_err());
    }
}
