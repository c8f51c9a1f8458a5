//! # GatherEd Shared Library
//!
//! Types, persistence and business logic used by the GatherEd web server.
//!
//! ## Module Organization
//!
//! - `models`: Database models and their SQL operations
//! - `store`: Store traits (identity, profile, pending, domain) with
//!   PostgreSQL and in-memory backends
//! - `auth`: Password hashing, signed tokens and one-time codes
//! - `mail`: Outbound email delivery
//! - `flow`: Registration/confirmation flow and role routing
//! - `db`: Connection pool and migrations

pub mod auth;
pub mod db;
pub mod flow;
pub mod mail;
pub mod models;
pub mod store;

/// Current version of the GatherEd shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
