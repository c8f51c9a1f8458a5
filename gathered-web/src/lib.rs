//! # GatherEd Web Server Library
//!
//! Server-rendered web application for GatherEd: registration with email
//! verification, role-based dashboards, events, announcements and feedback.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Errors as flash messages plus redirects
//! - `flash`: One-shot messages carried across redirects
//! - `session`: Session and pending-registration cookies, `CurrentUser`
//! - `views`: HTML pages
//! - `middleware`: Security headers
//! - `routes`: Route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod flash;
pub mod middleware;
pub mod routes;
pub mod session;
pub mod views;
