/// Route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `pages`: Landing page
/// - `health`: Health check endpoint
/// - `register`: Registration, code verification and link confirmation
/// - `auth`: Login and logout
/// - `dashboard`: Role redirect and the student/admin dashboards
/// - `events`: Event listing, creation and registration
/// - `announcements`: Posting announcements
/// - `feedback`: Submitting feedback

pub mod announcements;
pub mod auth;
pub mod dashboard;
pub mod events;
pub mod feedback;
pub mod health;
pub mod pages;
pub mod register;
