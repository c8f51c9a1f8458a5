/// Middleware for the web server
///
/// - `security`: OWASP security headers on every response

pub mod security;
