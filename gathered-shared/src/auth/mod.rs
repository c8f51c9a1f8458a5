/// Authentication primitives
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and verification
/// - [`jwt`]: HS256 signed tokens for sessions, pending registrations and
///   confirmation links
/// - [`otp`]: one-time verification codes
/// - [`confirmation`]: issuing and redeeming emailed confirmation links
///
/// # Example
///
/// ```
/// use gathered_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("user_password")?;
/// assert!(verify_password("user_password", &hash)?);
/// # Ok(())
/// # }
/// ```

pub mod confirmation;
pub mod jwt;
pub mod otp;
pub mod password;
