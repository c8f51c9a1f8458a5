/// One-time verification codes
///
/// Codes are six decimal digits in `100000..=999999`. Only a salted SHA-256
/// digest is persisted; the salt is the pending registration id so equal
/// codes on different registrations never share a digest.

use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Smallest code that can be issued
pub const CODE_MIN: u32 = 100_000;

/// Largest code that can be issued
pub const CODE_MAX: u32 = 999_999;

/// Generates a fresh six-digit code
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(CODE_MIN..=CODE_MAX).to_string()
}

/// Digest stored in place of the code
///
/// The submitted string is hashed as-is: no trimming, no normalisation.
pub fn hash_code(pending_id: Uuid, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(pending_id.as_bytes());
    hasher.update(b":");
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Exact comparison of a submitted code against the stored digest
pub fn code_matches(pending_id: Uuid, submitted: &str, stored_hash: &str) -> bool {
    hash_code(pending_id, submitted) == stored_hash
}
