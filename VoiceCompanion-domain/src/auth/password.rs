//! bcrypt password hashing

use crate::auth::token::SecurityError;

/// Cost used for new hashes; `BCRYPT_COST` overrides it (tests use the minimum)
fn cost() -> u32 {
    std::env::var("BCRYPT_COST")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(bcrypt::DEFAULT_COST)
}

pub fn hash_password(password: &str) -> Result<String, SecurityError> {
    bcrypt::hash(password, cost()).map_err(|e| SecurityError::PasswordHash(e.to_string()))
}

/// False for a wrong password and for a malformed stored hash
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    bcrypt::verify(password, password_hash).unwrap_or(false)
}
