//! Password hashing.
//!
//! bcrypt with a salt per hash and a cost fixed at build time. Verification
//! happens inside bcrypt's constant-time comparison; empty passwords are
//! rejected before any hashing work.

/// Work factor for new hashes. Raising it only affects newly stored hashes.
pub const HASH_COST: u32 = bcrypt::DEFAULT_COST;

/// Hash a plaintext password. Returns `None` for empty input or a bcrypt
/// failure (the caller maps both to a validation error).
pub fn hash_password(password: &str) -> Option<String> {
    if password.is_empty() {
        return None;
    }
    bcrypt::hash(password, HASH_COST).ok()
}

/// Constant-time verification of `password` against a stored hash.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    if password.is_empty() || password_hash.is_empty() {
        return false;
    }
    bcrypt::verify(password, password_hash).unwrap_or(false)
}
