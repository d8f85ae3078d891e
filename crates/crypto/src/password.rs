//! Password verifiers.
//!
//! Adaptive salted hashing via bcrypt. The work factor must stay at or
//! above 10; raising it only affects newly stored verifiers.

use crate::error::CryptoError;

/// Bcrypt work factor for new verifiers.
pub const WORK_FACTOR: u32 = 12;

/// Hash a password for storage.
pub fn hash_password(password: &str) -> Result<String, CryptoError> {
    Ok(bcrypt::hash(password, WORK_FACTOR)?)
}

/// Verify a password against a stored verifier.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, CryptoError> {
    Ok(bcrypt::verify(password, stored)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let stored = hash_password("hunter2").unwrap();

        assert_ne!(stored, "hunter2");
        assert!(verify_password("hunter2", &stored).unwrap());
        assert!(!verify_password("wrong", &stored).unwrap());
    }

    #[test]
    fn test_salted_hashes_differ() {
        let first = hash_password("hunter2").unwrap();
        let second = hash_password("hunter2").unwrap();
        assert_ne!(first, second);
    }
}
