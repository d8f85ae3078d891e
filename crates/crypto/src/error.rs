//! Crypto error types.

use thiserror::Error;

/// Errors from token encryption, password hashing or session signing.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key length: {0} (expected 32 bytes)")]
    InvalidKeyLength(usize),

    #[error("malformed ciphertext")]
    MalformedCiphertext,

    #[error("hex error: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("crypto failure")]
    Cipher,

    #[error("decrypted data is not valid UTF-8")]
    Utf8,

    #[error("password hash error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("invalid session signature")]
    InvalidSignature,

    #[error("session expired")]
    Expired,
}
