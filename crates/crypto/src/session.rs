//! HMAC-SHA256 signed session values.
//!
//! A session value is `user_id.expiry_unix.signature_hex`, where the
//! signature covers `user_id.expiry_unix`. Values are carried in the
//! session cookie only.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::CryptoError;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies session values with a process-wide key.
#[derive(Clone)]
pub struct SessionSigner {
    key: Vec<u8>,
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner").finish_non_exhaustive()
    }
}

impl SessionSigner {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.as_bytes().to_vec(),
        }
    }

    /// Issue a session value for a user, valid for `ttl`.
    pub fn issue(&self, user_id: i64, ttl: Duration) -> String {
        let expiry = unix_now() + ttl.as_secs();
        let payload = format!("{}.{}", user_id, expiry);
        format!("{}.{}", payload, self.sign(&payload))
    }

    /// Verify a session value and return the user id.
    pub fn verify(&self, value: &str) -> Result<i64, CryptoError> {
        let (payload, signature) = value
            .rsplit_once('.')
            .ok_or(CryptoError::InvalidSignature)?;

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        let signature = hex::decode(signature).map_err(|_| CryptoError::InvalidSignature)?;
        mac.verify_slice(&signature)
            .map_err(|_| CryptoError::InvalidSignature)?;

        let (user_id, expiry) = payload
            .split_once('.')
            .ok_or(CryptoError::InvalidSignature)?;
        let user_id: i64 = user_id.parse().map_err(|_| CryptoError::InvalidSignature)?;
        let expiry: u64 = expiry.parse().map_err(|_| CryptoError::InvalidSignature)?;

        if expiry < unix_now() {
            return Err(CryptoError::Expired);
        }

        Ok(user_id)
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length.
        HmacSha256::new_from_slice(&self.key).expect("HMAC key of any length")
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
