//! AES-256-CBC token cipher.
//!
//! Ciphertexts travel as `iv_hex:data_hex`: a fresh 16-byte IV per
//! encryption, hex-encoded, joined to the hex-encoded CBC payload with a
//! colon.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockModeDecrypt, BlockModeEncrypt, KeyIvInit};
use rand::RngCore;

use crate::error::CryptoError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

/// Process-wide cipher for token secrets.
#[derive(Clone)]
pub struct TokenCipher {
    key: [u8; KEY_LEN],
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCipher").finish_non_exhaustive()
    }
}

impl TokenCipher {
    /// Build a cipher from the configured secret. The secret must be
    /// exactly 32 bytes.
    pub fn new(secret: &str) -> Result<Self, CryptoError> {
        let bytes = secret.as_bytes();
        if bytes.len() != KEY_LEN {
            return Err(CryptoError::InvalidKeyLength(bytes.len()));
        }

        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    /// Encrypt a plaintext secret into `iv_hex:data_hex` form.
    pub fn encrypt(&self, plaintext: &str) -> String {
        let mut iv = [0u8; IV_LEN];
        rand::rngs::OsRng.fill_bytes(&mut iv);

        let ciphertext = Aes256CbcEnc::new(&self.key.into(), &iv.into())
            .encrypt_padded_vec::<Pkcs7>(plaintext.as_bytes());

        format!("{}:{}", hex::encode(iv), hex::encode(ciphertext))
    }

    /// Decrypt an `iv_hex:data_hex` ciphertext back to the plaintext.
    pub fn decrypt(&self, encrypted: &str) -> Result<String, CryptoError> {
        let (iv_hex, data_hex) = encrypted
            .split_once(':')
            .ok_or(CryptoError::MalformedCiphertext)?;

        let iv = hex::decode(iv_hex)?;
        let data = hex::decode(data_hex)?;

        if iv.len() != IV_LEN {
            return Err(CryptoError::MalformedCiphertext);
        }

        let iv_arr: [u8; IV_LEN] = iv.try_into().map_err(|_| CryptoError::MalformedCiphertext)?;
        let plaintext = Aes256CbcDec::new(&self.key.into(), &iv_arr.into())
            .decrypt_padded_vec::<Pkcs7>(&data)
            .map_err(|_| CryptoError::Cipher)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::Utf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> TokenCipher {
        TokenCipher::new("0123456789abcdef0123456789abcdef").unwrap()
    }

    #[test]
    fn test_round_trip() {
        let cipher = cipher();
        let encrypted = cipher.encrypt("sk-test-secret");

        assert_ne!(encrypted, "sk-test-secret");
        assert!(encrypted.contains(':'));
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), "sk-test-secret");
    }

    #[test]
    fn test_fresh_iv_per_encryption() {
        let cipher = cipher();
        let first = cipher.encrypt("same-input");
        let second = cipher.encrypt("same-input");

        assert_ne!(first, second);
        assert_eq!(cipher.decrypt(&first).unwrap(), "same-input");
        assert_eq!(cipher.decrypt(&second).unwrap(), "same-input");
    }

    #[test]
    fn test_key_length_enforced() {
        assert!(matches!(
            TokenCipher::new("too-short"),
            Err(CryptoError::InvalidKeyLength(_))
        ));
    }

    #[test]
    fn test_malformed_inputs_rejected() {
        let cipher = cipher();

        assert!(cipher.decrypt("no-colon").is_err());
        assert!(cipher.decrypt("zz:zz").is_err());
        assert!(cipher.decrypt("abcd:abcd").is_err());

        // Valid shape, wrong key material.
        let other = TokenCipher::new("ffffffffffffffffffffffffffffffff").unwrap();
        let encrypted = cipher.encrypt("sk-test-secret");
        assert!(other.decrypt(&encrypted).is_err());
    }
}
