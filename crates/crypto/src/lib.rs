//! Cryptographic utilities shared by the API service and the turn worker.
//!
//! Three independent concerns live here:
//!
//! - [`TokenCipher`] - AES-256-CBC encryption of LLM API tokens at rest,
//!   using the `iv_hex:data_hex` wire format.
//! - [`password`] - bcrypt password verifiers.
//! - [`SessionSigner`] - HMAC-SHA256 signed session cookies carrying a
//!   user id and expiry.

mod cipher;
mod error;
pub mod password;
mod session;

pub use cipher::TokenCipher;
pub use error::CryptoError;
pub use session::SessionSigner;
