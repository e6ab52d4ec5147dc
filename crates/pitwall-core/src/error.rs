//! Error types for Pitwall Core.
//!
//! Messages never carry key material or plaintext.

use thiserror::Error;

/// Errors raised by key generation, envelope encryption and signing.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The entropy source could not produce a key pair. Fatal.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// The wrapped data key could not be unwrapped with the given private key.
    #[error("data key unwrap failed: wrong private key or corrupted wrapped key")]
    KeyUnwrap,

    /// The AEAD tag did not verify.
    #[error("content authentication failed: ciphertext, tag or nonce was altered")]
    Authentication,

    /// A PEM key could not be parsed or has the wrong size.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// Encryption or key wrapping failed.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Signature generation failed.
    #[error("signing error: {0}")]
    Signing(String),

    /// A binary payload has the wrong shape.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl From<base64::DecodeError> for CryptoError {
    fn from(e: base64::DecodeError) -> Self {
        CryptoError::Malformed(format!("base64: {e}"))
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
