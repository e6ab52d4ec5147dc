//! Error types for the Vault.

use std::fmt;

use pitwall_access::AccessError;
use pitwall_core::CryptoError;
use pitwall_store::StoreError;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during Vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Cryptographic error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Authorization or sharing error.
    #[error("access error: {0}")]
    Access(#[from] AccessError),

    /// Principal or record not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Principal already provisioned.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Rejected request (empty name, oversized content).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Stable classification of a [`VaultError`], independent of the layer that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    KeyGeneration,
    KeyUnwrap,
    Authentication,
    AlreadyShared,
    Unauthorized,
    NotFound,
    AlreadyExists,
    InvalidInput,
    /// Encryption or signing failed for a reason other than the above.
    Crypto,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::KeyGeneration => "key_generation",
            ErrorKind::KeyUnwrap => "key_unwrap",
            ErrorKind::Authentication => "authentication",
            ErrorKind::AlreadyShared => "already_shared",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Crypto => "crypto",
            ErrorKind::Storage => "storage",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl VaultError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::Crypto(e) => crypto_kind(e),
            VaultError::Store(_) => ErrorKind::Storage,
            VaultError::Access(e) => match e {
                AccessError::Unauthorized(_) => ErrorKind::Unauthorized,
                AccessError::AlreadyShared { .. } => ErrorKind::AlreadyShared,
                AccessError::NotFound(_) => ErrorKind::NotFound,
                AccessError::InvalidInput(_) => ErrorKind::InvalidInput,
                AccessError::Crypto(e) => crypto_kind(e),
                AccessError::Store(_) => ErrorKind::Storage,
            },
            VaultError::NotFound(_) => ErrorKind::NotFound,
            VaultError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            VaultError::InvalidInput(_) | VaultError::Config(_) => ErrorKind::InvalidInput,
        }
    }
}

fn crypto_kind(e: &CryptoError) -> ErrorKind {
    match e {
        CryptoError::KeyGeneration(_) => ErrorKind::KeyGeneration,
        CryptoError::KeyUnwrap => ErrorKind::KeyUnwrap,
        CryptoError::Authentication => ErrorKind::Authentication,
        CryptoError::InvalidKey(_) | CryptoError::Malformed(_) => ErrorKind::InvalidInput,
        CryptoError::Encryption(_) | CryptoError::Signing(_) => ErrorKind::Crypto,
    }
}

/// Result type for Vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
