//! Error types for the access module.

use pitwall_core::{CryptoError, RecordId, TeamId};
use pitwall_store::StoreError;
use thiserror::Error;

/// Errors that can occur during authorization and sharing.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The decision procedure ended in Denied, or the actor may not perform the operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A grant for this (record, recipient) pair already exists.
    #[error("record {record} is already shared with {recipient}")]
    AlreadyShared { record: RecordId, recipient: TeamId },

    /// A principal, record or grant is missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request is well-formed but makes no sense (e.g. sharing with oneself).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Cryptographic failure while unwrapping, re-wrapping or decrypting.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Storage collaborator failure. Never retried here.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for access operations.
pub type Result<T> = std::result::Result<T, AccessError>;
