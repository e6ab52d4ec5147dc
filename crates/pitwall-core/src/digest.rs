//! SHA-256 integrity digest over record plaintext.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `data`.
pub fn integrity_digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
