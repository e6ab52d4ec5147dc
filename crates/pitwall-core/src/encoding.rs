//! Boundary encodings.
//!
//! Binary payloads (ciphertext, nonce, wrapped key, signature) cross the
//! core boundary as standard base64 text.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::error::Result;

/// Encode bytes as standard base64.
pub fn to_base64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decode standard base64 text.
pub fn from_base64(text: &str) -> Result<Vec<u8>> {
    Ok(BASE64.decode(text.trim())?)
}

/// Serde adapter for `Vec<u8>` fields exchanged as base64 strings.
pub mod base64_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_base64(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for fixed-length byte arrays (nonces, tags) exchanged as base64.
pub mod base64_array {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_base64(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = super::from_base64(&s).map_err(serde::de::Error::custom)?;
        let len = bytes.len();
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom(format!("expected {N} bytes, got {len}")))
    }
}
