//! Strong type definitions for Pitwall.
//!
//! Identifiers are newtypes so a team label can never be passed where a
//! record id is expected.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A 32-byte record identifier.
///
/// Derived from Blake3 over the owning team, record name, creation time and
/// ciphertext, so two uploads never collide even with identical names.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub [u8; 32]);

impl RecordId {
    /// Derive a record ID from its immutable attributes.
    pub fn derive(owner: &TeamId, name: &str, created_at: i64, ciphertext: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"pitwall-record-v0:");
        hasher.update(owner.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(name.as_bytes());
        hasher.update(b":");
        hasher.update(&created_at.to_be_bytes());
        hasher.update(ciphertext);
        Self(*hasher.finalize().as_bytes())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for RecordId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for RecordId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for RecordId {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = slice.try_into()?;
        Ok(Self(arr))
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// An organizational team label, e.g. `ferrari` or `fia`.
///
/// Normalized to trimmed lowercase so `Ferrari` and `ferrari ` name the same team.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TeamId(String);

impl TeamId {
    /// Create a team label.
    pub fn new(team: impl AsRef<str>) -> Self {
        Self(team.as_ref().trim().to_lowercase())
    }

    /// Get the label.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the label is empty after normalization.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TeamId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TeamId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<TeamId> for String {
    fn from(team: TeamId) -> Self {
        team.0
    }
}

/// Get current time in milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_hex_roundtrip() {
        let id = RecordId::from_bytes([0x42; 32]);
        let recovered = RecordId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_record_id_display() {
        let id = RecordId::from_bytes([0xab; 32]);
        assert_eq!(format!("{}", id), "abababababababab");
    }

    #[test]
    fn test_record_id_derive_depends_on_every_input() {
        let team = TeamId::new("ferrari");
        let base = RecordId::derive(&team, "lap-1", 1000, b"ct");

        assert_eq!(base, RecordId::derive(&team, "lap-1", 1000, b"ct"));
        assert_ne!(base, RecordId::derive(&TeamId::new("mclaren"), "lap-1", 1000, b"ct"));
        assert_ne!(base, RecordId::derive(&team, "lap-2", 1000, b"ct"));
        assert_ne!(base, RecordId::derive(&team, "lap-1", 1001, b"ct"));
        assert_ne!(base, RecordId::derive(&team, "lap-1", 1000, b"cu"));
    }

    #[test]
    fn test_record_id_serializes_as_hex() {
        let id = RecordId::from_bytes([0x01; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_hex()));
        let back: RecordId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_team_id_normalizes() {
        assert_eq!(TeamId::new(" Ferrari "), TeamId::new("ferrari"));
        assert!(TeamId::new("   ").is_empty());

        let parsed: TeamId = serde_json::from_str("\"McLaren\"").unwrap();
        assert_eq!(parsed, TeamId::new("mclaren"));
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"mclaren\"");
    }
}
