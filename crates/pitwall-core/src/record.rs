//! The protected data model: principals, records and grants.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::digest::integrity_digest;
use crate::envelope::{EnvelopeCipher, SealedContent, WrappedKey};
use crate::error::{CryptoError, Result};
use crate::keys::KeyPair;
use crate::signature::{RecordSignature, SignatureService};
use crate::types::{RecordId, TeamId};

/// Sensitivity of a record.
///
/// Controls discoverability only; every record is encrypted either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Listed to every team. Readers without a grant go through the owner's key.
    Public,
    /// Visible to the owner, grantees and the auditor only.
    #[default]
    Confidential,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Public => "public",
            Classification::Confidential => "confidential",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Classification {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Classification::Public),
            "confidential" => Ok(Classification::Confidential),
            other => Err(CryptoError::Malformed(format!("unknown classification '{other}'"))),
        }
    }
}

/// An identity bound to a team, owning exactly one key pair for its lifetime.
#[derive(Debug, Clone)]
pub struct Principal {
    pub username: String,
    pub team: TeamId,
    pub key_pair: KeyPair,
    pub created_at: i64,
}

impl Principal {
    /// `username@team`, safe to log.
    pub fn label(&self) -> String {
        format!("{}@{}", self.username, self.team)
    }
}

/// A unit of protected content.
///
/// Content and signature are produced together by [`Record::create`] and are
/// never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub name: String,
    pub owner_team: TeamId,
    pub classification: Classification,
    pub content: SealedContent,
    pub signature: RecordSignature,
    pub integrity_digest: String,
    pub created_at: i64,
}

impl Record {
    /// Encrypt, sign and identify `plaintext` on behalf of `owner`.
    pub fn create(
        cipher: &EnvelopeCipher,
        owner: &TeamId,
        owner_keys: &KeyPair,
        name: &str,
        classification: Classification,
        plaintext: &[u8],
        created_at: i64,
    ) -> Result<Self> {
        let content = cipher.encrypt(plaintext, owner_keys.public_key())?;
        let signature = SignatureService::sign(plaintext, owner_keys.private_key())?;
        let id = RecordId::derive(owner, name, created_at, &content.combined());

        Ok(Self {
            id,
            name: name.to_string(),
            owner_team: owner.clone(),
            classification,
            content,
            signature,
            integrity_digest: integrity_digest(plaintext),
            created_at,
        })
    }

    /// Whether `team` owns this record.
    pub fn is_owned_by(&self, team: &TeamId) -> bool {
        &self.owner_team == team
    }
}

/// A capability letting one more team decrypt one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub record_id: RecordId,
    pub grantee: TeamId,
    pub granted_by: TeamId,
    pub wrapped_key: WrappedKey,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyVault;

    #[test]
    fn test_classification_parse_and_display() {
        assert_eq!("Public".parse::<Classification>().unwrap(), Classification::Public);
        assert_eq!(
            " confidential ".parse::<Classification>().unwrap(),
            Classification::Confidential
        );
        assert!("secret".parse::<Classification>().is_err());
        assert_eq!(Classification::Public.to_string(), "public");
        assert_eq!(
            serde_json::to_string(&Classification::Confidential).unwrap(),
            "\"confidential\""
        );
    }

    #[test]
    fn test_create_record_binds_content_and_signature() {
        let keys = KeyVault::generate().unwrap();
        let owner = TeamId::new("ferrari");
        let record = Record::create(
            &EnvelopeCipher::default(),
            &owner,
            &keys,
            "monza-fp2",
            Classification::Confidential,
            b"{\"x\":1}",
            1_700_000_000_000,
        )
        .unwrap();

        assert!(record.is_owned_by(&owner));
        assert!(!record.is_owned_by(&TeamId::new("mclaren")));
        assert_eq!(record.integrity_digest, integrity_digest(b"{\"x\":1}"));

        let plaintext = EnvelopeCipher::decrypt(&record.content, keys.private_key()).unwrap();
        assert_eq!(&plaintext[..], b"{\"x\":1}");
        assert!(SignatureService::verify(&plaintext, &record.signature, keys.public_key()));
    }

    #[test]
    fn test_same_name_and_time_give_distinct_ids() {
        let keys = KeyVault::generate().unwrap();
        let owner = TeamId::new("ferrari");
        let make = || {
            Record::create(
                &EnvelopeCipher::default(),
                &owner,
                &keys,
                "dup",
                Classification::Public,
                b"same",
                42,
            )
            .unwrap()
        };
        assert_ne!(make().id, make().id);
    }

    #[test]
    fn test_record_json_roundtrip() {
        let keys = KeyVault::generate().unwrap();
        let record = Record::create(
            &EnvelopeCipher::default(),
            &TeamId::new("redbull"),
            &keys,
            "r",
            Classification::Public,
            b"payload",
            7,
        )
        .unwrap();

        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("payload"));
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
