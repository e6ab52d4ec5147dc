//! Vault configuration.

use serde::{Deserialize, Serialize};

use pitwall_access::AccessPolicy;
use pitwall_core::{ContentCipher, TeamId};

use crate::error::{Result, VaultError};

/// Default upper bound on record plaintext: 16 MiB.
pub const DEFAULT_MAX_RECORD_SIZE: usize = 16 * 1024 * 1024;

/// Configuration for the Vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Team with read visibility over every record.
    pub auditor_team: TeamId,

    /// AEAD used for newly created records. Stored records keep theirs.
    pub content_cipher: ContentCipher,

    /// Teams provisioned by [`Vault::seed_default`](crate::Vault::seed_default).
    pub seed_teams: Vec<TeamId>,

    /// Largest plaintext accepted by `create_record`, in bytes.
    pub max_record_size: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            auditor_team: TeamId::new("fia"),
            content_cipher: ContentCipher::default(),
            seed_teams: ["fia", "ferrari", "mclaren", "redbull", "mercedes"]
                .into_iter()
                .map(TeamId::new)
                .collect(),
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
        }
    }
}

impl VaultConfig {
    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| VaultError::Config(e.to_string()))
    }

    /// The access policy derived from this configuration.
    pub fn policy(&self) -> AccessPolicy {
        AccessPolicy::new(self.auditor_team.clone())
    }
}
