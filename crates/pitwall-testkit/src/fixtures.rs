//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, OnceLock};

use rand::rngs::StdRng;
use rand::SeedableRng;

use pitwall::{MemoryAuditSink, Vault, VaultConfig};
use pitwall_core::{now_millis, Classification, KeyPair, KeyVault, Principal, Record, TeamId};
use pitwall_store::{MemoryStore, Store};

/// Deterministic key pair for `seed`, generated once per process.
///
/// RSA generation is slow; tests that only need *some* key should use this.
pub fn canned_key_pair(seed: u64) -> KeyPair {
    static CACHE: OnceLock<Mutex<HashMap<u64, KeyPair>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));

    if let Some(keys) = cache.lock().unwrap_or_else(|e| e.into_inner()).get(&seed) {
        return keys.clone();
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let keys = KeyVault::generate_with_rng(&mut rng).expect("canned key generation");
    cache
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .entry(seed)
        .or_insert(keys)
        .clone()
}

/// A principal of `team` holding the canned key for `seed`.
pub fn principal_with_seed(team: &str, seed: u64) -> Principal {
    Principal {
        username: team.to_string(),
        team: TeamId::new(team),
        key_pair: canned_key_pair(seed),
        created_at: now_millis(),
    }
}

/// A vault over a memory store with one provisioned principal per team.
pub struct TestFixture {
    pub vault: Vault<MemoryStore>,
    pub audit: Arc<MemoryAuditSink>,
    principals: BTreeMap<TeamId, Principal>,
}

impl TestFixture {
    /// Fixture seeded with the default teams.
    pub async fn new() -> Self {
        let config = VaultConfig::default();
        let teams: Vec<String> = config.seed_teams.iter().map(|t| t.to_string()).collect();
        let teams: Vec<&str> = teams.iter().map(String::as_str).collect();
        Self::with_config(config, &teams).await
    }

    /// Fixture seeded with `teams` under the default configuration.
    pub async fn with_teams(teams: &[&str]) -> Self {
        Self::with_config(VaultConfig::default(), teams).await
    }

    /// Fixture seeded with `teams` under `config`.
    ///
    /// Team `i` holds the canned key for seed `i`.
    pub async fn with_config(config: VaultConfig, teams: &[&str]) -> Self {
        let audit = Arc::new(MemoryAuditSink::new());
        let vault = Vault::with_audit_sink(MemoryStore::new(), config, audit.clone());

        let mut principals = BTreeMap::new();
        for (seed, team) in teams.iter().enumerate() {
            let principal = principal_with_seed(team, seed as u64);
            vault
                .store()
                .insert_principal(&principal)
                .await
                .expect("memory store insert");
            principals.insert(principal.team.clone(), principal);
        }

        Self {
            vault,
            audit,
            principals,
        }
    }

    /// The principal of `team`.
    ///
    /// # Panics
    /// If the fixture was not seeded with `team`.
    pub fn principal(&self, team: &str) -> &Principal {
        self.principals
            .get(&TeamId::new(team))
            .unwrap_or_else(|| panic!("fixture has no team {team}"))
    }

    /// Seeded teams, sorted.
    pub fn teams(&self) -> impl Iterator<Item = &TeamId> {
        self.principals.keys()
    }

    /// Create a record owned by `owner`.
    pub async fn create(
        &self,
        owner: &str,
        name: &str,
        classification: Classification,
        plaintext: &[u8],
    ) -> Record {
        self.vault
            .create_record(self.principal(owner), name, classification, plaintext)
            .await
            .expect("fixture record creation")
    }
}

/// `count` principals on distinct teams (`team-0`, `team-1`, ...) with distinct canned keys.
pub fn multi_party_principals(count: usize) -> Vec<Principal> {
    (0..count)
        .map(|i| principal_with_seed(&format!("team-{i}"), 1_000 + i as u64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canned_keys_are_deterministic() {
        let a = canned_key_pair(7);
        let b = canned_key_pair(7);
        assert_eq!(a.public_key(), b.public_key());
        assert_ne!(canned_key_pair(8).public_key(), a.public_key());
    }

    #[tokio::test]
    async fn test_fixture_seeds_default_teams() {
        let fixture = TestFixture::new().await;
        let teams: Vec<String> = fixture.teams().map(|t| t.to_string()).collect();

        assert_eq!(teams, vec!["ferrari", "fia", "mclaren", "mercedes", "redbull"]);
        assert_eq!(fixture.principal("FIA").team, TeamId::new("fia"));
        assert_eq!(fixture.vault.store().list_principals().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_fixture_record_roundtrip() {
        let fixture = TestFixture::with_teams(&["fia", "ferrari"]).await;
        let record = fixture
            .create("ferrari", "fp1", Classification::Confidential, b"{\"x\":1}")
            .await;

        let plaintext = fixture
            .vault
            .read_record(fixture.principal("fia"), &record.id)
            .await
            .unwrap();
        assert_eq!(&plaintext[..], b"{\"x\":1}");
        assert!(!fixture.audit.is_empty());
    }

    #[test]
    fn test_multi_party() {
        let parties = multi_party_principals(3);

        let pks: Vec<_> = parties.iter().map(|p| p.key_pair.public_key().clone()).collect();
        assert_ne!(pks[0], pks[1]);
        assert_ne!(pks[1], pks[2]);
        assert_ne!(pks[0], pks[2]);
        assert_eq!(parties[2].team, TeamId::new("team-2"));
    }
}
