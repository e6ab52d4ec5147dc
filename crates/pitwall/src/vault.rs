//! The Vault: unified API for Pitwall.
//!
//! The Vault brings together key provisioning, envelope encryption, storage
//! and the access controller. Callers pass an already-authenticated
//! [`Principal`]; everything past that point is decided here.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use pitwall_access::{
    AccessBasis, AccessController, AuditAction, AuditEvent, AuditOutcome, AuditSink,
    GrantSummary, TracingAuditSink,
};
use pitwall_core::{
    integrity_digest, now_millis, Classification, EnvelopeCipher, Grant, KeyVault, Plaintext,
    Principal, PublicKeyPem, Record, RecordId, SignatureService, TeamId,
};
use pitwall_store::{InsertResult, Store};

use crate::config::VaultConfig;
use crate::error::{Result, VaultError};

/// Listing entry: record metadata and the basis the caller may read it on.
///
/// Never carries ciphertext or key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSummary {
    pub id: RecordId,
    pub name: String,
    pub owner_team: TeamId,
    pub classification: Classification,
    pub integrity_digest: String,
    pub created_at: i64,
    pub access: AccessBasis,
}

impl RecordSummary {
    fn new(record: &Record, access: AccessBasis) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            owner_team: record.owner_team.clone(),
            classification: record.classification,
            integrity_digest: record.integrity_digest.clone(),
            created_at: record.created_at,
            access,
        }
    }
}

/// Counts of what the vault holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VaultStats {
    pub principals: usize,
    pub records: usize,
}

/// The main Vault struct.
///
/// Provides a unified API for:
/// - Provisioning principals and publishing their public keys
/// - Creating encrypted, signed records
/// - Reading and verifying records under the access policy
/// - Sharing records with other teams
/// - Listing what a principal can see
pub struct Vault<S: Store> {
    /// The storage backend.
    store: Arc<S>,
    /// Read gate and share orchestration.
    access: AccessController<S>,
    /// Envelope cipher for new records.
    cipher: EnvelopeCipher,
    /// Configuration.
    config: VaultConfig,
}

impl<S: Store> Vault<S> {
    /// Create a vault that reports audit events through `tracing`.
    pub fn new(store: S, config: VaultConfig) -> Self {
        Self::with_audit_sink(store, config, Arc::new(TracingAuditSink))
    }

    /// Create a vault with a caller-supplied audit sink.
    pub fn with_audit_sink(store: S, config: VaultConfig, audit: Arc<dyn AuditSink>) -> Self {
        let store = Arc::new(store);
        Self {
            access: AccessController::new(store.clone(), audit, config.policy()),
            cipher: EnvelopeCipher::new(config.content_cipher),
            store,
            config,
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Principals
    // ─────────────────────────────────────────────────────────────────────────

    /// Generate a key pair for a new principal and persist it.
    ///
    /// Fails with `AlreadyExists` if the team already has a principal.
    pub async fn provision_principal(&self, username: &str, team: &str) -> Result<Principal> {
        let username = username.trim();
        let team = TeamId::new(team);
        if username.is_empty() {
            return Err(VaultError::InvalidInput("username is empty".into()));
        }
        if team.is_empty() {
            return Err(VaultError::InvalidInput("team is empty".into()));
        }

        // RSA key generation is CPU-bound.
        let key_pair = tokio::task::spawn_blocking(KeyVault::generate)
            .await
            .map_err(|e| pitwall_core::CryptoError::KeyGeneration(e.to_string()))??;

        let principal = Principal {
            username: username.to_string(),
            team,
            key_pair,
            created_at: now_millis(),
        };

        match self.store.insert_principal(&principal).await? {
            InsertResult::Inserted => {
                info!(
                    principal = %principal.label(),
                    fingerprint = %principal.key_pair.public_key().fingerprint(),
                    "principal provisioned"
                );
                self.access.report(AuditEvent::new(
                    &principal,
                    AuditAction::ProvisionPrincipal,
                    None,
                    AuditOutcome::Completed,
                ));
                Ok(principal)
            }
            InsertResult::AlreadyExists => {
                self.access.report(AuditEvent::new(
                    &principal,
                    AuditAction::ProvisionPrincipal,
                    None,
                    AuditOutcome::Failed {
                        reason: "already provisioned".into(),
                    },
                ));
                Err(VaultError::AlreadyExists(format!(
                    "principal for team {}",
                    principal.team
                )))
            }
        }
    }

    /// Look up the principal of `team`.
    pub async fn principal(&self, team: &TeamId) -> Result<Principal> {
        self.store
            .load_principal(team)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("principal for team {team}")))
    }

    /// The freely distributable public key of `team`.
    pub async fn public_key(&self, team: &TeamId) -> Result<PublicKeyPem> {
        Ok(self.principal(team).await?.key_pair.public_key().clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Records
    // ─────────────────────────────────────────────────────────────────────────

    /// Encrypt, sign and store `plaintext` as a record owned by `owner`'s team.
    pub async fn create_record(
        &self,
        owner: &Principal,
        name: &str,
        classification: Classification,
        plaintext: &[u8],
    ) -> Result<Record> {
        let result = self
            .seal_and_save(owner, name, classification, plaintext)
            .await;

        let (record_id, outcome) = match &result {
            Ok(record) => {
                info!(
                    record = %record.id,
                    owner = %record.owner_team,
                    classification = %record.classification,
                    cipher = ?record.content.cipher,
                    "record created"
                );
                (Some(record.id), AuditOutcome::Completed)
            }
            Err(e) => (
                None,
                AuditOutcome::Failed {
                    reason: e.to_string(),
                },
            ),
        };
        self.access.report(AuditEvent::new(
            owner,
            AuditAction::CreateRecord,
            record_id,
            outcome,
        ));

        result
    }

    async fn seal_and_save(
        &self,
        owner: &Principal,
        name: &str,
        classification: Classification,
        plaintext: &[u8],
    ) -> Result<Record> {
        let name = name.trim();
        if name.is_empty() {
            return Err(VaultError::InvalidInput("record name is empty".into()));
        }
        if plaintext.len() > self.config.max_record_size {
            return Err(VaultError::InvalidInput(format!(
                "record is {} bytes, limit is {}",
                plaintext.len(),
                self.config.max_record_size
            )));
        }

        let record = Record::create(
            &self.cipher,
            &owner.team,
            &owner.key_pair,
            name,
            classification,
            plaintext,
            now_millis(),
        )?;

        match self.store.save_record(&record).await? {
            InsertResult::Inserted => Ok(record),
            InsertResult::AlreadyExists => {
                Err(VaultError::AlreadyExists(format!("record {}", record.id)))
            }
        }
    }

    /// Decrypt a record for `requester`, if the access policy allows it.
    pub async fn read_record(&self, requester: &Principal, id: &RecordId) -> Result<Plaintext> {
        let record = self
            .load_record_for(requester, id, AuditAction::ReadRecord)
            .await?;
        let opened = self.access.read(requester, &record).await?;
        debug!(record = %id, team = %requester.team, basis = %opened.basis, "record read");
        Ok(opened.plaintext)
    }

    /// Decrypt a record and check its signature and integrity digest
    /// against the owning team's public key.
    ///
    /// Returns `Ok(false)` when the content decrypts but does not match what
    /// the owner signed; that mismatch is reported as a failure. Decryption
    /// faults surface as errors.
    pub async fn verify_record(&self, requester: &Principal, id: &RecordId) -> Result<bool> {
        let record = self
            .load_record_for(requester, id, AuditAction::VerifyRecord)
            .await?;
        let opened = self
            .access
            .open(requester, &record, AuditAction::VerifyRecord)
            .await?;
        let owner_key = self.public_key(&record.owner_team).await?;

        let signature_ok =
            SignatureService::verify(&opened.plaintext, &record.signature, &owner_key);
        let digest_ok = integrity_digest(&opened.plaintext) == record.integrity_digest;

        if !(signature_ok && digest_ok) {
            warn!(record = %id, signature_ok, digest_ok, "record failed verification");
            self.access.report(AuditEvent::new(
                requester,
                AuditAction::VerifyRecord,
                Some(record.id),
                AuditOutcome::Failed {
                    reason: format!("signature ok: {signature_ok}, digest ok: {digest_ok}"),
                },
            ));
        }
        Ok(signature_ok && digest_ok)
    }

    /// Give `recipient` access to a record owned by `sender`'s team.
    pub async fn share_record(
        &self,
        sender: &Principal,
        id: &RecordId,
        recipient: &TeamId,
    ) -> Result<Grant> {
        let record = self
            .load_record_for(
                sender,
                id,
                AuditAction::ShareRecord {
                    recipient: recipient.clone(),
                },
            )
            .await?;
        Ok(self.access.authorize_share(sender, &record, recipient).await?)
    }

    /// Grant metadata for a record. Owner or auditor only.
    pub async fn grants_for_record(
        &self,
        requester: &Principal,
        id: &RecordId,
    ) -> Result<Vec<GrantSummary>> {
        let record = self
            .load_record_for(requester, id, AuditAction::ListGrants)
            .await?;
        Ok(self.access.list_grants(requester, &record).await?)
    }

    /// Every record `requester` may read, oldest first.
    ///
    /// The auditor sees everything; other teams see what they own, what is
    /// public, and what has been shared with them.
    pub async fn list_records(&self, requester: &Principal) -> Result<Vec<RecordSummary>> {
        Ok(self
            .access
            .list_visible(requester)
            .await?
            .iter()
            .map(|(record, basis)| RecordSummary::new(record, *basis))
            .collect())
    }

    /// Load a record for `action`. A missing record or a storage fault is
    /// reported under `action` before it is returned.
    async fn load_record_for(
        &self,
        requester: &Principal,
        id: &RecordId,
        action: AuditAction,
    ) -> Result<Record> {
        let result = match self.store.load_record(id).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(VaultError::NotFound(format!("record {id}"))),
            Err(e) => Err(VaultError::from(e)),
        };

        if let Err(e) = &result {
            self.access.report(AuditEvent::new(
                requester,
                action,
                Some(*id),
                AuditOutcome::Failed {
                    reason: e.to_string(),
                },
            ));
        }
        result
    }

    /// Number of provisioned principals and stored records.
    pub async fn stats(&self) -> Result<VaultStats> {
        Ok(VaultStats {
            principals: self.store.list_principals().await?.len(),
            records: self.store.list_records().await?.len(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Seeding
    // ─────────────────────────────────────────────────────────────────────────

    /// Wipe the store and provision one principal per team, with the team
    /// name as username. Duplicate team names are provisioned once.
    pub async fn seed(&self, teams: &[TeamId]) -> Result<Vec<Principal>> {
        self.store.reset().await?;
        info!(teams = teams.len(), "store reset for seeding");

        let mut seen = HashSet::new();
        let mut principals = Vec::with_capacity(teams.len());
        for team in teams {
            if team.is_empty() || !seen.insert(team.clone()) {
                continue;
            }
            principals.push(self.provision_principal(team.as_str(), team.as_str()).await?);
        }

        Ok(principals)
    }

    /// [`seed`](Self::seed) with the configured teams.
    pub async fn seed_default(&self) -> Result<Vec<Principal>> {
        self.seed(&self.config.seed_teams).await
    }
}
