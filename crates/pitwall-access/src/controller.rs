//! AccessController: the read gate and the share orchestration.
//!
//! Every decision (granted or denied), every share and every fault after
//! authorization is reported to the [`AuditSink`] exactly once.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use pitwall_core::{
    now_millis, EnvelopeCipher, Grant, Plaintext, Principal, PrivateKeyPem, Record, RecordId,
    TeamId, WrappedKey,
};
use pitwall_store::{InsertResult, Store};

use crate::audit::{AuditAction, AuditEvent, AuditOutcome, AuditSink};
use crate::decision::{decide, AccessBasis, AccessDecision, AccessPolicy, KeySource};
use crate::error::{AccessError, Result};

/// Authorization to open one record: the wrapped key to use and the private
/// key that unwraps it.
///
/// Consumed by [`open`](ReadAccess::open); the private key goes no further.
pub struct ReadAccess {
    basis: AccessBasis,
    wrapped_key: WrappedKey,
    holder: PrivateKeyPem,
}

impl ReadAccess {
    pub fn basis(&self) -> AccessBasis {
        self.basis
    }

    /// Unwrap the data key and decrypt the record content.
    pub fn open(self, record: &Record) -> pitwall_core::Result<Plaintext> {
        EnvelopeCipher::decrypt_with(&record.content, &self.wrapped_key, &self.holder)
    }
}

impl fmt::Debug for ReadAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadAccess")
            .field("basis", &self.basis)
            .finish_non_exhaustive()
    }
}

/// Decrypted record content and the basis it was read on.
pub struct OpenedRecord {
    pub basis: AccessBasis,
    pub plaintext: Plaintext,
}

impl fmt::Debug for OpenedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenedRecord")
            .field("basis", &self.basis)
            .field("plaintext", &format_args!("<{} bytes>", self.plaintext.len()))
            .finish()
    }
}

/// Grant metadata without key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrantSummary {
    pub record_id: RecordId,
    pub grantee: TeamId,
    pub granted_by: TeamId,
    pub created_at: i64,
}

impl From<&Grant> for GrantSummary {
    fn from(grant: &Grant) -> Self {
        Self {
            record_id: grant.record_id,
            grantee: grant.grantee.clone(),
            granted_by: grant.granted_by.clone(),
            created_at: grant.created_at,
        }
    }
}

/// Decides who may read a record and issues grants.
pub struct AccessController<S: Store> {
    store: Arc<S>,
    audit: Arc<dyn AuditSink>,
    policy: AccessPolicy,
    /// Serializes the check-then-insert of a share per (record, recipient).
    share_locks: DashMap<(RecordId, TeamId), Arc<Mutex<()>>>,
}

impl<S: Store> AccessController<S> {
    pub fn new(store: Arc<S>, audit: Arc<dyn AuditSink>, policy: AccessPolicy) -> Self {
        Self {
            store,
            audit,
            policy,
            share_locks: DashMap::new(),
        }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Report an event on behalf of a caller outside the read/share paths.
    pub fn report(&self, event: AuditEvent) {
        self.audit.record(event);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Read Path
    // ─────────────────────────────────────────────────────────────────────────

    /// Authorize `requester` to open `record` and resolve the key to use.
    ///
    /// The decision is reported under `action`.
    pub async fn authorize(
        &self,
        requester: &Principal,
        record: &Record,
        action: AuditAction,
    ) -> Result<ReadAccess> {
        let result = self.resolve_read(requester, record).await;

        let outcome = match &result {
            Ok(access) => AuditOutcome::Granted {
                basis: access.basis,
            },
            Err(AccessError::Unauthorized(reason)) => AuditOutcome::Denied {
                reason: reason.clone(),
            },
            Err(e) => AuditOutcome::Failed {
                reason: e.to_string(),
            },
        };
        self.report(AuditEvent::new(requester, action, Some(record.id), outcome));

        result
    }

    /// Authorize, then decrypt. A decryption fault is reported as a failure.
    pub async fn open(
        &self,
        requester: &Principal,
        record: &Record,
        action: AuditAction,
    ) -> Result<OpenedRecord> {
        let access = self.authorize(requester, record, action.clone()).await?;
        let basis = access.basis();

        match access.open(record) {
            Ok(plaintext) => Ok(OpenedRecord { basis, plaintext }),
            Err(e) => {
                warn!(record = %record.id, team = %requester.team, error = %e, "record failed to open");
                self.report(AuditEvent::new(
                    requester,
                    action,
                    Some(record.id),
                    AuditOutcome::Failed {
                        reason: e.to_string(),
                    },
                ));
                Err(e.into())
            }
        }
    }

    /// Authorize and decrypt for a plain read.
    pub async fn read(&self, requester: &Principal, record: &Record) -> Result<OpenedRecord> {
        self.open(requester, record, AuditAction::ReadRecord).await
    }

    async fn requester_grant(&self, requester: &TeamId, record: &Record) -> Result<Option<Grant>> {
        if self.policy.is_auditor(requester) || record.is_owned_by(requester) {
            return Ok(None);
        }
        Ok(self.store.load_grant(&record.id, requester).await?)
    }

    async fn resolve_read(&self, requester: &Principal, record: &Record) -> Result<ReadAccess> {
        let grant = self.requester_grant(&requester.team, record).await?;
        let decision = decide(&self.policy, &requester.team, record, grant.as_ref());
        debug!(record = %record.id, team = %requester.team, ?decision, "access decision");

        let (basis, key) = match decision {
            AccessDecision::Granted { basis, key } => (basis, key),
            AccessDecision::Denied => {
                return Err(AccessError::Unauthorized(format!(
                    "{} has no access to record {}",
                    requester.team, record.id
                )))
            }
        };

        match key {
            KeySource::Grant => {
                let grant = grant.ok_or_else(|| {
                    AccessError::NotFound(format!(
                        "grant for {} on record {}",
                        requester.team, record.id
                    ))
                })?;
                Ok(ReadAccess {
                    basis,
                    wrapped_key: grant.wrapped_key,
                    holder: requester.key_pair.private_key().clone(),
                })
            }
            KeySource::OwnerWrapped if record.is_owned_by(&requester.team) => Ok(ReadAccess {
                basis,
                wrapped_key: record.content.wrapped_key.clone(),
                holder: requester.key_pair.private_key().clone(),
            }),
            KeySource::OwnerWrapped => {
                let owner = self
                    .store
                    .load_principal(&record.owner_team)
                    .await?
                    .ok_or_else(|| {
                        AccessError::NotFound(format!("owning principal {}", record.owner_team))
                    })?;
                Ok(ReadAccess {
                    basis,
                    wrapped_key: record.content.wrapped_key.clone(),
                    holder: owner.key_pair.private_key().clone(),
                })
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Share Path
    // ─────────────────────────────────────────────────────────────────────────

    /// Give `recipient` its own wrapping of `record`'s data key.
    ///
    /// Only the owning team may share. A second share to the same recipient
    /// fails with [`AccessError::AlreadyShared`] and leaves the first grant intact.
    pub async fn authorize_share(
        &self,
        sender: &Principal,
        record: &Record,
        recipient: &TeamId,
    ) -> Result<Grant> {
        let result = self.share(sender, record, recipient).await;

        let outcome = match &result {
            Ok(_) => AuditOutcome::Completed,
            Err(AccessError::Unauthorized(reason)) => AuditOutcome::Denied {
                reason: reason.clone(),
            },
            Err(e) => AuditOutcome::Failed {
                reason: e.to_string(),
            },
        };
        self.report(AuditEvent::new(
            sender,
            AuditAction::ShareRecord {
                recipient: recipient.clone(),
            },
            Some(record.id),
            outcome,
        ));

        result
    }

    async fn share(&self, sender: &Principal, record: &Record, recipient: &TeamId) -> Result<Grant> {
        if !record.is_owned_by(&sender.team) {
            return Err(AccessError::Unauthorized(format!(
                "only {} may share record {}",
                record.owner_team, record.id
            )));
        }
        if recipient.is_empty() {
            return Err(AccessError::InvalidInput("recipient team is empty".into()));
        }
        if record.is_owned_by(recipient) {
            return Err(AccessError::InvalidInput(format!(
                "record {} is already owned by {}",
                record.id, recipient
            )));
        }

        let recipient = self
            .store
            .load_principal(recipient)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("principal for team {}", recipient)))?;

        let key = (record.id, recipient.team.clone());
        // Drops after the guard and the Arc clone, also on cancellation.
        let _cleanup = ShareLockCleanup {
            locks: &self.share_locks,
            key: key.clone(),
        };
        let lock = self
            .share_locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let _guard = lock.lock().await;
        self.share_locked(sender, record, &recipient).await
    }

    async fn share_locked(
        &self,
        sender: &Principal,
        record: &Record,
        recipient: &Principal,
    ) -> Result<Grant> {
        let already_shared = || AccessError::AlreadyShared {
            record: record.id,
            recipient: recipient.team.clone(),
        };

        if self
            .store
            .load_grant(&record.id, &recipient.team)
            .await?
            .is_some()
        {
            return Err(already_shared());
        }

        let wrapped_key = EnvelopeCipher::rewrap(
            &record.content.wrapped_key,
            sender.key_pair.private_key(),
            recipient.key_pair.public_key(),
        )?;

        let grant = Grant {
            record_id: record.id,
            grantee: recipient.team.clone(),
            granted_by: sender.team.clone(),
            wrapped_key,
            created_at: now_millis(),
        };

        match self.store.insert_grant(&grant).await? {
            InsertResult::Inserted => {
                info!(record = %record.id, from = %sender.team, to = %recipient.team, "record shared");
                Ok(grant)
            }
            InsertResult::AlreadyExists => Err(already_shared()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Grant Listing
    // ─────────────────────────────────────────────────────────────────────────

    /// Grant metadata for `record`. Owner or auditor only.
    pub async fn list_grants(
        &self,
        requester: &Principal,
        record: &Record,
    ) -> Result<Vec<GrantSummary>> {
        let allowed =
            record.is_owned_by(&requester.team) || self.policy.is_auditor(&requester.team);

        let result = if allowed {
            self.store
                .list_grants_for_record(&record.id)
                .await
                .map(|grants| grants.iter().map(GrantSummary::from).collect())
                .map_err(AccessError::from)
        } else {
            Err(AccessError::Unauthorized(format!(
                "{} may not list grants of record {}",
                requester.team, record.id
            )))
        };

        let outcome = match &result {
            Ok(_) => AuditOutcome::Completed,
            Err(AccessError::Unauthorized(reason)) => AuditOutcome::Denied {
                reason: reason.clone(),
            },
            Err(e) => AuditOutcome::Failed {
                reason: e.to_string(),
            },
        };
        self.report(AuditEvent::new(
            requester,
            AuditAction::ListGrants,
            Some(record.id),
            outcome,
        ));

        result
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Record Listing
    // ─────────────────────────────────────────────────────────────────────────

    /// Every stored record `requester` may read, oldest first, with the
    /// basis it may be read on. One event is reported per listing.
    pub async fn list_visible(&self, requester: &Principal) -> Result<Vec<(Record, AccessBasis)>> {
        let result = self.visible_records(&requester.team).await;

        let outcome = match &result {
            Ok(_) => AuditOutcome::Completed,
            Err(e) => AuditOutcome::Failed {
                reason: e.to_string(),
            },
        };
        self.report(AuditEvent::new(
            requester,
            AuditAction::ListRecords,
            None,
            outcome,
        ));

        result
    }

    async fn visible_records(&self, requester: &TeamId) -> Result<Vec<(Record, AccessBasis)>> {
        let grants: HashMap<RecordId, Grant> = self
            .store
            .list_grants_for_grantee(requester)
            .await?
            .into_iter()
            .map(|grant| (grant.record_id, grant))
            .collect();

        Ok(self
            .store
            .list_records()
            .await?
            .into_iter()
            .filter_map(|record| {
                decide(&self.policy, requester, &record, grants.get(&record.id))
                    .basis()
                    .map(|basis| (record, basis))
            })
            .collect())
    }

    #[cfg(test)]
    fn pending_share_locks(&self) -> usize {
        self.share_locks.len()
    }
}

/// Drops the per-pair share lock once no other share is waiting on it.
struct ShareLockCleanup<'a> {
    locks: &'a DashMap<(RecordId, TeamId), Arc<Mutex<()>>>,
    key: (RecordId, TeamId),
}

impl Drop for ShareLockCleanup<'_> {
    fn drop(&mut self) {
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}
