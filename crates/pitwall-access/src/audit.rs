//! AuditSink: where authorization-relevant events are reported.
//!
//! Persistence and querying of the audit trail belong to the caller; this
//! module only defines the event shape and two sinks: one that keeps events
//! in memory and one that emits them through `tracing`.

use std::sync::Mutex;

use serde::Serialize;
use tracing::{info, warn};

use pitwall_core::{now_millis, Principal, RecordId, TeamId};

use crate::decision::AccessBasis;

/// Tracing target for audit events.
pub const AUDIT_TARGET: &str = "pitwall::audit";

/// What the actor attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditAction {
    ProvisionPrincipal,
    CreateRecord,
    ReadRecord,
    VerifyRecord,
    ShareRecord { recipient: TeamId },
    ListGrants,
    ListRecords,
}

impl AuditAction {
    pub fn name(&self) -> &'static str {
        match self {
            AuditAction::ProvisionPrincipal => "provision_principal",
            AuditAction::CreateRecord => "create_record",
            AuditAction::ReadRecord => "read_record",
            AuditAction::VerifyRecord => "verify_record",
            AuditAction::ShareRecord { .. } => "share_record",
            AuditAction::ListGrants => "list_grants",
            AuditAction::ListRecords => "list_records",
        }
    }
}

/// How it ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AuditOutcome {
    /// Authorization passed on the given basis.
    Granted { basis: AccessBasis },
    /// Authorization failed.
    Denied { reason: String },
    /// The operation completed.
    Completed,
    /// The operation was authorized but failed (crypto, storage, duplicate share).
    Failed { reason: String },
}

impl AuditOutcome {
    pub fn is_denied(&self) -> bool {
        matches!(self, AuditOutcome::Denied { .. })
    }
}

/// One append-only audit entry.
///
/// Never carries key material or plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    /// `username@team` of the acting principal.
    pub actor: String,
    pub team: TeamId,
    pub action: AuditAction,
    pub record: Option<RecordId>,
    pub outcome: AuditOutcome,
    pub timestamp: i64,
}

impl AuditEvent {
    /// New event stamped with the current time.
    pub fn new(
        actor: &Principal,
        action: AuditAction,
        record: Option<RecordId>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            actor: actor.label(),
            team: actor.team.clone(),
            action,
            record,
            outcome,
            timestamp: now_millis(),
        }
    }
}

/// Receives audit events. Implementations must not block for long; they are
/// called inline on every authorization decision.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events so far.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Number of events so far.
    pub fn len(&self) -> usize {
        self.events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Emits each event as a structured `tracing` event under [`AUDIT_TARGET`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        let record = event.record.map(|id| id.to_string()).unwrap_or_default();

        match &event.outcome {
            AuditOutcome::Granted { basis } => info!(
                target: AUDIT_TARGET,
                actor = %event.actor,
                action = event.action.name(),
                record = %record,
                basis = %basis,
                timestamp = event.timestamp,
                "access granted"
            ),
            AuditOutcome::Completed => info!(
                target: AUDIT_TARGET,
                actor = %event.actor,
                action = event.action.name(),
                record = %record,
                timestamp = event.timestamp,
                "completed"
            ),
            AuditOutcome::Denied { reason } => warn!(
                target: AUDIT_TARGET,
                actor = %event.actor,
                action = event.action.name(),
                record = %record,
                reason = %reason,
                timestamp = event.timestamp,
                "access denied"
            ),
            AuditOutcome::Failed { reason } => warn!(
                target: AUDIT_TARGET,
                actor = %event.actor,
                action = event.action.name(),
                record = %record,
                reason = %reason,
                timestamp = event.timestamp,
                "failed"
            ),
        }
    }
}
