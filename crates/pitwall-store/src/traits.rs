//! Store trait: the abstract interface for principal, record and grant persistence.
//!
//! The access layer and the vault facade are storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use pitwall_core::{Grant, Principal, Record, RecordId, TeamId};

use crate::error::Result;

/// Result of an insert that must not overwrite existing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// The row was new and is now stored.
    Inserted,
    /// A row with the same unique key already exists; nothing was written.
    AlreadyExists,
}

impl InsertResult {
    pub fn is_inserted(&self) -> bool {
        matches!(self, InsertResult::Inserted)
    }
}

/// The Store trait: async interface for persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **Atomic inserts**: every `insert_*`/`save_*` method checks uniqueness and
///   writes in one step. Two concurrent inserts of the same key yield exactly one
///   `Inserted` and one `AlreadyExists`.
/// - **No updates**: principals, records and grants are immutable once stored.
/// - **No retries**: failures are reported once; callers decide what to do.
/// - **Single deletion path**: [`reset`](Store::reset) wipes everything.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Principal Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a principal. Unique on team (and therefore on username + team).
    async fn insert_principal(&self, principal: &Principal) -> Result<InsertResult>;

    /// Get the principal for a team.
    async fn load_principal(&self, team: &TeamId) -> Result<Option<Principal>>;

    /// List all principals, ordered by team.
    async fn list_principals(&self) -> Result<Vec<Principal>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Record Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Persist a record. Content, nonce, wrapped key and signature are written
    /// together or not at all.
    async fn save_record(&self, record: &Record) -> Result<InsertResult>;

    /// Get a record by ID.
    async fn load_record(&self, id: &RecordId) -> Result<Option<Record>>;

    /// List all records, ordered by creation time.
    async fn list_records(&self) -> Result<Vec<Record>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Grant Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a grant. Unique on (record, grantee); an existing grant is never
    /// overwritten.
    async fn insert_grant(&self, grant: &Grant) -> Result<InsertResult>;

    /// Get the grant for a (record, grantee) pair.
    async fn load_grant(&self, record: &RecordId, grantee: &TeamId) -> Result<Option<Grant>>;

    /// List grants issued for a record, ordered by creation time.
    async fn list_grants_for_record(&self, record: &RecordId) -> Result<Vec<Grant>>;

    /// List grants held by a team, ordered by creation time.
    async fn list_grants_for_grantee(&self, grantee: &TeamId) -> Result<Vec<Grant>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Bulk Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Delete every grant, record and principal.
    async fn reset(&self) -> Result<()>;
}
