//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use pitwall_core::{Grant, Principal, Record, RecordId, TeamId};

use crate::error::{Result, StoreError};
use crate::traits::{InsertResult, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock; each
/// insert runs its uniqueness check and write under one write guard.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Principals indexed by team.
    principals: BTreeMap<TeamId, Principal>,

    /// Records indexed by ID.
    records: HashMap<RecordId, Record>,

    /// Grants indexed by (record, grantee).
    grants: HashMap<(RecordId, TeamId), Grant>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted_grants<'a>(grants: impl Iterator<Item = &'a Grant>) -> Vec<Grant> {
    let mut out: Vec<Grant> = grants.cloned().collect();
    out.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.grantee.cmp(&b.grantee))
    });
    out
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_principal(&self, principal: &Principal) -> Result<InsertResult> {
        let mut inner = self.write()?;

        if inner.principals.contains_key(&principal.team) {
            return Ok(InsertResult::AlreadyExists);
        }
        inner
            .principals
            .insert(principal.team.clone(), principal.clone());

        Ok(InsertResult::Inserted)
    }

    async fn load_principal(&self, team: &TeamId) -> Result<Option<Principal>> {
        Ok(self.read()?.principals.get(team).cloned())
    }

    async fn list_principals(&self) -> Result<Vec<Principal>> {
        Ok(self.read()?.principals.values().cloned().collect())
    }

    async fn save_record(&self, record: &Record) -> Result<InsertResult> {
        let mut inner = self.write()?;

        if inner.records.contains_key(&record.id) {
            return Ok(InsertResult::AlreadyExists);
        }
        inner.records.insert(record.id, record.clone());

        Ok(InsertResult::Inserted)
    }

    async fn load_record(&self, id: &RecordId) -> Result<Option<Record>> {
        Ok(self.read()?.records.get(id).cloned())
    }

    async fn list_records(&self) -> Result<Vec<Record>> {
        let inner = self.read()?;
        let mut records: Vec<Record> = inner.records.values().cloned().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn insert_grant(&self, grant: &Grant) -> Result<InsertResult> {
        let mut inner = self.write()?;

        if !inner.records.contains_key(&grant.record_id) {
            return Err(StoreError::InvalidData(format!(
                "grant references unknown record {}",
                grant.record_id
            )));
        }

        let key = (grant.record_id, grant.grantee.clone());
        if inner.grants.contains_key(&key) {
            return Ok(InsertResult::AlreadyExists);
        }
        inner.grants.insert(key, grant.clone());

        Ok(InsertResult::Inserted)
    }

    async fn load_grant(&self, record: &RecordId, grantee: &TeamId) -> Result<Option<Grant>> {
        Ok(self
            .read()?
            .grants
            .get(&(*record, grantee.clone()))
            .cloned())
    }

    async fn list_grants_for_record(&self, record: &RecordId) -> Result<Vec<Grant>> {
        let inner = self.read()?;
        Ok(sorted_grants(
            inner.grants.values().filter(|g| &g.record_id == record),
        ))
    }

    async fn list_grants_for_grantee(&self, grantee: &TeamId) -> Result<Vec<Grant>> {
        let inner = self.read()?;
        Ok(sorted_grants(
            inner.grants.values().filter(|g| &g.grantee == grantee),
        ))
    }

    async fn reset(&self) -> Result<()> {
        let mut inner = self.write()?;
        inner.grants.clear();
        inner.records.clear();
        inner.principals.clear();
        Ok(())
    }
}
