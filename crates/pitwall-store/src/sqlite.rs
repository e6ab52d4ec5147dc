//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for Pitwall. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use pitwall_core::{
    Classification, ContentCipher, ContentNonce, Grant, KeyPair, Principal, PrivateKeyPem,
    PublicKeyPem, Record, RecordId, RecordSignature, SealedContent, TeamId, WrappedKey,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{InsertResult, Store};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", true)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(format!("sqlite connection: {e}")))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {}", e)))?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row Decoding
// ─────────────────────────────────────────────────────────────────────────────

const PRINCIPAL_COLUMNS: &str = "team, username, public_key, private_key, created_at";

const RECORD_COLUMNS: &str = "record_id, name, owner_team, classification, cipher, body, nonce,
     wrapped_key, signature, integrity_digest, created_at";

const GRANT_COLUMNS: &str = "record_id, grantee_team, granted_by, wrapped_key, created_at";

fn row_to_principal(row: &rusqlite::Row<'_>) -> rusqlite::Result<Principal> {
    let team: String = row.get("team")?;
    let public_key: String = row.get("public_key")?;
    let private_key: String = row.get("private_key")?;

    Ok(Principal {
        username: row.get("username")?,
        team: TeamId::new(team),
        key_pair: KeyPair::from_parts(
            PublicKeyPem::from_trusted(public_key),
            PrivateKeyPem::from_pem(private_key),
        ),
        created_at: row.get("created_at")?,
    })
}

/// A records row before validation of its binary columns.
struct RecordRow {
    record_id: Vec<u8>,
    name: String,
    owner_team: String,
    classification: String,
    cipher: u8,
    body: Vec<u8>,
    nonce: Vec<u8>,
    wrapped_key: Vec<u8>,
    signature: Vec<u8>,
    integrity_digest: String,
    created_at: i64,
}

impl RecordRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            record_id: row.get("record_id")?,
            name: row.get("name")?,
            owner_team: row.get("owner_team")?,
            classification: row.get("classification")?,
            cipher: row.get("cipher")?,
            body: row.get("body")?,
            nonce: row.get("nonce")?,
            wrapped_key: row.get("wrapped_key")?,
            signature: row.get("signature")?,
            integrity_digest: row.get("integrity_digest")?,
            created_at: row.get("created_at")?,
        })
    }

    fn into_record(self) -> Result<Record> {
        let id = record_id_from_blob(&self.record_id)?;
        let cipher = ContentCipher::from_u8(self.cipher)
            .ok_or_else(|| StoreError::InvalidData(format!("unknown cipher tag {}", self.cipher)))?;
        let classification: Classification = self.classification.parse()?;
        let content = SealedContent::from_combined(
            cipher,
            &self.body,
            ContentNonce::from_slice(&self.nonce)?,
            WrappedKey::from_bytes(self.wrapped_key),
        )?;

        Ok(Record {
            id,
            name: self.name,
            owner_team: TeamId::new(self.owner_team),
            classification,
            content,
            signature: RecordSignature::from_bytes(self.signature),
            integrity_digest: self.integrity_digest,
            created_at: self.created_at,
        })
    }
}

/// A grants row before validation of its binary columns.
struct GrantRow {
    record_id: Vec<u8>,
    grantee_team: String,
    granted_by: String,
    wrapped_key: Vec<u8>,
    created_at: i64,
}

impl GrantRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            record_id: row.get("record_id")?,
            grantee_team: row.get("grantee_team")?,
            granted_by: row.get("granted_by")?,
            wrapped_key: row.get("wrapped_key")?,
            created_at: row.get("created_at")?,
        })
    }

    fn into_grant(self) -> Result<Grant> {
        Ok(Grant {
            record_id: record_id_from_blob(&self.record_id)?,
            grantee: TeamId::new(self.grantee_team),
            granted_by: TeamId::new(self.granted_by),
            wrapped_key: WrappedKey::from_bytes(self.wrapped_key),
            created_at: self.created_at,
        })
    }
}

fn record_id_from_blob(bytes: &[u8]) -> Result<RecordId> {
    RecordId::try_from(bytes)
        .map_err(|_| StoreError::InvalidData(format!("record_id is {} bytes, expected 32", bytes.len())))
}

fn query_grants<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Grant>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, GrantRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(GrantRow::into_grant).collect()
}

fn insert_result(changed: usize) -> InsertResult {
    if changed == 0 {
        InsertResult::AlreadyExists
    } else {
        InsertResult::Inserted
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_principal(&self, principal: &Principal) -> Result<InsertResult> {
        let principal = principal.clone();

        self.blocking(move |conn| {
            let changed = conn.execute(
                "INSERT INTO principals (team, username, public_key, private_key, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT DO NOTHING",
                params![
                    principal.team.as_str(),
                    principal.username,
                    principal.key_pair.public_key().as_str(),
                    principal.key_pair.private_key().expose_secret(),
                    principal.created_at,
                ],
            )?;
            Ok(insert_result(changed))
        })
        .await
    }

    async fn load_principal(&self, team: &TeamId) -> Result<Option<Principal>> {
        let team = team.clone();

        self.blocking(move |conn| {
            conn.query_row(
                &format!("SELECT {PRINCIPAL_COLUMNS} FROM principals WHERE team = ?1"),
                params![team.as_str()],
                row_to_principal,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn list_principals(&self) -> Result<Vec<Principal>> {
        self.blocking(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {PRINCIPAL_COLUMNS} FROM principals ORDER BY team"))?;
            let principals = stmt
                .query_map([], row_to_principal)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(principals)
        })
        .await
    }

    async fn save_record(&self, record: &Record) -> Result<InsertResult> {
        let record = record.clone();

        self.blocking(move |conn| {
            let changed = conn.execute(
                "INSERT INTO records (
                    record_id, name, owner_team, classification, cipher, body, nonce,
                    wrapped_key, signature, integrity_digest, created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT DO NOTHING",
                params![
                    record.id.as_bytes().as_slice(),
                    record.name,
                    record.owner_team.as_str(),
                    record.classification.as_str(),
                    record.content.cipher.to_u8(),
                    record.content.combined(),
                    record.content.nonce.as_bytes().as_slice(),
                    record.content.wrapped_key.as_bytes(),
                    record.signature.as_bytes(),
                    record.integrity_digest,
                    record.created_at,
                ],
            )?;
            Ok(insert_result(changed))
        })
        .await
    }

    async fn load_record(&self, id: &RecordId) -> Result<Option<Record>> {
        let id = *id;

        self.blocking(move |conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {RECORD_COLUMNS} FROM records WHERE record_id = ?1"),
                    params![id.as_bytes().as_slice()],
                    RecordRow::from_row,
                )
                .optional()?;
            row.map(RecordRow::into_record).transpose()
        })
        .await
    }

    async fn list_records(&self) -> Result<Vec<Record>> {
        self.blocking(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM records ORDER BY created_at, record_id"
            ))?;
            let rows = stmt
                .query_map([], RecordRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(RecordRow::into_record).collect()
        })
        .await
    }

    async fn insert_grant(&self, grant: &Grant) -> Result<InsertResult> {
        let grant = grant.clone();

        self.blocking(move |conn| {
            let changed = conn.execute(
                "INSERT INTO grants (record_id, grantee_team, granted_by, wrapped_key, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (record_id, grantee_team) DO NOTHING",
                params![
                    grant.record_id.as_bytes().as_slice(),
                    grant.grantee.as_str(),
                    grant.granted_by.as_str(),
                    grant.wrapped_key.as_bytes(),
                    grant.created_at,
                ],
            )?;
            Ok(insert_result(changed))
        })
        .await
    }

    async fn load_grant(&self, record: &RecordId, grantee: &TeamId) -> Result<Option<Grant>> {
        let record = *record;
        let grantee = grantee.clone();

        self.blocking(move |conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {GRANT_COLUMNS} FROM grants WHERE record_id = ?1 AND grantee_team = ?2"
                    ),
                    params![record.as_bytes().as_slice(), grantee.as_str()],
                    GrantRow::from_row,
                )
                .optional()?;
            row.map(GrantRow::into_grant).transpose()
        })
        .await
    }

    async fn list_grants_for_record(&self, record: &RecordId) -> Result<Vec<Grant>> {
        let record = *record;

        self.blocking(move |conn| {
            query_grants(
                conn,
                &format!(
                    "SELECT {GRANT_COLUMNS} FROM grants WHERE record_id = ?1
                     ORDER BY created_at, grantee_team"
                ),
                params![record.as_bytes().as_slice()],
            )
        })
        .await
    }

    async fn list_grants_for_grantee(&self, grantee: &TeamId) -> Result<Vec<Grant>> {
        let grantee = grantee.clone();

        self.blocking(move |conn| {
            query_grants(
                conn,
                &format!(
                    "SELECT {GRANT_COLUMNS} FROM grants WHERE grantee_team = ?1
                     ORDER BY created_at, record_id"
                ),
                params![grantee.as_str()],
            )
        })
        .await
    }

    async fn reset(&self) -> Result<()> {
        self.blocking(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM grants", [])?;
            tx.execute("DELETE FROM records", [])?;
            tx.execute("DELETE FROM principals", [])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitwall_core::{EnvelopeCipher, KeyVault};
    use std::sync::OnceLock;

    fn keys() -> &'static KeyPair {
        static KEYS: OnceLock<KeyPair> = OnceLock::new();
        KEYS.get_or_init(|| KeyVault::generate().unwrap())
    }

    fn make_principal(username: &str, team: &str) -> Principal {
        Principal {
            username: username.to_string(),
            team: TeamId::new(team),
            key_pair: keys().clone(),
            created_at: 1_234,
        }
    }

    fn make_record(name: &str, classification: Classification, created_at: i64) -> Record {
        Record::create(
            &EnvelopeCipher::default(),
            &TeamId::new("ferrari"),
            keys(),
            name,
            classification,
            b"{\"x\":1}",
            created_at,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_load_principal() {
        let store = SqliteStore::open_memory().unwrap();

        let result = store.insert_principal(&make_principal("ferrari", "ferrari")).await.unwrap();
        assert_eq!(result, InsertResult::Inserted);

        let loaded = store.load_principal(&TeamId::new("ferrari")).await.unwrap().unwrap();
        assert_eq!(loaded.username, "ferrari");
        assert_eq!(loaded.key_pair.public_key(), keys().public_key());
        assert_eq!(
            loaded.key_pair.private_key().expose_secret(),
            keys().private_key().expose_secret()
        );
    }

    #[tokio::test]
    async fn test_team_holds_one_principal() {
        let store = SqliteStore::open_memory().unwrap();
        store.insert_principal(&make_principal("alice", "ferrari")).await.unwrap();

        let dup = store.insert_principal(&make_principal("bob", "ferrari")).await.unwrap();
        assert_eq!(dup, InsertResult::AlreadyExists);
        assert_eq!(store.list_principals().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_record_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let record = make_record("monza", Classification::Public, 42);

        assert_eq!(store.save_record(&record).await.unwrap(), InsertResult::Inserted);
        assert_eq!(store.save_record(&record).await.unwrap(), InsertResult::AlreadyExists);

        let loaded = store.load_record(&record.id).await.unwrap().unwrap();
        assert_eq!(loaded, record);

        let plaintext = EnvelopeCipher::decrypt(&loaded.content, keys().private_key()).unwrap();
        assert_eq!(&plaintext[..], b"{\"x\":1}");
    }

    #[tokio::test]
    async fn test_list_records_ordered_by_creation() {
        let store = SqliteStore::open_memory().unwrap();
        store.save_record(&make_record("third", Classification::Public, 30)).await.unwrap();
        store.save_record(&make_record("first", Classification::Confidential, 10)).await.unwrap();
        store.save_record(&make_record("second", Classification::Public, 20)).await.unwrap();

        let names: Vec<String> = store
            .list_records()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_grant_unique_per_pair() {
        let store = SqliteStore::open_memory().unwrap();
        let record = make_record("r", Classification::Confidential, 1);
        store.save_record(&record).await.unwrap();

        let grant = Grant {
            record_id: record.id,
            grantee: TeamId::new("mclaren"),
            granted_by: TeamId::new("ferrari"),
            wrapped_key: WrappedKey::from_bytes(vec![0xaa; 256]),
            created_at: 5,
        };
        let mut other = grant.clone();
        other.wrapped_key = WrappedKey::from_bytes(vec![0xbb; 256]);

        assert_eq!(store.insert_grant(&grant).await.unwrap(), InsertResult::Inserted);
        assert_eq!(store.insert_grant(&other).await.unwrap(), InsertResult::AlreadyExists);

        let loaded = store
            .load_grant(&record.id, &TeamId::new("mclaren"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, grant);

        assert_eq!(store.list_grants_for_record(&record.id).await.unwrap(), vec![grant.clone()]);
        assert_eq!(
            store.list_grants_for_grantee(&TeamId::new("mclaren")).await.unwrap(),
            vec![grant]
        );
        assert!(store
            .load_grant(&record.id, &TeamId::new("redbull"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_grant_requires_stored_record() {
        let store = SqliteStore::open_memory().unwrap();
        let unsaved = make_record("r", Classification::Confidential, 1);

        let grant = Grant {
            record_id: unsaved.id,
            grantee: TeamId::new("mclaren"),
            granted_by: TeamId::new("ferrari"),
            wrapped_key: WrappedKey::from_bytes(vec![0xaa; 256]),
            created_at: 5,
        };
        assert!(matches!(
            store.insert_grant(&grant).await,
            Err(StoreError::Database(_))
        ));
        assert!(store.list_grants_for_record(&unsaved.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_row_is_invalid_data() {
        let store = SqliteStore::open_memory().unwrap();
        let record = make_record("r", Classification::Confidential, 1);
        store.save_record(&record).await.unwrap();

        store
            .blocking(|conn| {
                conn.execute("UPDATE records SET nonce = x'00'", [])?;
                Ok(())
            })
            .await
            .unwrap();

        assert!(matches!(
            store.load_record(&record.id).await,
            Err(StoreError::InvalidData(_))
        ));
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let store = SqliteStore::open_memory().unwrap();
        let record = make_record("r", Classification::Confidential, 1);
        store.insert_principal(&make_principal("ferrari", "ferrari")).await.unwrap();
        store.save_record(&record).await.unwrap();

        store.reset().await.unwrap();

        assert!(store.list_principals().await.unwrap().is_empty());
        assert!(store.load_record(&record.id).await.unwrap().is_none());
    }
}
