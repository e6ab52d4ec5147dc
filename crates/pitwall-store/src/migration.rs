//! Database schema migrations for SQLite.
//!
//! A simple versioned migration system. Each migration is a SQL batch that
//! transforms the schema from version N to N+1.

use rusqlite::Connection;
use tracing::info;

use pitwall_core::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// Idempotent: can be called on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        info!(from = current, to = CURRENT_VERSION, "migrated store schema");
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: principals, records, grants.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One principal (and one key pair) per team
        CREATE TABLE principals (
            team TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            public_key TEXT NOT NULL,         -- SPKI PEM
            private_key TEXT NOT NULL,        -- PKCS#8 PEM
            created_at INTEGER NOT NULL,

            UNIQUE(username, team)
        );

        -- Encrypted records; all crypto columns are NOT NULL and written in one row
        CREATE TABLE records (
            record_id BLOB PRIMARY KEY,       -- 32 bytes, Blake3
            name TEXT NOT NULL,
            owner_team TEXT NOT NULL,
            classification TEXT NOT NULL,     -- 'public' | 'confidential'
            cipher INTEGER NOT NULL,          -- ContentCipher as u8
            body BLOB NOT NULL,               -- ciphertext || 16-byte tag
            nonce BLOB NOT NULL,              -- 12 bytes
            wrapped_key BLOB NOT NULL,        -- RSA-OAEP, owner's public key
            signature BLOB NOT NULL,          -- RSA-PSS over plaintext
            integrity_digest TEXT NOT NULL,   -- SHA-256 hex of plaintext
            created_at INTEGER NOT NULL
        );

        -- Data key re-wrapped for one additional team
        CREATE TABLE grants (
            record_id BLOB NOT NULL REFERENCES records(record_id),
            grantee_team TEXT NOT NULL,
            granted_by TEXT NOT NULL,
            wrapped_key BLOB NOT NULL,
            created_at INTEGER NOT NULL,

            UNIQUE(record_id, grantee_team)
        );

        CREATE INDEX idx_records_owner ON records(owner_team);
        CREATE INDEX idx_records_created ON records(created_at);
        CREATE INDEX idx_grants_grantee ON grants(grantee_team);
        "#,
    )?;

    Ok(())
}
