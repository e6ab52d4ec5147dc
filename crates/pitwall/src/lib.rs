//! # Pitwall
//!
//! Envelope-encrypted records with signed content, team-scoped access and
//! audited sharing.
//!
//! ## Overview
//!
//! Every principal belongs to one team and owns one RSA key pair. A record is
//! encrypted under a fresh data key; the data key is wrapped for the owning
//! team's public key and, on each share, re-wrapped for the recipient. The
//! plaintext is signed by the owner so any authorized reader can verify it.
//!
//! - **Owner**: always reads its own records.
//! - **Auditor**: one configured team reads everything.
//! - **Public**: records anyone may read.
//! - **Shared**: confidential records readable through a grant.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pitwall::{Classification, Vault, VaultConfig};
//! use pitwall::store::SqliteStore;
//!
//! async fn example() {
//!     let store = SqliteStore::open("pitwall.db").unwrap();
//!     let vault = Vault::new(store, VaultConfig::default());
//!
//!     let ferrari = vault.provision_principal("charles", "ferrari").await.unwrap();
//!     let mclaren = vault.provision_principal("lando", "mclaren").await.unwrap();
//!
//!     let record = vault
//!         .create_record(&ferrari, "quali-sim", Classification::Confidential, b"{\"x\":1}")
//!         .await
//!         .unwrap();
//!
//!     vault.share_record(&ferrari, &record.id, &mclaren.team).await.unwrap();
//!     let plaintext = vault.read_record(&mclaren, &record.id).await.unwrap();
//!     assert_eq!(&plaintext[..], b"{\"x\":1}");
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `pitwall::core` - Keys, envelope encryption, signatures, record model
//! - `pitwall::store` - Storage abstraction, memory and SQLite backends
//! - `pitwall::access` - Access decisions, audit sinks, share orchestration

pub mod config;
pub mod error;
pub mod vault;

// Re-export component crates
pub use pitwall_access as access;
pub use pitwall_core as core;
pub use pitwall_store as store;

// Re-export main types for convenience
pub use config::{VaultConfig, DEFAULT_MAX_RECORD_SIZE};
pub use error::{ErrorKind, Result, VaultError};
pub use vault::{RecordSummary, Vault, VaultStats};

// Re-export commonly used component types
pub use pitwall_access::{AccessBasis, AuditEvent, AuditSink, GrantSummary, MemoryAuditSink};
pub use pitwall_core::{
    Classification, ContentCipher, Grant, Plaintext, Principal, PublicKeyPem, Record, RecordId,
    TeamId,
};
