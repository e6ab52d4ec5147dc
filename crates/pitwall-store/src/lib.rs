//! # Pitwall Store
//!
//! Storage abstraction for Pitwall. Provides a trait-based interface for
//! principal, record and grant persistence with SQLite and in-memory
//! implementations.
//!
//! ## Overview
//!
//! The access layer and the vault facade never touch a database directly;
//! they go through the [`Store`] trait. The primary implementation is
//! [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`InsertResult`] - Outcome of an insert that never overwrites
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pitwall_store::{SqliteStore, Store};
//! use pitwall_core::TeamId;
//!
//! async fn example() {
//!     let store = SqliteStore::open("pitwall.db").unwrap();
//!     let principal = store.load_principal(&TeamId::new("ferrari")).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Atomic inserts**: uniqueness is checked and the row written in one step
//! - **One grant per pair**: `(record, grantee)` is a unique key in both backends
//! - **No retries**: storage failures surface once to the caller

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{InsertResult, Store};
