//! # Pitwall Testkit
//!
//! Testing utilities for Pitwall.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: A seeded vault over a memory store, with canned keys
//! - **Generators**: Proptest strategies for property-based testing
//!
//! RSA key generation dominates test time, so fixtures hand out
//! deterministic key pairs that are generated once per process.
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use pitwall_testkit::{canned_key_pair, record_from_params, RecordParams};
//!
//! proptest! {
//!     #[test]
//!     fn record_digest_matches(params: RecordParams) {
//!         let record = record_from_params(&params, &canned_key_pair(0));
//!         prop_assert_eq!(record.integrity_digest.len(), 64);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use pitwall_testkit::TestFixture;
//! use pitwall_core::Classification;
//!
//! let fixture = TestFixture::with_teams(&["fia", "ferrari"]).await;
//! let record = fixture.create("ferrari", "fp1", Classification::Confidential, b"{}").await;
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{canned_key_pair, multi_party_principals, principal_with_seed, TestFixture};
pub use generators::{record_from_params, RecordParams};
