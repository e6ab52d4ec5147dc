//! # Pitwall Access
//!
//! Authorization before decryption.
//!
//! ## Overview
//!
//! Whether a team may open a record is decided by one pure, ordered procedure
//! ([`decide`]): auditor, owner, public, shared, denied. The
//! [`AccessController`] runs that procedure against the store, resolves which
//! wrapping of the data key the reader unwraps, and orchestrates sharing by
//! re-wrapping the data key for a new team.
//!
//! ## Key Types
//!
//! - [`AccessDecision`] / [`AccessBasis`] / [`KeySource`] - tagged outcome of a decision
//! - [`AccessController`] - read gate, share orchestration, grant and record listing
//! - [`AuditSink`] / [`AuditEvent`] - where every decision and fault is reported
//!
//! ## Concurrency
//!
//! Shares of the same record to the same recipient are serialized by a
//! per-pair lock, and the store rejects a second grant for the pair
//! atomically. Two concurrent identical shares yield one grant and one
//! [`AccessError::AlreadyShared`].

pub mod audit;
pub mod controller;
pub mod decision;
pub mod error;

pub use audit::{
    AuditAction, AuditEvent, AuditOutcome, AuditSink, MemoryAuditSink, TracingAuditSink,
    AUDIT_TARGET,
};
pub use controller::{AccessController, GrantSummary, OpenedRecord, ReadAccess};
pub use decision::{decide, AccessBasis, AccessDecision, AccessPolicy, KeySource};
pub use error::{AccessError, Result};
