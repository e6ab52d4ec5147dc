//! The ordered read-access decision procedure.
//!
//! [`decide`] is a pure function over the requester's team, the record and
//! the requester's grant (if any). Rules are evaluated in order and the first
//! match wins:
//!
//! 1. requester is the auditor team -> Granted (auditor), owner-wrapped key
//! 2. requester owns the record -> Granted (owner), owner-wrapped key
//! 3. record is `Public` -> Granted (public), own grant if present else owner-wrapped key
//! 4. requester holds a grant -> Granted (shared), grant key
//! 5. otherwise -> Denied

use serde::{Deserialize, Serialize};
use std::fmt;

use pitwall_core::{Classification, Grant, Record, TeamId};

/// Why access was granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessBasis {
    Auditor,
    Owner,
    Public,
    Shared,
}

impl AccessBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessBasis::Auditor => "auditor",
            AccessBasis::Owner => "owner",
            AccessBasis::Public => "public",
            AccessBasis::Shared => "shared",
        }
    }
}

impl fmt::Display for AccessBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which wrapping of the data key the reader unwraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySource {
    /// The record's own wrapped key, opened with the owning team's private key.
    OwnerWrapped,
    /// The requester's grant, opened with the requester's private key.
    Grant,
}

/// Terminal state of the decision procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Granted { basis: AccessBasis, key: KeySource },
    Denied,
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted { .. })
    }

    /// The basis, if granted.
    pub fn basis(&self) -> Option<AccessBasis> {
        match self {
            AccessDecision::Granted { basis, .. } => Some(*basis),
            AccessDecision::Denied => None,
        }
    }
}

/// Access policy settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessPolicy {
    /// Team with unrestricted read visibility over every record.
    pub auditor_team: TeamId,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            auditor_team: TeamId::new("fia"),
        }
    }
}

impl AccessPolicy {
    pub fn new(auditor_team: TeamId) -> Self {
        Self { auditor_team }
    }

    pub fn is_auditor(&self, team: &TeamId) -> bool {
        &self.auditor_team == team
    }
}

/// Run the decision procedure.
///
/// `grant` must be the requester's own grant for `record`, if one exists.
pub fn decide(
    policy: &AccessPolicy,
    requester: &TeamId,
    record: &Record,
    grant: Option<&Grant>,
) -> AccessDecision {
    let grant = grant.filter(|g| &g.grantee == requester && g.record_id == record.id);

    if policy.is_auditor(requester) {
        return AccessDecision::Granted {
            basis: AccessBasis::Auditor,
            key: KeySource::OwnerWrapped,
        };
    }

    if record.is_owned_by(requester) {
        return AccessDecision::Granted {
            basis: AccessBasis::Owner,
            key: KeySource::OwnerWrapped,
        };
    }

    if record.classification == Classification::Public {
        let key = if grant.is_some() {
            KeySource::Grant
        } else {
            KeySource::OwnerWrapped
        };
        return AccessDecision::Granted {
            basis: AccessBasis::Public,
            key,
        };
    }

    if grant.is_some() {
        return AccessDecision::Granted {
            basis: AccessBasis::Shared,
            key: KeySource::Grant,
        };
    }

    AccessDecision::Denied
}
