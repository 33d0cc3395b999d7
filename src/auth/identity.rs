//! Identity records and capability resolution.
//!
//! An `IdentityRecord` is the persisted, minimal description of who is
//! logged in: an ordinary member with a privilege level, or the platform
//! owner. `Capabilities` is the derived view consumed by navigation
//! guards, which only ever branch on its boolean flags.

use serde::{Deserialize, Serialize};

/// Privilege level carried by non-owner identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub enum PrivilegeLevel {
    Administrator,
    Member,
}

/// Who is logged in, as persisted in the session store.
///
/// Owner status is a property of the variant, never of a privilege level.
/// Owner sessions are issued without a refresh credential and cannot be
/// renewed, only re-established by logging in again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub enum IdentityRecord {
    Owner { name: String },
    Member { name: String, privilege: PrivilegeLevel },
}

impl IdentityRecord {
    /// Display name of the logged-in subject
    pub fn name(&self) -> &str {
        match self {
            IdentityRecord::Owner { name } => name,
            IdentityRecord::Member { name, .. } => name,
        }
    }

    /// Capability flags for this record
    pub fn capabilities(&self) -> Capabilities {
        Capabilities::resolve(Some(self))
    }
}

/// Boolean capability flags derived from the current identity.
///
/// This is the only session state the navigation layer reads. All four
/// flags are false when nobody is logged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Capabilities {
    pub authenticated: bool,
    pub owner: bool,
    pub administrator: bool,
    pub member: bool,
}

impl Capabilities {
    /// Derive capability flags from an identity record, if any.
    ///
    /// Total over every input: no record means all flags are false, and
    /// `administrator`/`member` are mutually exclusive on member records.
    pub fn resolve(record: Option<&IdentityRecord>) -> Self {
        match record {
            None => Self::default(),
            Some(IdentityRecord::Owner { .. }) => Self {
                authenticated: true,
                owner: true,
                administrator: false,
                member: false,
            },
            Some(IdentityRecord::Member { privilege, .. }) => Self {
                authenticated: true,
                owner: false,
                administrator: *privilege == PrivilegeLevel::Administrator,
                member: *privilege == PrivilegeLevel::Member,
            },
        }
    }
}
