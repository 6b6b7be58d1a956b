//! Access control types
//!
//! Core types used by the access control system.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Access granted to a caller on a repository
///
/// Levels are ordered, so `level >= AccessLevel::ReadWrite` reads as
/// "may push".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum AccessLevel {
    #[default]
    NoAccess,
    ReadOnly,
    ReadWrite,
    #[serde(rename = "admin-access")]
    Admin,
}

impl AccessLevel {
    /// Get the level name as used in configuration
    pub const fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::NoAccess => "no-access",
            AccessLevel::ReadOnly => "read-only",
            AccessLevel::ReadWrite => "read-write",
            AccessLevel::Admin => "admin-access",
        }
    }

    /// Check if this level allows reading
    pub const fn can_read(&self) -> bool {
        !matches!(self, AccessLevel::NoAccess)
    }

    /// Check if this level allows pushing
    pub const fn can_write(&self) -> bool {
        matches!(self, AccessLevel::ReadWrite | AccessLevel::Admin)
    }

    /// Get all levels, lowest first
    pub fn all() -> &'static [AccessLevel] {
        &[
            AccessLevel::NoAccess,
            AccessLevel::ReadOnly,
            AccessLevel::ReadWrite,
            AccessLevel::Admin,
        ]
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Anonymous access mode from the `anon-access` setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnonAccess {
    NoAccess,
    ReadOnly,
    ReadWrite,
    AdminAccess,
}

impl AnonAccess {
    /// Try to parse a mode from its configuration text
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "no-access" => Some(AnonAccess::NoAccess),
            "read-only" => Some(AnonAccess::ReadOnly),
            "read-write" => Some(AnonAccess::ReadWrite),
            "admin-access" => Some(AnonAccess::AdminAccess),
            _ => None,
        }
    }

    /// The access level anonymous callers receive under this mode
    pub const fn level(&self) -> AccessLevel {
        match self {
            AnonAccess::NoAccess => AccessLevel::NoAccess,
            AnonAccess::ReadOnly => AccessLevel::ReadOnly,
            AnonAccess::ReadWrite => AccessLevel::ReadWrite,
            AnonAccess::AdminAccess => AccessLevel::Admin,
        }
    }

    /// Resolve configuration text to a level; unrecognised modes grant nothing
    pub fn level_for(s: &str) -> AccessLevel {
        Self::parse(s)
            .map(|mode| mode.level())
            .unwrap_or(AccessLevel::NoAccess)
    }
}
