//! The entitlement status and its persisted/remote string form.
//!
//! Status strings are upper-case words (`NO_YET`, `PENDING`, `ACCEPTED`,
//! `REJECTED`). The same strings are used in local preferences and in the
//! remote authority's records.

use crate::error::{LicenseError, LicenseResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where an installation stands with the remote authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntitlementStatus {
    /// Initial state, written once at first run.
    #[serde(rename = "NO_YET", alias = "NOT_YET_CHECKED")]
    NotYetChecked,
    /// Recorded by the authority, awaiting approval.
    #[serde(rename = "PENDING")]
    Pending,
    /// Approved by the authority.
    #[serde(rename = "ACCEPTED")]
    Accepted,
    /// Trial exhausted without approval, or denied by the authority.
    #[serde(rename = "REJECTED")]
    Rejected,
}

impl EntitlementStatus {
    /// All variants, in lifecycle order.
    pub const ALL: [Self; 4] = [
        Self::NotYetChecked,
        Self::Pending,
        Self::Accepted,
        Self::Rejected,
    ];

    /// The persisted string form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotYetChecked => "NO_YET",
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Returns true only when the authority approved the installation.
    ///
    /// This is the predicate the remote path decides with. The fast path is
    /// more lenient with `Pending`, see [`PendingPolicy`](crate::PendingPolicy).
    #[must_use]
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Decodes the untyped `status` field of a remote record.
    ///
    /// Fails closed: anything other than a known status string is an error,
    /// and callers must leave local state untouched when they get one.
    pub fn from_remote(value: Option<&serde_json::Value>) -> LicenseResult<Self> {
        match value {
            None | Some(serde_json::Value::Null) => Err(LicenseError::MalformedRemoteStatus(
                "record has no status field".to_string(),
            )),
            Some(serde_json::Value::String(s)) => s.parse(),
            Some(other) => Err(LicenseError::MalformedRemoteStatus(format!(
                "expected a string, found {other}"
            ))),
        }
    }
}

impl FromStr for EntitlementStatus {
    type Err = LicenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "NO_YET" | "NOT_YET_CHECKED" => Ok(Self::NotYetChecked),
            "PENDING" => Ok(Self::Pending),
            "ACCEPTED" => Ok(Self::Accepted),
            "REJECTED" => Ok(Self::Rejected),
            other => Err(LicenseError::MalformedRemoteStatus(format!(
                "unknown status {other:?}"
            ))),
        }
    }
}

impl fmt::Display for EntitlementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
