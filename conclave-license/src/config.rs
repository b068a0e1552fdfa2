//! Gate configuration.

use serde::{Deserialize, Serialize};

/// Preference namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "conclave";

/// Remote service name used when none is configured.
pub const DEFAULT_SERVICE_NAME: &str = "Conclave";

/// Trial allowance assumed until the host sets one.
pub const DEFAULT_TRIAL_ALLOWANCE: u32 = 1;

/// How the fast path treats an installation that is awaiting approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingPolicy {
    /// `Pending` consumes the trial allowance and becomes `Rejected` once it
    /// runs out.
    #[default]
    Metered,
    /// `Pending` is usable without limit, like `Accepted`.
    Trusted,
}

/// Configuration for the entitlement gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Preference namespace holding the gate's keys.
    pub namespace: String,
    /// Trial allowance read while the host has not set one.
    pub default_trial_allowance: u32,
    /// Name under which the remote service handle is cached.
    pub service_name: String,
    /// Fast-path treatment of `Pending`.
    pub pending_policy: PendingPolicy,
    /// Persist `Pending` locally right after a successful enrollment write.
    pub reflect_enrollment: bool,
    /// Start a background sync from every `check_validity`.
    pub sync_on_check: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            default_trial_allowance: DEFAULT_TRIAL_ALLOWANCE,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            pending_policy: PendingPolicy::default(),
            reflect_enrollment: true,
            sync_on_check: true,
        }
    }
}
