//! Trial allowance policy.
//!
//! Pure decision logic; the gate persists whatever [`apply`] returns.

use crate::config::PendingPolicy;
use crate::status::EntitlementStatus;

/// Result of evaluating one launch against local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialStep {
    /// Whether this launch may proceed.
    pub usable: bool,
    /// Counter value to persist, `None` if unchanged.
    pub remaining: Option<u32>,
    /// Status to persist, `None` if unchanged.
    pub status: Option<EntitlementStatus>,
}

impl TrialStep {
    fn unchanged(usable: bool) -> Self {
        Self {
            usable,
            remaining: None,
            status: None,
        }
    }
}

/// Evaluates one launch.
///
/// `Accepted` passes without touching the counter (and so does `Pending`
/// under [`PendingPolicy::Trusted`]). Everything else spends one unit of the
/// allowance: the counter drops by one unless already zero, the launch passes
/// only if the counter is still above zero afterwards, and a `Pending`
/// installation whose counter reached zero becomes `Rejected`.
#[must_use]
pub fn apply(status: EntitlementStatus, remaining: u32, policy: PendingPolicy) -> TrialStep {
    match (status, policy) {
        (EntitlementStatus::Accepted, _) => return TrialStep::unchanged(true),
        (EntitlementStatus::Pending, PendingPolicy::Trusted) => return TrialStep::unchanged(true),
        _ => {}
    }

    let after = remaining.saturating_sub(1);
    let remaining_update = (after != remaining).then_some(after);
    let status_update =
        (after == 0 && status == EntitlementStatus::Pending).then_some(EntitlementStatus::Rejected);

    TrialStep {
        usable: after > 0,
        remaining: remaining_update,
        status: status_update,
    }
}
