//! Decision delivery to the host.
//!
//! Every `check_validity` call gets a [`RequestToken`]. Its callback receives
//! the local decision before `check_validity` returns, then at most one remote
//! decision later on. The callback waits in a [`PendingSlot`] for the remote
//! decision; a newer request replaces it.

use std::fmt;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Identifies one `check_validity` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestToken(Uuid);

impl RequestToken {
    /// Creates a new time-ordered token.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// The underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which path produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Fast path, from persisted local state.
    Local,
    /// Remote synchronization. `usable` is true only for `Accepted`.
    Remote,
}

/// A usability decision delivered to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// The request this decision answers.
    pub token: RequestToken,
    /// The path that produced it.
    pub origin: Origin,
    /// Whether the application may run.
    pub usable: bool,
}

/// Host callback receiving decisions.
pub type DecisionCallback = Arc<dyn Fn(Decision) + Send + Sync>;

struct Pending {
    token: RequestToken,
    callback: DecisionCallback,
}

/// Holds the callback awaiting a remote decision.
#[derive(Default)]
pub(crate) struct PendingSlot {
    inner: Mutex<Option<Pending>>,
}

impl PendingSlot {
    /// Arms the slot, replacing any earlier callback.
    pub(crate) fn store(&self, token: RequestToken, callback: DecisionCallback) {
        if let Ok(mut slot) = self.inner.lock() {
            *slot = Some(Pending { token, callback });
        }
    }

    /// Empties the slot, returning what was armed.
    pub(crate) fn take(&self) -> Option<(RequestToken, DecisionCallback)> {
        let pending = self.inner.lock().ok()?.take()?;
        Some((pending.token, pending.callback))
    }

    /// Token of the armed request, if any.
    pub(crate) fn armed(&self) -> Option<RequestToken> {
        self.inner.lock().ok()?.as_ref().map(|p| p.token)
    }
}
