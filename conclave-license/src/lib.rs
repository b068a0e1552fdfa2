//! Entitlement gate for Conclave.
//!
//! Decides on every launch whether an application may run:
//! - An installation approved by the remote authority always runs
//! - Otherwise a small local trial allowance is spent, one launch at a time
//! - A background sync signs the user in, files or reads their record with
//!   the authority, and stores the authority's verdict for the next launch
//!
//! # Design Principles
//!
//! - **Offline-first**: the launch decision never waits on the network
//! - **Remote is authoritative**: a successful sync overwrites local status
//! - **Fail closed**: unknown remote statuses change nothing
//! - **Undercount, never extend**: the trial counter is persisted before the
//!   status it may trigger
//!
//! # Example
//!
//! ```
//! use conclave_license::{EntitlementGate, Origin};
//! use conclave_storage::MemoryPreferences;
//! use std::sync::Arc;
//!
//! let gate = EntitlementGate::builder("ConclaveTest")
//!     .preferences(Arc::new(MemoryPreferences::new()))
//!     .on_first_run(|gate| gate.set_trial_allowance(3))
//!     .build()
//!     .unwrap();
//!
//! let check = gate
//!     .check_validity(|decision| {
//!         if decision.origin == Origin::Local && !decision.usable {
//!             eprintln!("trial over");
//!         }
//!     })
//!     .unwrap();
//! assert!(check.usable());
//! ```

mod config;
mod delivery;
mod error;
mod gate;
pub mod registry;
mod remote;
mod status;
mod sync;
pub mod trial;

pub use config::{
    GateConfig, PendingPolicy, DEFAULT_NAMESPACE, DEFAULT_SERVICE_NAME, DEFAULT_TRIAL_ALLOWANCE,
};
pub use delivery::{Decision, DecisionCallback, Origin, RequestToken};
pub use error::{LicenseError, LicenseResult};
pub use gate::{Check, EntitlementGate, FirstRunHook, GateBuilder, GateSnapshot};
pub use registry::{RemoteService, ServiceInit};
pub use remote::{
    Account, EntitlementRecord, EntitlementStore, IdentityProvider, SignIn, UserId,
};
pub use status::EntitlementStatus;
pub use sync::SyncOutcome;
