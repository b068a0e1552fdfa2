//! Remote collaborators for the Conclave entitlement gate.
//!
//! - [`HttpEntitlementStore`]: per-user records behind a small REST authority
//! - [`OAuthIdentityProvider`]: OAuth2 authorization-code sign-in
//! - [`MemoryEntitlementStore`] and [`FixedIdentity`]: in-process stand-ins
//!
//! # Example
//!
//! ```no_run
//! use conclave_license::EntitlementGate;
//! use conclave_remote::{FixedIdentity, HttpEntitlementStore, HttpStoreConfig};
//! use std::sync::Arc;
//!
//! # fn main() -> conclave_license::LicenseResult<()> {
//! let gate = EntitlementGate::builder("com.example.app")
//!     .remote(|_| {
//!         let store = HttpEntitlementStore::new(HttpStoreConfig::default())?;
//!         Ok(conclave_license::RemoteService::new(
//!             "Conclave",
//!             Arc::new(FixedIdentity::email("ada@example.com")),
//!             Arc::new(store),
//!         ))
//!     })
//!     .build()?;
//! # let _ = gate;
//! # Ok(())
//! # }
//! ```

mod http_store;
mod memory;
mod oauth;

pub use http_store::{HttpEntitlementStore, HttpStoreConfig};
pub use memory::{FixedIdentity, MemoryEntitlementStore};
pub use oauth::{CodePrompt, OAuthConfig, OAuthIdentityProvider};
