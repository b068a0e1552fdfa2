//! Remote synchronization: reconcile local status with the authority.
//!
//! 1. Get or create the cached remote service
//! 2. Sign the user in (cancellation ends the run, nothing changes)
//! 3. Look up the user's record for this application
//! 4. No record: enroll the user as `PENDING`
//! 5. Record found: adopt its status locally and deliver a remote decision
//!    (`NO_YET` is never adopted; it only exists before the first local run)
//!
//! Every failure leaves local state as it was.

use crate::error::{LicenseError, LicenseResult};
use crate::gate::EntitlementGate;
use crate::registry;
use crate::remote::{EntitlementRecord, SignIn, UserId};
use crate::status::EntitlementStatus;
use tracing::{debug, error, info, warn};

/// How a synchronization run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The user cancelled sign-in.
    Cancelled,
    /// No record existed; a `PENDING` request was filed.
    Enrolled,
    /// The record was read and its status adopted locally.
    Refreshed(EntitlementStatus),
}

impl EntitlementGate {
    /// Runs the remote synchronization protocol once.
    ///
    /// `check_validity` runs this in the background; hosts may also call it
    /// directly, for example from a "check again" button.
    ///
    /// # Errors
    ///
    /// - [`LicenseError::NotConfigured`] if no remote service is bound
    /// - [`LicenseError::InvalidUserIdentity`] if sign-in yields no usable email
    /// - [`LicenseError::RemoteUnavailable`] on network or service failure
    /// - [`LicenseError::MalformedRemoteStatus`] if the record's status is unknown
    pub async fn synchronize(&self) -> LicenseResult<SyncOutcome> {
        let app_id = self.application_id().to_string();
        let init = self
            .service_init()
            .cloned()
            .ok_or_else(|| LicenseError::NotConfigured(app_id.clone()))?;

        let service_name = self.config().service_name.clone();
        let service = registry::get_or_init(&service_name, || init(service_name.as_str()))?;

        debug!(
            "Syncing {} via {} ({})",
            app_id,
            service.identity().provider_name(),
            service.store().store_name()
        );

        let account = match service.identity().sign_in().await {
            Ok(SignIn::SignedIn(account)) => account,
            Ok(SignIn::Cancelled) => {
                info!("Sign-in cancelled, {} keeps its local status", app_id);
                return Ok(SyncOutcome::Cancelled);
            }
            Err(e) => {
                warn!("Sign-in failed for {}: {}", app_id, e);
                return Err(e);
            }
        };

        let user = UserId::from_account(&account).inspect_err(|e| {
            error!("Cannot sync {}: {}", app_id, e);
        })?;

        let record = service
            .store()
            .get(&app_id, &user)
            .await
            .inspect_err(|e| warn!("Lookup of {}/{} failed: {}", app_id, user, e))?;

        let Some(record) = record else {
            service
                .store()
                .put(&app_id, &user, &EntitlementRecord::pending())
                .await
                .inspect_err(|e| warn!("Enrollment of {}/{} failed: {}", app_id, user, e))?;

            if self.config().reflect_enrollment {
                self.set_status(EntitlementStatus::Pending)?;
            }
            info!("Enrolled {} for {}, awaiting approval", user, app_id);
            return Ok(SyncOutcome::Enrolled);
        };

        let status = record
            .decode_status()
            .and_then(|status| match status {
                EntitlementStatus::NotYetChecked => Err(LicenseError::MalformedRemoteStatus(
                    format!("{status} is local-only"),
                )),
                status => Ok(status),
            })
            .inspect_err(|e| {
                error!("Record {}/{} rejected: {}", app_id, user, e);
            })?;

        self.set_status(status)?;
        info!("Status of {} for {} is {}", app_id, user, status);

        self.deliver_remote(status.is_approved());
        Ok(SyncOutcome::Refreshed(status))
    }
}
