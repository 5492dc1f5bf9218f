//! Quota reservations scoped to the work they admit.
//!
//! A [`QuotaHold`] owns one [`Reservation`] from the ledger. It is settled
//! explicitly with [`QuotaHold::commit`] or [`QuotaHold::release`]; if it is
//! dropped unsettled (a cancelled request, a timed-out handler, an aborted
//! task) the reservation is released on a spawned task.
//!
//! Settling also runs on a spawned task, so cancelling the caller while the
//! ledger statement is in flight cannot strand the reservation either.

use std::sync::Arc;

use imprint_core::quota::Usage;
use imprint_core::types::DbId;
use imprint_db::store::{QuotaDecision, QuotaLedger, Reservation, Store};

use crate::error::{AppError, AppResult};

/// One admitted call, released unless committed.
#[must_use = "a quota hold must be committed or released"]
pub struct QuotaHold {
    store: Arc<dyn Store>,
    account_id: DbId,
    reservation: Option<Reservation>,
}

impl QuotaHold {
    /// Reserve one call for `account_id`, or fail with `rate_limited`.
    pub async fn acquire(store: &Arc<dyn Store>, account_id: DbId) -> AppResult<Self> {
        match store.check_and_reserve(account_id).await? {
            QuotaDecision::Reserved(reservation) => Ok(Self {
                store: Arc::clone(store),
                account_id,
                reservation: Some(reservation),
            }),
            QuotaDecision::Denied { usage, in_flight } => {
                tracing::info!(
                    account_id,
                    used = usage.used,
                    limit = ?usage.limit,
                    in_flight,
                    "Quota exhausted"
                );
                Err(usage.to_rate_limited(in_flight).into())
            }
        }
    }

    /// Count the call. Returns usage after the increment.
    pub async fn commit(mut self) -> AppResult<Usage> {
        let Some(reservation) = self.reservation.take() else {
            return Err(settled_twice());
        };
        let store = Arc::clone(&self.store);
        tokio::spawn(async move { store.commit(reservation).await })
            .await
            .map_err(|e| AppError::InternalError(format!("quota commit task failed: {e}")))?
            .map_err(AppError::from)
    }

    /// Give the call back uncounted. Failures are logged.
    pub async fn release(mut self) {
        let Some(reservation) = self.reservation.take() else {
            return;
        };
        let store = Arc::clone(&self.store);
        let account_id = self.account_id;
        let settled = tokio::spawn(release_reservation(store, reservation)).await;
        if let Err(e) = settled {
            tracing::error!(account_id, error = %e, "Quota release task failed");
        }
    }
}

impl Drop for QuotaHold {
    fn drop(&mut self) {
        let Some(reservation) = self.reservation.take() else {
            return;
        };
        let account_id = self.account_id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(account_id, "Releasing quota held by abandoned render");
                handle.spawn(release_reservation(Arc::clone(&self.store), reservation));
            }
            // Startup recovery clears whatever is left.
            Err(_) => tracing::error!(account_id, "No runtime to release abandoned quota"),
        }
    }
}

async fn release_reservation(store: Arc<dyn Store>, reservation: Reservation) {
    let account_id = reservation.account_id;
    if let Err(e) = store.release(reservation).await {
        tracing::error!(account_id, error = %e, "Failed to release quota reservation");
    }
}

fn settled_twice() -> AppError {
    AppError::InternalError("quota hold already settled".into())
}
