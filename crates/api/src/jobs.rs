//! In-process execution of async render jobs.
//!
//! Each submitted job runs on its own detached task. Jobs are attempted
//! once; the job row is the only durable record, so anything still
//! `pending` or `processing` when the process starts belongs to a previous
//! run and is failed by [`recover_interrupted_jobs`].

use std::future::Future;
use std::time::Duration;

use imprint_core::types::DbId;
use imprint_db::store::{JobStore, QuotaLedger};
use imprint_db::Store;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

/// Error recorded on jobs that were in flight when the service stopped.
pub const INTERRUPTED_JOB_ERROR: &str = "interrupted by service restart";

/// Spawns job tasks and tracks them for graceful shutdown.
#[derive(Clone, Default)]
pub struct JobQueue {
    tracker: TaskTracker,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `work` on its own task and return immediately.
    ///
    /// No ordering is guaranteed between jobs.
    pub fn submit<F>(&self, job_id: DbId, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let span = tracing::info_span!("render_job", job_id);
        self.tracker.spawn(work.instrument(span));
        tracing::debug!(job_id, in_flight = self.tracker.len(), "Job submitted");
    }

    /// Jobs currently running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Close the tracker and wait for running jobs.
    ///
    /// Returns `false` if jobs were still running when `timeout` elapsed.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let drained = tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok();
        if !drained {
            tracing::warn!(
                remaining = self.tracker.len(),
                "Render jobs still running at shutdown deadline"
            );
        }
        drained
    }
}

/// Counts from [`recover_interrupted_jobs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    pub failed_jobs: u64,
    pub cleared_reservations: u64,
}

/// Fail jobs orphaned by a previous process and drop its quota reservations.
///
/// Must run before the server accepts requests: reservations taken by this
/// process would otherwise be cleared too.
pub async fn recover_interrupted_jobs(store: &dyn Store) -> Result<RecoveryReport, sqlx::Error> {
    let failed_jobs = store.fail_orphaned_jobs(INTERRUPTED_JOB_ERROR).await?;
    let cleared_reservations = store.clear_reservations().await?;
    if failed_jobs > 0 || cleared_reservations > 0 {
        tracing::warn!(
            failed_jobs,
            cleared_reservations,
            "Recovered render jobs interrupted by a previous shutdown"
        );
    }
    Ok(RecoveryReport {
        failed_jobs,
        cleared_reservations,
    })
}
