//! Unverified-account reaper.
//!
//! Recurring background job that deletes identities whose verification
//! window lapsed and who hold no outstanding verification code. Runs
//! independently of request traffic and never propagates failures: every
//! cycle is best-effort, logs-and-continues.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info};

use kardex_core::{Clock, UserId};

use crate::kv::KvError;
use crate::store::{IdentityStore, StoreError};
use crate::verification::VerificationRegistry;

/// How often a reap cycle runs.
pub const REAP_INTERVAL: Duration = Duration::from_secs(60);

/// Verification window: unverified accounts older than this, with no live
/// code, are reclaimed.
fn max_unverified_age() -> chrono::Duration {
    chrono::Duration::hours(1)
}

#[derive(Debug, Error)]
pub enum ReaperError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Kv(#[from] KvError),
}

/// Per-cycle counters, logged at each stage.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReapStats {
    /// Unverified identities examined.
    pub unverified: usize,
    /// Retained because a live verification code references them.
    pub protected: usize,
    /// Deleted this cycle.
    pub deleted: u64,
}

pub struct Reaper {
    store: Arc<dyn IdentityStore>,
    verifications: VerificationRegistry,
    clock: Arc<dyn Clock>,
}

impl Reaper {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        verifications: VerificationRegistry,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            verifications,
            clock,
        }
    }

    /// One reap cycle.
    ///
    /// The registry-membership check is the deletion guard: an identity row
    /// can be older than the window while its latest code is still live, and
    /// it must survive. Candidates are removed in a single all-or-nothing
    /// batch (profiles first, then identities).
    pub async fn run_once(&self) -> Result<ReapStats, ReaperError> {
        let now = self.clock.now();

        let unverified = self.store.list_unverified().await?;
        info!(count = unverified.len(), "unverified accounts examined");

        if unverified.is_empty() {
            return Ok(ReapStats::default());
        }

        let with_live_codes = self.verifications.live_user_ids().await?;

        let mut protected = 0;
        let mut candidates: Vec<UserId> = Vec::new();
        for identity in &unverified {
            if with_live_codes.contains(&identity.id) {
                debug!(user_id = %identity.id, "live verification code, retained");
                protected += 1;
                continue;
            }
            if identity.age(now) > max_unverified_age() {
                candidates.push(identity.id);
            }
        }

        let stats = if candidates.is_empty() {
            info!(protected, "no reap candidates");
            ReapStats {
                unverified: unverified.len(),
                protected,
                deleted: 0,
            }
        } else {
            info!(count = candidates.len(), "deleting stale unverified accounts");
            let deleted = self.store.delete_batch(&candidates).await?;
            info!(deleted, protected, "reap cycle complete");
            ReapStats {
                unverified: unverified.len(),
                protected,
                deleted,
            }
        };

        Ok(stats)
    }

    /// Run cycles on a fixed interval until the task is aborted.
    ///
    /// Cycle failures are logged and swallowed; this task must never take
    /// the scheduler down.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "reaper started");

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // An interval's first tick fires immediately; skip it so the
            // first cycle lands one full interval after boot.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if let Err(e) = self.run_once().await {
                    error!(error = %e, "reap cycle failed");
                }
            }
        })
    }
}
