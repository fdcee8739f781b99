//! Monitor engine — the periodic loop that drives scans.
//!
//! One `tokio::time::interval` fires the scan; `MissedTickBehavior::Skip`
//! drops any tick that arrives while a scan is still running, so a slow scan
//! never builds a backlog. All durable state lives in the tracker and the
//! scan cursor; the loop itself carries nothing between ticks beyond the
//! explicit [`ScanState`].

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use vigil_core::config::MonitorConfig;
use vigil_notify::NotificationSender;

use crate::db::init_db;
use crate::dispatch::{DispatchCoordinator, DispatchOutcome};
use crate::eligibility::due_kinds;
use crate::error::Result;
use crate::store::AppointmentStore;
use crate::tracker::DispatchTracker;

/// The loop's two states. A tick arriving in `Scanning` is dropped, never
/// queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
}

/// Aggregate result of one scan, for logging and assertions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    /// Candidate appointments fetched.
    pub scanned: usize,
    /// Pairs delivered and confirmed this scan.
    pub sent: usize,
    /// Pairs skipped because a dispatch record already existed.
    pub already_handled: usize,
    /// Pairs whose delivery failed; their claims were released.
    pub failed: usize,
    /// Pairs closed with a terminal suppression marker.
    pub suppressed: usize,
    /// Dangling claims reaped at scan start.
    pub stale_released: usize,
}

impl ScanSummary {
    fn absorb(&mut self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Sent => self.sent += 1,
            DispatchOutcome::AlreadyHandled => self.already_handled += 1,
            DispatchOutcome::Failed => self.failed += 1,
            DispatchOutcome::Suppressed => self.suppressed += 1,
        }
    }
}

pub struct MonitorEngine {
    store: AppointmentStore,
    tracker: DispatchTracker,
    coordinator: DispatchCoordinator,
    config: MonitorConfig,
    state: ScanState,
}

impl MonitorEngine {
    /// Create a new engine over `conn`, initialising the schema if needed.
    pub fn new(
        conn: Connection,
        sender: Arc<dyn NotificationSender>,
        config: MonitorConfig,
    ) -> Result<Self> {
        init_db(&conn)?;
        let conn = Arc::new(Mutex::new(conn));
        let store = AppointmentStore::new(Arc::clone(&conn));
        let tracker = DispatchTracker::new(conn);
        let coordinator =
            DispatchCoordinator::new(tracker.clone(), sender, config.suppress_permanent);
        Ok(Self {
            store,
            tracker,
            coordinator,
            config,
            state: ScanState::Idle,
        })
    }

    /// Current loop state.
    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Main event loop. Scans every `interval_secs` until `shutdown`
    /// broadcasts `true`. A scan failure is logged and contained — the next
    /// tick always gets a fresh attempt.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.interval_secs,
            lead_window_secs = self.config.lead_window_secs,
            "appointment monitor started"
        );

        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(self.config.interval_secs));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.state == ScanState::Scanning {
                        // Unreachable while scans run inline, but the guard
                        // keeps the no-overlap rule explicit and local.
                        debug!("tick dropped: scan already in progress");
                        continue;
                    }
                    self.state = ScanState::Scanning;
                    match self.scan(Utc::now()).await {
                        Ok(summary) => {
                            if summary.sent + summary.failed + summary.suppressed > 0 {
                                info!(?summary, "scan complete");
                            } else {
                                debug!(?summary, "scan complete (nothing to dispatch)");
                            }
                        }
                        Err(e) => warn!(error = %e, "scan aborted; will retry next tick"),
                    }
                    self.state = ScanState::Idle;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("appointment monitor shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Run one full scan at the given instant.
    ///
    /// Public so tests (and operational tooling) can drive scans against a
    /// fixed clock without the timer.
    pub async fn scan(&mut self, now: DateTime<Utc>) -> Result<ScanSummary> {
        let mut summary = ScanSummary::default();

        // Reap claims left dangling by a crash between claim and send.
        let ttl = Duration::seconds(self.config.claim_ttl_secs as i64);
        summary.stale_released = self.tracker.release_stale(now - ttl)?;
        if summary.stale_released > 0 {
            warn!(
                count = summary.stale_released,
                "released stale unconfirmed claims"
            );
        }

        let cursor = self.store.scan_cursor()?;
        let candidates = self.store.fetch_candidates(
            now,
            Duration::seconds(self.config.lead_window_secs as i64),
            Duration::seconds(self.config.grace_secs as i64),
            cursor,
        )?;
        summary.scanned = candidates.len();

        // Fan out per appointment, bounded by the configured concurrency.
        // Ordering across appointments is deliberately unspecified; the
        // tracker's claim atomicity is the only cross-task coordination.
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let lead = Duration::seconds(self.config.lead_window_secs as i64);
        let mut tasks = JoinSet::new();

        for appointment in candidates {
            let due = due_kinds(&appointment, now, lead);
            if due.is_empty() {
                continue;
            }
            let coordinator = self.coordinator.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                // Semaphore is never closed, so acquire cannot fail.
                let _permit = semaphore.acquire().await.unwrap();
                coordinator.process(&appointment, &due).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(outcomes)) => {
                    for outcome in outcomes {
                        summary.absorb(outcome);
                    }
                }
                Ok(Err(e)) => {
                    // Tracker error for one appointment; its unsent pairs
                    // stay due and are retried next tick.
                    warn!(error = %e, "dispatch task failed");
                    summary.failed += 1;
                }
                Err(e) => {
                    error!(error = %e, "dispatch task panicked");
                    summary.failed += 1;
                }
            }
        }

        // Advance the cursor only when every attempted dispatch landed.
        // Status-change candidates are fetched relative to the cursor, so a
        // released claim must keep the old cursor alive or the row would
        // never be fetched again and the retry would be lost.
        if summary.failed == 0 {
            self.store.set_scan_cursor(now)?;
        }

        Ok(summary)
    }
}
