//! Dispatch coordinator — drives each due (appointment, kind) pair through
//! claim → send → confirm, or the failure paths.
//!
//! Per-pair flow:
//!
//! 1. `try_claim` on the tracker. Losing the claim means some run already
//!    handled (or is handling) the pair — skipped silently.
//! 2. On a won claim, the sender is invoked. Its invocation is the only
//!    observable effect outside this process's own state.
//! 3. Success confirms the claim; failure releases it so a later scan
//!    retries. A permanently rejected pair is instead closed with a
//!    `suppressed` marker when that policy is enabled.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use vigil_core::types::{Appointment, DispatchKey, NotificationKind};
use vigil_notify::{Notification, NotificationSender};

use crate::error::Result;
use crate::tracker::{ClaimOutcome, DispatchTracker};

/// What happened to one (appointment, kind) pair during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Claim won, sender confirmed, claim confirmed.
    Sent,
    /// Claim lost — already dispatched (or in flight elsewhere).
    AlreadyHandled,
    /// Sender failed; the claim was released for retry on a later scan.
    Failed,
    /// Sender rejected permanently and policy closed the key for good.
    Suppressed,
}

#[derive(Clone)]
pub struct DispatchCoordinator {
    tracker: DispatchTracker,
    sender: Arc<dyn NotificationSender>,
    /// When true, permanent sender rejections write a terminal marker
    /// instead of being retried every tick.
    suppress_permanent: bool,
}

impl DispatchCoordinator {
    pub fn new(
        tracker: DispatchTracker,
        sender: Arc<dyn NotificationSender>,
        suppress_permanent: bool,
    ) -> Self {
        Self {
            tracker,
            sender,
            suppress_permanent,
        }
    }

    /// Dispatch every due kind for one appointment. Kinds are independent,
    /// so one kind failing never blocks the others; each pair's outcome is
    /// reported separately.
    pub async fn process(
        &self,
        appointment: &Appointment,
        due: &[NotificationKind],
    ) -> Result<Vec<DispatchOutcome>> {
        let mut outcomes = Vec::with_capacity(due.len());
        for &kind in due {
            outcomes.push(self.dispatch_one(appointment, kind).await?);
        }
        Ok(outcomes)
    }

    async fn dispatch_one(
        &self,
        appointment: &Appointment,
        kind: NotificationKind,
    ) -> Result<DispatchOutcome> {
        let key = DispatchKey::new(appointment.id.clone(), kind);
        let now = Utc::now();

        match self.tracker.try_claim(&key, now)? {
            ClaimOutcome::AlreadyExists => {
                debug!(key = %key, "already handled; skipping");
                return Ok(DispatchOutcome::AlreadyHandled);
            }
            ClaimOutcome::Claimed => {}
        }

        let notification = Notification::build(appointment, kind);
        match self.sender.send(&notification).await {
            Ok(()) => {
                // A confirm failure leaves the claim provisional; the TTL
                // reaper will reopen it, trading a possible duplicate for
                // never losing the dispatch record silently.
                self.tracker.confirm(&key, now)?;
                info!(
                    key = %key,
                    recipient = %notification.recipient,
                    sender = self.sender.name(),
                    "notification dispatched"
                );
                Ok(DispatchOutcome::Sent)
            }
            Err(e) if e.is_permanent() && self.suppress_permanent => {
                error!(key = %key, error = %e, "permanent delivery rejection; suppressing key");
                self.tracker.suppress(&key, now)?;
                Ok(DispatchOutcome::Suppressed)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "delivery failed; releasing claim for retry");
                self.tracker.release(&key)?;
                Ok(DispatchOutcome::Failed)
            }
        }
    }
}
