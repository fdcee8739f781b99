//! End-to-end scan scenarios: eligibility, claim accounting and retry
//! behavior against a real SQLite file and a scripted sender.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rusqlite::Connection;

use vigil_core::config::MonitorConfig;
use vigil_core::types::NotificationKind;
use vigil_monitor::{MonitorEngine, MonitorError};
use vigil_notify::{Notification, NotificationSender, NotifyError};

/// Scripted sender: counts every attempt, records successful deliveries, and
/// fails the first `fail_first` calls (transiently or permanently).
struct ScriptedSender {
    attempts: AtomicUsize,
    delivered: Mutex<Vec<(String, NotificationKind)>>,
    fail_first: AtomicUsize,
    permanent: bool,
}

impl ScriptedSender {
    fn reliable() -> Arc<Self> {
        Arc::new(Self {
            attempts: AtomicUsize::new(0),
            delivered: Mutex::new(Vec::new()),
            fail_first: AtomicUsize::new(0),
            permanent: false,
        })
    }

    fn failing(times: usize, permanent: bool) -> Arc<Self> {
        Arc::new(Self {
            attempts: AtomicUsize::new(0),
            delivered: Mutex::new(Vec::new()),
            fail_first: AtomicUsize::new(times),
            permanent,
        })
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn delivered(&self) -> Vec<(String, NotificationKind)> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSender for ScriptedSender {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            return Err(if self.permanent {
                NotifyError::Rejected("recipient unknown".into())
            } else {
                NotifyError::Transport("connection refused".into())
            });
        }
        self.delivered
            .lock()
            .unwrap()
            .push((notification.appointment_id.clone(), notification.kind));
        Ok(())
    }
}

/// Engine plus a second connection to the same database file, so tests can
/// play the out-of-scope CRUD layer and insert appointment rows directly.
struct Harness {
    engine: MonitorEngine,
    crud: Connection,
    path: std::path::PathBuf,
}

impl Harness {
    fn new(sender: Arc<dyn NotificationSender>, suppress_permanent: bool) -> Self {
        let path = std::env::temp_dir().join(format!("vigil-test-{}.db", uuid::Uuid::new_v4()));
        let config = MonitorConfig {
            interval_secs: 60,
            lead_window_secs: 900,
            grace_secs: 3600,
            concurrency: 2,
            claim_ttl_secs: 600,
            suppress_permanent,
        };
        let engine =
            MonitorEngine::new(Connection::open(&path).unwrap(), sender, config).unwrap();
        let crud = Connection::open(&path).unwrap();
        Self { engine, crud, path }
    }

    fn insert_appointment(
        &self,
        id: &str,
        scheduled_at: DateTime<Utc>,
        status: &str,
        updated_at: DateTime<Utc>,
    ) {
        self.crud
            .execute(
                "INSERT INTO appointments (id, party_id, scheduled_at, status, created_at, updated_at)
                 VALUES (?1, 'party-1', ?2, ?3, ?4, ?4)",
                rusqlite::params![
                    id,
                    scheduled_at.to_rfc3339(),
                    status,
                    updated_at.to_rfc3339()
                ],
            )
            .unwrap();
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        std::fs::remove_file(&self.path).ok();
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn reminder_dispatched_exactly_once_across_scans() {
    let sender = ScriptedSender::reliable();
    let mut h = Harness::new(sender.clone(), false);
    // 10 minutes out, inside the 15-minute lead window
    h.insert_appointment("appt-a", t0() + Duration::minutes(10), "scheduled", t0());

    let first = h.engine.scan(t0()).await.unwrap();
    assert_eq!(first.sent, 1);
    assert_eq!(
        sender.delivered(),
        vec![("appt-a".to_string(), NotificationKind::UpcomingReminder)]
    );

    // one tick later: key already confirmed, no second send
    let second = h.engine.scan(t0() + Duration::seconds(60)).await.unwrap();
    assert_eq!(second.sent, 0);
    assert_eq!(second.already_handled, 1);
    assert_eq!(sender.attempts(), 1);
}

#[tokio::test]
async fn back_to_back_scans_are_idempotent() {
    let sender = ScriptedSender::reliable();
    let mut h = Harness::new(sender.clone(), false);
    h.insert_appointment("appt-a", t0() + Duration::minutes(5), "scheduled", t0());

    let first = h.engine.scan(t0()).await.unwrap();
    let second = h.engine.scan(t0()).await.unwrap();
    assert_eq!(first.sent, 1);
    assert_eq!(second.sent, 0);
    assert_eq!(sender.attempts(), 1);
}

#[tokio::test]
async fn overdue_alert_fires_once_after_deadline() {
    let sender = ScriptedSender::reliable();
    let mut h = Harness::new(sender.clone(), false);
    // deadline passed five minutes ago, status never updated
    h.insert_appointment("appt-b", t0() - Duration::minutes(5), "scheduled", t0());

    let first = h.engine.scan(t0()).await.unwrap();
    assert_eq!(first.sent, 1);
    assert_eq!(
        sender.delivered(),
        vec![("appt-b".to_string(), NotificationKind::OverdueAlert)]
    );

    let second = h.engine.scan(t0() + Duration::seconds(60)).await.unwrap();
    assert_eq!(second.sent, 0);
    assert_eq!(sender.attempts(), 1);
}

#[tokio::test]
async fn status_change_dispatched_once_then_dropped_from_candidates() {
    let sender = ScriptedSender::reliable();
    let mut h = Harness::new(sender.clone(), false);
    // cancelled last week, well outside any scheduling window
    h.insert_appointment(
        "appt-c",
        t0() - Duration::days(7),
        "cancelled",
        t0() - Duration::minutes(1),
    );

    let first = h.engine.scan(t0()).await.unwrap();
    assert_eq!(first.sent, 1);
    assert_eq!(
        sender.delivered(),
        vec![("appt-c".to_string(), NotificationKind::StatusChanged)]
    );

    // cursor advanced past updated_at: the row is not even fetched again
    let second = h.engine.scan(t0() + Duration::seconds(60)).await.unwrap();
    assert_eq!(second.scanned, 0);
    assert_eq!(sender.attempts(), 1);
}

#[tokio::test]
async fn transient_failure_released_and_retried_to_success() {
    let sender = ScriptedSender::failing(1, false);
    let mut h = Harness::new(sender.clone(), false);
    h.insert_appointment("appt-d", t0() + Duration::minutes(10), "scheduled", t0());

    let first = h.engine.scan(t0()).await.unwrap();
    assert_eq!(first.failed, 1);
    assert_eq!(first.sent, 0);
    assert!(sender.delivered().is_empty());

    // claim was released: very next scan retries and confirms exactly once
    let second = h.engine.scan(t0() + Duration::seconds(60)).await.unwrap();
    assert_eq!(second.sent, 1);
    assert_eq!(sender.attempts(), 2);
    assert_eq!(sender.delivered().len(), 1);

    let third = h.engine.scan(t0() + Duration::seconds(120)).await.unwrap();
    assert_eq!(third.sent, 0);
    assert_eq!(sender.attempts(), 2);
}

#[tokio::test]
async fn failed_status_change_keeps_cursor_and_is_retried() {
    let sender = ScriptedSender::failing(1, false);
    let mut h = Harness::new(sender.clone(), false);
    h.insert_appointment(
        "appt-e",
        t0() - Duration::days(7),
        "completed",
        t0() - Duration::minutes(1),
    );

    let first = h.engine.scan(t0()).await.unwrap();
    assert_eq!(first.failed, 1);

    // the cursor must not have advanced past the failed row
    let second = h.engine.scan(t0() + Duration::seconds(60)).await.unwrap();
    assert_eq!(second.sent, 1);
    assert_eq!(sender.delivered().len(), 1);
}

#[tokio::test]
async fn permanent_rejection_suppressed_when_policy_enabled() {
    let sender = ScriptedSender::failing(usize::MAX, true);
    let mut h = Harness::new(sender.clone(), true);
    h.insert_appointment("appt-f", t0() + Duration::minutes(10), "scheduled", t0());

    let first = h.engine.scan(t0()).await.unwrap();
    assert_eq!(first.suppressed, 1);
    assert_eq!(sender.attempts(), 1);

    // terminal marker persists: no further attempts, ever
    let second = h.engine.scan(t0() + Duration::seconds(60)).await.unwrap();
    assert_eq!(second.already_handled, 1);
    assert_eq!(sender.attempts(), 1);
}

#[tokio::test]
async fn permanent_rejection_retried_under_default_policy() {
    let sender = ScriptedSender::failing(usize::MAX, true);
    let mut h = Harness::new(sender.clone(), false);
    h.insert_appointment("appt-g", t0() + Duration::minutes(10), "scheduled", t0());

    let first = h.engine.scan(t0()).await.unwrap();
    let second = h.engine.scan(t0() + Duration::seconds(60)).await.unwrap();
    assert_eq!(first.failed, 1);
    assert_eq!(second.failed, 1);
    assert_eq!(sender.attempts(), 2);
    assert!(sender.delivered().is_empty());
}

#[tokio::test]
async fn kinds_are_independent_for_one_appointment() {
    let sender = ScriptedSender::reliable();
    let mut h = Harness::new(sender.clone(), false);
    // overdue first ...
    h.insert_appointment("appt-h", t0() + Duration::minutes(10), "scheduled", t0());
    h.engine.scan(t0()).await.unwrap();

    // ... then the CRUD layer cancels it
    h.crud
        .execute(
            "UPDATE appointments SET status = 'cancelled', updated_at = ?1 WHERE id = 'appt-h'",
            [(t0() + Duration::seconds(30)).to_rfc3339()],
        )
        .unwrap();
    let second = h.engine.scan(t0() + Duration::seconds(60)).await.unwrap();
    assert_eq!(second.sent, 1);

    let kinds: Vec<NotificationKind> = sender.delivered().into_iter().map(|(_, k)| k).collect();
    assert_eq!(
        kinds,
        vec![
            NotificationKind::UpcomingReminder,
            NotificationKind::StatusChanged
        ]
    );
}

#[tokio::test]
async fn store_loss_aborts_the_scan_with_store_unavailable() {
    let sender = ScriptedSender::reliable();
    let mut h = Harness::new(sender.clone(), false);
    h.crud.execute("DROP TABLE appointments", []).unwrap();

    let err = h.engine.scan(t0()).await.unwrap_err();
    assert!(matches!(err, MonitorError::StoreUnavailable(_)));
    assert_eq!(sender.attempts(), 0);
}
