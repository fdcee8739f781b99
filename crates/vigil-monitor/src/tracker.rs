//! Dispatch tracker — the persisted record of which (appointment, kind)
//! pairs have been handled, and the claim protocol around it.
//!
//! A claim is an `INSERT` into `dispatches` that relies on the composite
//! primary key: exactly one inserter wins, whatever the interleaving of
//! scans, worker tasks, or monitor instances sharing the database. The row
//! stays provisional (`confirmed_at IS NULL`) until the sender confirms
//! delivery; a failed send releases it again, so only *confirmed* rows are
//! permanent.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use vigil_core::types::DispatchKey;

use crate::error::Result;

/// Result of a claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This caller now owns the key and must send, then confirm or release.
    Claimed,
    /// Some run (this one, a concurrent one, or a prior one) already holds or
    /// completed this key. Not an error — skip silently.
    AlreadyExists,
}

#[derive(Clone)]
pub struct DispatchTracker {
    conn: Arc<Mutex<Connection>>,
}

impl DispatchTracker {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Atomically reserve `key`. The `ON CONFLICT DO NOTHING` form makes the
    /// existence check and the insert a single statement, so two concurrent
    /// callers can never both see "absent" and both insert.
    pub fn try_claim(&self, key: &DispatchKey, now: DateTime<Utc>) -> Result<ClaimOutcome> {
        let conn = self.conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT INTO dispatches (appointment_id, kind, claimed_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(appointment_id, kind) DO NOTHING",
            rusqlite::params![key.appointment_id, key.kind.to_string(), now.to_rfc3339()],
        )?;
        Ok(if inserted == 1 {
            ClaimOutcome::Claimed
        } else {
            ClaimOutcome::AlreadyExists
        })
    }

    /// Mark a claimed key as successfully delivered. From here on the key is
    /// permanently handled.
    pub fn confirm(&self, key: &DispatchKey, now: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE dispatches SET confirmed_at = ?3, outcome = 'sent'
             WHERE appointment_id = ?1 AND kind = ?2 AND confirmed_at IS NULL",
            rusqlite::params![key.appointment_id, key.kind.to_string(), now.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Undo a provisional claim after a failed send, reopening the key for a
    /// later scan. Confirmed rows are never touched.
    pub fn release(&self, key: &DispatchKey) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM dispatches
             WHERE appointment_id = ?1 AND kind = ?2 AND confirmed_at IS NULL",
            rusqlite::params![key.appointment_id, key.kind.to_string()],
        )?;
        Ok(())
    }

    /// Close a claimed key with a terminal `suppressed` marker instead of a
    /// delivery confirmation. Used for permanent sender rejections when the
    /// configured policy is to stop retrying them.
    pub fn suppress(&self, key: &DispatchKey, now: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE dispatches SET confirmed_at = ?3, outcome = 'suppressed'
             WHERE appointment_id = ?1 AND kind = ?2 AND confirmed_at IS NULL",
            rusqlite::params![key.appointment_id, key.kind.to_string(), now.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Delete unconfirmed claims older than `older_than`.
    ///
    /// A claim can dangle when the process dies between claim and send; this
    /// makes such keys retryable again after the configured TTL instead of
    /// blocking forever. Returns the number of claims released.
    pub fn release_stale(&self, older_than: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "DELETE FROM dispatches
             WHERE confirmed_at IS NULL AND claimed_at < ?1",
            [older_than.to_rfc3339()],
        )?;
        Ok(n)
    }

    /// True when `key` has a confirmed dispatch row (outcome `sent` or
    /// `suppressed`).
    pub fn is_confirmed(&self, key: &DispatchKey) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM dispatches
             WHERE appointment_id = ?1 AND kind = ?2 AND confirmed_at IS NOT NULL",
            rusqlite::params![key.appointment_id, key.kind.to_string()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use chrono::{Duration, TimeZone};
    use vigil_core::types::NotificationKind;

    fn tracker() -> DispatchTracker {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        DispatchTracker::new(Arc::new(Mutex::new(conn)))
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
    }

    fn key() -> DispatchKey {
        DispatchKey::new("appt-1", NotificationKind::UpcomingReminder)
    }

    #[test]
    fn second_claim_loses() {
        let t = tracker();
        assert_eq!(t.try_claim(&key(), now()).unwrap(), ClaimOutcome::Claimed);
        assert_eq!(
            t.try_claim(&key(), now()).unwrap(),
            ClaimOutcome::AlreadyExists
        );
    }

    #[test]
    fn kinds_claim_independently() {
        let t = tracker();
        let overdue = DispatchKey::new("appt-1", NotificationKind::OverdueAlert);
        assert_eq!(t.try_claim(&key(), now()).unwrap(), ClaimOutcome::Claimed);
        assert_eq!(t.try_claim(&overdue, now()).unwrap(), ClaimOutcome::Claimed);
    }

    #[test]
    fn released_key_can_be_claimed_again() {
        let t = tracker();
        t.try_claim(&key(), now()).unwrap();
        t.release(&key()).unwrap();
        assert_eq!(t.try_claim(&key(), now()).unwrap(), ClaimOutcome::Claimed);
    }

    #[test]
    fn confirm_makes_the_claim_permanent() {
        let t = tracker();
        t.try_claim(&key(), now()).unwrap();
        t.confirm(&key(), now()).unwrap();
        assert!(t.is_confirmed(&key()).unwrap());
        // release must not delete a confirmed row
        t.release(&key()).unwrap();
        assert!(t.is_confirmed(&key()).unwrap());
        assert_eq!(
            t.try_claim(&key(), now()).unwrap(),
            ClaimOutcome::AlreadyExists
        );
    }

    #[test]
    fn stale_unconfirmed_claims_are_reaped() {
        let t = tracker();
        let old = now() - Duration::minutes(30);
        t.try_claim(&key(), old).unwrap();

        // fresh claim on another key survives
        let fresh = DispatchKey::new("appt-2", NotificationKind::OverdueAlert);
        t.try_claim(&fresh, now()).unwrap();

        let released = t.release_stale(now() - Duration::minutes(10)).unwrap();
        assert_eq!(released, 1);
        assert_eq!(t.try_claim(&key(), now()).unwrap(), ClaimOutcome::Claimed);
        assert_eq!(
            t.try_claim(&fresh, now()).unwrap(),
            ClaimOutcome::AlreadyExists
        );
    }

    #[test]
    fn stale_reap_spares_confirmed_rows() {
        let t = tracker();
        let old = now() - Duration::minutes(30);
        t.try_claim(&key(), old).unwrap();
        t.confirm(&key(), old).unwrap();

        let released = t.release_stale(now()).unwrap();
        assert_eq!(released, 0);
        assert!(t.is_confirmed(&key()).unwrap());
    }

    #[test]
    fn suppress_is_terminal() {
        let t = tracker();
        t.try_claim(&key(), now()).unwrap();
        t.suppress(&key(), now()).unwrap();
        assert!(t.is_confirmed(&key()).unwrap());
        assert_eq!(
            t.try_claim(&key(), now()).unwrap(),
            ClaimOutcome::AlreadyExists
        );
    }
}
