//! Read-only query surface over the `appointments` table, plus the scan
//! cursor. The CRUD layer that creates and edits appointments lives outside
//! this process; the monitor never writes an appointment row.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use tracing::warn;

use vigil_core::types::{Appointment, AppointmentStatus};

use crate::error::{MonitorError, Result};

/// Shared handle over the monitor's SQLite connection.
///
/// Uses `Arc<Mutex<Connection>>` so the engine and the per-scan worker tasks
/// can hold the same connection without `Connection` needing to be `Sync`.
#[derive(Clone)]
pub struct AppointmentStore {
    conn: Arc<Mutex<Connection>>,
}

impl AppointmentStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Fetch every appointment that could possibly be due for a notification
    /// at `as_of`.
    ///
    /// Two populations are returned:
    ///
    /// 1. appointments with `scheduled_at` inside `[as_of - grace,
    ///    as_of + lead_window]` — covers reminders and overdue alerts;
    /// 2. appointments in a terminal status whose `updated_at` is at or after
    ///    `cursor` — covers status-change pickups. With no cursor (fresh
    ///    start, or the cursor row was lost) ALL terminal appointments are
    ///    returned; the dispatch tracker dedupes, so the wide fetch is only
    ///    extra work, never extra notifications.
    ///
    /// The window bounds are a fetch optimisation, not an eligibility rule —
    /// every returned row is re-checked by the evaluator.
    pub fn fetch_candidates(
        &self,
        as_of: DateTime<Utc>,
        lead_window: Duration,
        grace: Duration,
        cursor: Option<DateTime<Utc>>,
    ) -> Result<Vec<Appointment>> {
        let lower = (as_of - grace).to_rfc3339();
        let upper = (as_of + lead_window).to_rfc3339();
        let cursor_str = cursor.map(|c| c.to_rfc3339());

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, party_id, scheduled_at, status, created_at, updated_at
                 FROM appointments
                 WHERE (scheduled_at >= ?1 AND scheduled_at <= ?2)
                    OR (status IN ('completed', 'cancelled')
                        AND (?3 IS NULL OR updated_at >= ?3))
                 ORDER BY scheduled_at",
            )
            .map_err(store_unavailable)?;

        let rows: Vec<(String, String, String, String, String, String)> = stmt
            .query_map(rusqlite::params![lower, upper, cursor_str], |row| {
                Ok((
                    row.get::<_, String>(0)?, // id
                    row.get::<_, String>(1)?, // party_id
                    row.get::<_, String>(2)?, // scheduled_at
                    row.get::<_, String>(3)?, // status
                    row.get::<_, String>(4)?, // created_at
                    row.get::<_, String>(5)?, // updated_at
                ))
            })
            .map_err(store_unavailable)?
            .collect::<std::result::Result<_, _>>()
            .map_err(store_unavailable)?;

        // Decode eagerly; a malformed row is logged and skipped rather than
        // failing the whole scan.
        let appointments = rows
            .into_iter()
            .filter_map(|(id, party_id, scheduled_at, status, created_at, updated_at)| {
                match decode_row(&id, &party_id, &scheduled_at, &status, &created_at, &updated_at) {
                    Ok(a) => Some(a),
                    Err(e) => {
                        warn!(appointment_id = %id, error = %e, "skipping undecodable appointment row");
                        None
                    }
                }
            })
            .collect();

        Ok(appointments)
    }

    /// Timestamp of the last fully successful scan, if any.
    pub fn scan_cursor(&self) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn.lock().unwrap();
        let raw: Option<String> = conn
            .query_row("SELECT last_scan_at FROM scan_state WHERE id = 1", [], |row| {
                row.get(0)
            })
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(store_unavailable(other)),
            })?;

        match raw {
            Some(s) => match DateTime::parse_from_rfc3339(&s) {
                Ok(dt) => Ok(Some(dt.with_timezone(&Utc))),
                Err(e) => {
                    // A corrupt cursor only widens the next fetch.
                    warn!(error = %e, "unreadable scan cursor; treating as absent");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Advance the scan cursor. Called only after a scan completed without a
    /// store error, so a failed scan re-covers its window next tick.
    pub fn set_scan_cursor(&self, at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO scan_state (id, last_scan_at) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET last_scan_at = excluded.last_scan_at",
            [at.to_rfc3339()],
        )
        .map_err(store_unavailable)?;
        Ok(())
    }
}

fn decode_row(
    id: &str,
    party_id: &str,
    scheduled_at: &str,
    status: &str,
    created_at: &str,
    updated_at: &str,
) -> Result<Appointment> {
    let parse = |field: &str, raw: &str| -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| MonitorError::InvalidRecord {
                id: id.to_string(),
                reason: format!("bad {field} timestamp: {e}"),
            })
    };

    Ok(Appointment {
        id: id.to_string(),
        party_id: party_id.to_string(),
        scheduled_at: parse("scheduled_at", scheduled_at)?,
        status: status
            .parse::<AppointmentStatus>()
            .map_err(|reason| MonitorError::InvalidRecord {
                id: id.to_string(),
                reason,
            })?,
        created_at: parse("created_at", created_at)?,
        updated_at: parse("updated_at", updated_at)?,
    })
}

fn store_unavailable(e: rusqlite::Error) -> MonitorError {
    MonitorError::StoreUnavailable(e.to_string())
}
