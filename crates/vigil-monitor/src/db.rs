use rusqlite::Connection;

use crate::error::Result;

/// Initialise the monitor schema in `conn`.
///
/// Safe to call on every startup — uses `IF NOT EXISTS` throughout.
///
/// The composite primary key on `dispatches` is load-bearing: it is the
/// uniqueness constraint that makes `try_claim` atomic, and the only
/// mutual-exclusion mechanism between overlapping scans or concurrent
/// monitor instances sharing this database.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS appointments (
            id           TEXT NOT NULL PRIMARY KEY,
            party_id     TEXT NOT NULL,
            scheduled_at TEXT NOT NULL,   -- ISO-8601
            status       TEXT NOT NULL DEFAULT 'scheduled',
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        ) STRICT;

        -- Candidate fetch: scheduled_at BETWEEN ?1 AND ?2
        CREATE INDEX IF NOT EXISTS idx_appointments_scheduled
            ON appointments (scheduled_at);
        -- Status-change pickup: status + updated_at >= cursor
        CREATE INDEX IF NOT EXISTS idx_appointments_status_updated
            ON appointments (status, updated_at);

        CREATE TABLE IF NOT EXISTS dispatches (
            appointment_id TEXT NOT NULL,
            kind           TEXT NOT NULL,
            claimed_at     TEXT NOT NULL,  -- ISO-8601
            confirmed_at   TEXT,           -- NULL while the claim is provisional
            outcome        TEXT,           -- 'sent' | 'suppressed' once confirmed
            PRIMARY KEY (appointment_id, kind)
        ) STRICT;

        -- Stale-claim reconciliation: confirmed_at IS NULL AND claimed_at < ?
        CREATE INDEX IF NOT EXISTS idx_dispatches_claimed
            ON dispatches (claimed_at) WHERE confirmed_at IS NULL;

        CREATE TABLE IF NOT EXISTS scan_state (
            id           INTEGER NOT NULL PRIMARY KEY CHECK (id = 1),
            last_scan_at TEXT NOT NULL    -- ISO-8601
        ) STRICT;
        ",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        init_db(&conn).unwrap();
    }

    #[test]
    fn dispatch_key_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        conn.execute(
            "INSERT INTO dispatches (appointment_id, kind, claimed_at) VALUES ('a', 'overdue_alert', '2026-01-01T00:00:00+00:00')",
            [],
        )
        .unwrap();
        let err = conn.execute(
            "INSERT INTO dispatches (appointment_id, kind, claimed_at) VALUES ('a', 'overdue_alert', '2026-01-01T00:00:01+00:00')",
            [],
        );
        assert!(err.is_err());
    }
}
