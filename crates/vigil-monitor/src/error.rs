use thiserror::Error;

/// Errors that can occur within the monitor subsystem.
///
/// Nothing here is fatal to the hosting process: the engine logs the error,
/// abandons the current scan, and tries again on the next tick.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The appointment store could not be queried. Aborts the current scan.
    #[error("Appointment store unavailable: {0}")]
    StoreUnavailable(String),

    /// Underlying SQLite / rusqlite error from the dispatch tracker.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored row could not be decoded into an [`Appointment`]
    /// (bad timestamp or status text).
    ///
    /// [`Appointment`]: vigil_core::types::Appointment
    #[error("Invalid record {id}: {reason}")]
    InvalidRecord { id: String, reason: String },
}

pub type Result<T> = std::result::Result<T, MonitorError>;
