//! `vigil-monitor` — the appointment scan-and-dispatch engine.
//!
//! # Overview
//!
//! A single periodic loop ([`engine::MonitorEngine`]) wakes on a fixed
//! interval, fetches candidate appointments from SQLite, computes which
//! notification kinds are currently due for each ([`eligibility::due_kinds`]),
//! and hands every due (appointment, kind) pair to the
//! [`dispatch::DispatchCoordinator`].
//!
//! # Exactly-once dispatch
//!
//! The coordinator claims each pair in the `dispatches` table before calling
//! the sender; the table's composite primary key makes the claim atomic, so
//! overlapping scans (or a second monitor instance on the same database)
//! cannot double-send. A claim is confirmed only after the sender reports
//! success and is released again on failure, which turns every transient
//! delivery error into a retry on a later tick — never a duplicate, never a
//! silent loss.
//!
//! | Module        | Responsibility                                        |
//! |---------------|-------------------------------------------------------|
//! | `db`          | Idempotent schema init                                |
//! | `store`       | Read-only candidate queries + scan cursor             |
//! | `eligibility` | Pure due-kind computation                             |
//! | `tracker`     | Atomic claim / confirm / release over `dispatches`    |
//! | `dispatch`    | Claim → send → confirm per pair, bounded fan-out      |
//! | `engine`      | Tick loop, state machine, per-scan error containment  |

pub mod db;
pub mod dispatch;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod store;
pub mod tracker;

pub use dispatch::{DispatchCoordinator, DispatchOutcome};
pub use engine::{MonitorEngine, ScanState, ScanSummary};
pub use error::{MonitorError, Result};
pub use store::AppointmentStore;
pub use tracker::{ClaimOutcome, DispatchTracker};
