//! Pure eligibility rules — which notification kinds are due for one
//! appointment at one instant.
//!
//! This module never consults dispatch history: "due" means the time/status
//! rule holds *right now*. The dispatch tracker downstream is what turns
//! "due on every scan" into "sent at most once". Keeping the two concerns
//! apart is what lets these rules be tested against fixed clocks with no
//! database at all.

use chrono::{DateTime, Duration, Utc};

use vigil_core::types::{Appointment, AppointmentStatus, NotificationKind};

/// Compute the set of kinds currently due for `appointment` at `now`.
///
/// Rules:
/// - `UpcomingReminder`: still `scheduled`, and `scheduled_at` is in the
///   future by no more than `lead_window`.
/// - `OverdueAlert`: still `scheduled`, and `scheduled_at` has passed.
/// - `StatusChanged`: the status is terminal (`completed` or `cancelled`).
///
/// Kinds are independent; the returned set is empty for most appointments on
/// most scans.
pub fn due_kinds(
    appointment: &Appointment,
    now: DateTime<Utc>,
    lead_window: Duration,
) -> Vec<NotificationKind> {
    let mut due = Vec::new();

    match appointment.status {
        AppointmentStatus::Scheduled => {
            let until = appointment.scheduled_at - now;
            if until > Duration::zero() && until <= lead_window {
                due.push(NotificationKind::UpcomingReminder);
            }
            if now > appointment.scheduled_at {
                due.push(NotificationKind::OverdueAlert);
            }
        }
        AppointmentStatus::Completed | AppointmentStatus::Cancelled => {
            due.push(NotificationKind::StatusChanged);
        }
    }

    due
}
