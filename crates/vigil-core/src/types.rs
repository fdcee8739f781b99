use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an appointment record.
///
/// Mutated only by the CRUD layer that owns the `appointments` table; the
/// monitor reads it and never writes it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    /// Booked and still expected to happen.
    Scheduled,
    /// Took place (terminal).
    Completed,
    /// Called off (terminal).
    Cancelled,
}

impl AppointmentStatus {
    /// True for the two terminal states that trigger a `StatusChanged` notice.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled
        )
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            other => Err(format!("unknown appointment status: {other}")),
        }
    }
}

/// Why a notification fires. Kinds are independent of each other — a single
/// appointment can legitimately accumulate one dispatch of every kind over
/// its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Fires once inside the configured lead window before `scheduled_at`.
    UpcomingReminder,
    /// Fires once after `scheduled_at` passes while the status is still
    /// `scheduled`.
    OverdueAlert,
    /// Fires once when the status becomes `cancelled` or `completed`.
    StatusChanged,
}

impl NotificationKind {
    /// All kinds, in no significant order.
    pub const ALL: [NotificationKind; 3] = [
        NotificationKind::UpcomingReminder,
        NotificationKind::OverdueAlert,
        NotificationKind::StatusChanged,
    ];
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationKind::UpcomingReminder => "upcoming_reminder",
            NotificationKind::OverdueAlert => "overdue_alert",
            NotificationKind::StatusChanged => "status_changed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "upcoming_reminder" => Ok(NotificationKind::UpcomingReminder),
            "overdue_alert" => Ok(NotificationKind::OverdueAlert),
            "status_changed" => Ok(NotificationKind::StatusChanged),
            other => Err(format!("unknown notification kind: {other}")),
        }
    }
}

/// A read-only appointment snapshot as fetched by the monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    /// UUID v4 string — primary key in the `appointments` table.
    pub id: String,
    /// Reference to the owning party; doubles as the notification recipient.
    pub party_id: String,
    /// When the appointment is due to take place.
    pub scheduled_at: DateTime<Utc>,
    /// Current lifecycle state.
    pub status: AppointmentStatus,
    /// ISO-8601 timestamp of record creation.
    pub created_at: DateTime<Utc>,
    /// ISO-8601 timestamp of the last CRUD mutation (including status flips).
    pub updated_at: DateTime<Utc>,
}

/// Composite key identifying one dispatch slot: at most one *confirmed*
/// dispatch ever exists per key. This is the unit of idempotency for the
/// whole monitor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DispatchKey {
    pub appointment_id: String,
    pub kind: NotificationKind,
}

impl DispatchKey {
    pub fn new(appointment_id: impl Into<String>, kind: NotificationKind) -> Self {
        Self {
            appointment_id: appointment_id.into(),
            kind,
        }
    }
}

impl std::fmt::Display for DispatchKey {
    /// Renders as `<appointment_id>/<kind>` — the form used in log fields.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.appointment_id, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for s in [
            AppointmentStatus::Scheduled,
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
        ] {
            let text = s.to_string();
            assert_eq!(text.parse::<AppointmentStatus>().unwrap(), s);
        }
    }

    #[test]
    fn kind_round_trips_through_text() {
        for k in NotificationKind::ALL {
            let text = k.to_string();
            assert_eq!(text.parse::<NotificationKind>().unwrap(), k);
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(!AppointmentStatus::Scheduled.is_terminal());
        assert!(AppointmentStatus::Completed.is_terminal());
        assert!(AppointmentStatus::Cancelled.is_terminal());
    }
}
