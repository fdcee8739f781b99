//! Notification payload — built by the dispatch coordinator, consumed by
//! every sender adapter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vigil_core::types::{Appointment, NotificationKind};

/// One renderable, deliverable notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Appointment the notice is about.
    pub appointment_id: String,
    /// Recipient reference (the appointment's owning party).
    pub recipient: String,
    /// Why this notice fires.
    pub kind: NotificationKind,
    /// The appointment's scheduled time, echoed for the renderer downstream.
    pub scheduled_at: DateTime<Utc>,
    /// Short human-readable subject line.
    pub subject: String,
    /// Human-readable body.
    pub body: String,
}

impl Notification {
    /// Build the payload for one (appointment, kind) pair.
    ///
    /// Rendering here is deliberately plain text; channel-specific formatting
    /// (HTML mail, push payloads) is the receiving endpoint's concern.
    pub fn build(appointment: &Appointment, kind: NotificationKind) -> Self {
        let when = appointment.scheduled_at.to_rfc3339();
        let (subject, body) = match kind {
            NotificationKind::UpcomingReminder => (
                "Upcoming appointment".to_string(),
                format!("Reminder: your appointment is scheduled for {when}."),
            ),
            NotificationKind::OverdueAlert => (
                "Missed appointment".to_string(),
                format!("Your appointment scheduled for {when} has passed without an update."),
            ),
            NotificationKind::StatusChanged => (
                format!("Appointment {}", appointment.status),
                format!(
                    "Your appointment scheduled for {when} is now {}.",
                    appointment.status
                ),
            ),
        };

        Self {
            appointment_id: appointment.id.clone(),
            recipient: appointment.party_id.clone(),
            kind,
            scheduled_at: appointment.scheduled_at,
            subject,
            body,
        }
    }
}
