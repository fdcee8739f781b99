//! `vigil-notify` — delivery adapters for appointment notifications.
//!
//! The monitor engine only knows the [`NotificationSender`] trait; concrete
//! adapters live here. Two are provided:
//!
//! | Adapter         | Transport                                  |
//! |-----------------|--------------------------------------------|
//! | [`WebhookSender`] | JSON POST to a configured HTTP endpoint  |
//! | [`LogSender`]     | `tracing` output only (local/dev runs)   |
//!
//! Adapter errors distinguish transient transport failures (retried on the
//! next scan) from permanent rejections (retried or suppressed per the
//! monitor's configured policy).

pub mod error;
pub mod log;
pub mod sender;
pub mod types;
pub mod webhook;

pub use error::NotifyError;
pub use log::LogSender;
pub use sender::NotificationSender;
pub use types::Notification;
pub use webhook::WebhookSender;
