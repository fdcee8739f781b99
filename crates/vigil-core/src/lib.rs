//! `vigil-core` — shared types, configuration and errors for the vigil
//! appointment monitor.
//!
//! Everything in here is consumed by both the monitor engine
//! (`vigil-monitor`) and the delivery adapters (`vigil-notify`); it carries
//! no I/O of its own.

pub mod config;
pub mod error;
pub mod types;

pub use config::VigilConfig;
pub use error::{Result, VigilError};
pub use types::{Appointment, AppointmentStatus, DispatchKey, NotificationKind};
