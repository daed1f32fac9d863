pub mod appointment;
pub mod authorization;
pub mod collaborators;
pub mod config;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod guard;
pub mod lifecycle;
mod sled_store;
pub mod store;
pub mod telemetry;

pub use appointment::{
    Appointment, AppointmentFilter, AppointmentId, AppointmentReceipt, AppointmentRequest,
    AppointmentStatus, PaymentType, Role, Slot, Specialty, UserId,
};
pub use engine::SchedulingEngine;
pub use error::{ConflictKind, ErrorKind, SchedulingError};
