//! Error taxonomy shared by every scheduling operation
use crate::appointment::{AppointmentId, AppointmentStatus, UserId};
use crate::collaborators::CollaboratorError;

/// Machine-checkable kind of a [`SchedulingError`]. Transports map these onto
/// their own status conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    AuthorizationDenied,
    UnknownIdentity,
    CollaboratorUnavailable,
    Conflict,
    NotFound,
    InvalidTransition,
    Storage,
}

/// Which party of a booking already holds the slot.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    #[error("doctor is unavailable at this slot")]
    DoctorBusy,
    #[error("patient already has an appointment at this slot")]
    PatientBusy,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    #[error("patients may only book for themselves")]
    PatientBookingForOther,
    #[error("only patients and receptionists may create appointments")]
    RoleMayNotBook,
    #[error("user {0} is not a patient")]
    TargetNotPatient(UserId),
    #[error("user {0} is not a doctor")]
    TargetNotDoctor(UserId),
}

#[derive(thiserror::Error, Debug)]
pub enum SchedulingError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("authorization denied: {0}")]
    AuthorizationDenied(DenyReason),
    #[error("identity {0} could not be resolved")]
    UnknownIdentity(UserId),
    #[error("{collaborator} unavailable: {source}")]
    CollaboratorUnavailable {
        collaborator: &'static str,
        #[source]
        source: CollaboratorError,
    },
    #[error("{0}")]
    Conflict(ConflictKind),
    #[error("appointment {0} not found")]
    NotFound(AppointmentId),
    #[error("appointment cannot move from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },
    #[error("storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("stored record could not be read: {0}")]
    Codec(String),
    #[error("appointment store lock poisoned")]
    Poisoned,
}

impl SchedulingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchedulingError::Validation(_) => ErrorKind::Validation,
            SchedulingError::AuthorizationDenied(_) => ErrorKind::AuthorizationDenied,
            SchedulingError::UnknownIdentity(_) => ErrorKind::UnknownIdentity,
            SchedulingError::CollaboratorUnavailable { .. } => ErrorKind::CollaboratorUnavailable,
            SchedulingError::Conflict(_) => ErrorKind::Conflict,
            SchedulingError::NotFound(_) => ErrorKind::NotFound,
            SchedulingError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            SchedulingError::Storage(_) | SchedulingError::Codec(_) | SchedulingError::Poisoned => {
                ErrorKind::Storage
            }
        }
    }

    /// Only collaborator outages are worth retrying; everything else needs the
    /// caller to change the request.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::CollaboratorUnavailable
    }

    pub fn conflict(&self) -> Option<ConflictKind> {
        match self {
            SchedulingError::Conflict(kind) => Some(*kind),
            _ => None,
        }
    }
}

impl<E> From<minicbor::encode::Error<E>> for SchedulingError
where
    E: std::fmt::Display,
{
    fn from(value: minicbor::encode::Error<E>) -> Self {
        SchedulingError::Codec(value.to_string())
    }
}

impl From<minicbor::decode::Error> for SchedulingError {
    fn from(value: minicbor::decode::Error) -> Self {
        SchedulingError::Codec(value.to_string())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is not a valid number: {value:?}")]
    InvalidNumber { key: &'static str, value: String },
    #[error("operating window {opening}..={closing} is not within a day")]
    InvalidWindow { opening: u32, closing: u32 },
    #[error("collaborator timeout must be greater than zero")]
    ZeroTimeout,
    #[error("retry policy needs at least one attempt")]
    ZeroAttempts,
}
