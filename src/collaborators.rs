//! Contracts for the services the scheduler depends on but does not own,
//! plus the in-process implementations used for wiring and tests.
use super::appointment::{AppointmentId, AppointmentStatus, PaymentType, Role, UserId};
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use std::time::Duration;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("no answer within {0:?}")]
    Timeout(Duration),
}

impl CollaboratorError {
    /// Outages and timeouts may succeed on another attempt; an unknown id never will.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CollaboratorError::Unavailable(_) | CollaboratorError::Timeout(_)
        )
    }
}

/// Resolves the role of `target` as seen by `caller`.
pub trait RoleResolver: Send + Sync {
    fn resolve(&self, caller: UserId, target: UserId) -> Result<Role, CollaboratorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentDecision {
    Confirmed,
    Rejected,
}

impl PaymentDecision {
    pub fn status(&self) -> AppointmentStatus {
        match self {
            PaymentDecision::Confirmed => AppointmentStatus::Confirmed,
            PaymentDecision::Rejected => AppointmentStatus::Rejected,
        }
    }
}

pub trait PaymentValidator: Send + Sync {
    fn validate(
        &self,
        payment_type: PaymentType,
        details: &str,
    ) -> Result<PaymentDecision, CollaboratorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Created,
    Confirmed,
    Rejected,
    Cancelled,
}

impl EventKind {
    /// The event announcing that an appointment entered `status`.
    pub fn for_status(status: AppointmentStatus) -> Self {
        match status {
            AppointmentStatus::Pending => EventKind::Created,
            AppointmentStatus::Confirmed => EventKind::Confirmed,
            AppointmentStatus::Rejected => EventKind::Rejected,
            AppointmentStatus::Cancelled => EventKind::Cancelled,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Created => "APPOINTMENT_CREATED",
            EventKind::Confirmed => "APPOINTMENT_CONFIRMED",
            EventKind::Rejected => "APPOINTMENT_REJECTED",
            EventKind::Cancelled => "APPOINTMENT_CANCELLED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub kind: EventKind,
    pub appointment_id: AppointmentId,
    pub patient_id: UserId,
    pub status: AppointmentStatus,
}

/// Best-effort fan-out of lifecycle events. Implementations log their own
/// failures; nothing is reported back to the scheduler.
pub trait Notifier: Send + Sync {
    fn emit(&self, event: &LifecycleEvent);
}

/// Identity directory held in memory.
#[derive(Debug, Default)]
pub struct DirectoryRoleResolver {
    roles: RwLock<HashMap<UserId, Role>>,
}

impl DirectoryRoleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = (UserId, Role)>) -> Self {
        Self {
            roles: RwLock::new(users.into_iter().collect()),
        }
    }

    /// Add or replace the role of `user`.
    pub fn register(&self, user: UserId, role: Role) -> Result<(), CollaboratorError> {
        let mut roles = self
            .roles
            .write()
            .map_err(|_| CollaboratorError::Unavailable("identity directory poisoned".into()))?;
        roles.insert(user, role);
        Ok(())
    }
}

impl RoleResolver for DirectoryRoleResolver {
    fn resolve(&self, caller: UserId, target: UserId) -> Result<Role, CollaboratorError> {
        let roles = self
            .roles
            .read()
            .map_err(|_| CollaboratorError::Unavailable("identity directory poisoned".into()))?;

        if !roles.contains_key(&caller) {
            return Err(CollaboratorError::NotFound(format!("caller {caller}")));
        }
        roles
            .get(&target)
            .copied()
            .ok_or_else(|| CollaboratorError::NotFound(format!("user {target}")))
    }
}

/// Deterministic decision rule: an insurer is accepted when its name has an
/// even number of characters, a card when its last digit is even.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParityPaymentValidator;

impl PaymentValidator for ParityPaymentValidator {
    fn validate(
        &self,
        payment_type: PaymentType,
        details: &str,
    ) -> Result<PaymentDecision, CollaboratorError> {
        let accepted = match payment_type {
            PaymentType::Insurance => details.chars().count() % 2 == 0,
            PaymentType::SelfPay => details
                .chars()
                .last()
                .and_then(|c| c.to_digit(10))
                .is_some_and(|digit| digit % 2 == 0),
        };

        Ok(if accepted {
            PaymentDecision::Confirmed
        } else {
            PaymentDecision::Rejected
        })
    }
}

/// Writes every lifecycle event to the tracing pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn emit(&self, event: &LifecycleEvent) {
        tracing::info!(
            event = %event.kind,
            appointment_id = %event.appointment_id,
            patient_id = %event.patient_id,
            status = %event.status,
            "appointment lifecycle event"
        );
    }
}
