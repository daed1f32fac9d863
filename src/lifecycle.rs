//! Appointment status state machine.
//!
//! ```text
//! PENDING ──> CONFIRMED ──┐
//!    │    └─> REJECTED ───┼──> CANCELLED
//!    └────────────────────┘
//! ```
//!
//! Repeating the current status is accepted as a no-op for every state except
//! PENDING. Nothing returns to PENDING and nothing leaves CANCELLED.
use super::appointment::{Appointment, AppointmentId, AppointmentStatus};
use super::collaborators::{EventKind, LifecycleEvent, Notifier, PaymentDecision};
use super::error::SchedulingError;
use super::guard::NotificationDispatcher;
use super::store::AppointmentStore;
use std::sync::Arc;

use AppointmentStatus::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },
    Unchanged(AppointmentStatus),
}

/// Decide whether `from -> to` is a legal move.
pub fn transition(
    from: AppointmentStatus,
    to: AppointmentStatus,
) -> Result<Transition, SchedulingError> {
    match (from, to) {
        (Confirmed, Confirmed) | (Rejected, Rejected) | (Cancelled, Cancelled) => {
            Ok(Transition::Unchanged(from))
        }
        (Pending, Confirmed | Rejected | Cancelled) | (Confirmed | Rejected, Cancelled) => {
            Ok(Transition::Applied { from, to })
        }
        _ => Err(SchedulingError::InvalidTransition { from, to }),
    }
}

/// Statuses reachable from `from` by an applied transition.
pub fn next_statuses(from: AppointmentStatus) -> Vec<AppointmentStatus> {
    [Pending, Confirmed, Rejected, Cancelled]
        .into_iter()
        .filter(|to| matches!(transition(from, *to), Ok(Transition::Applied { .. })))
        .collect()
}

/// Outcome of a status write as seen by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub appointment: Appointment,
    pub transition: Transition,
}

pub struct LifecycleManager {
    store: Arc<dyn AppointmentStore>,
    events: NotificationDispatcher,
}

impl LifecycleManager {
    pub fn new(store: Arc<dyn AppointmentStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            events: NotificationDispatcher::spawn(notifier),
        }
    }

    /// Move appointment `id` to `to`. The store checks the move inside its own
    /// critical section so concurrent writers to one id cannot both succeed
    /// with incompatible statuses.
    pub fn apply_transition(
        &self,
        id: AppointmentId,
        to: AppointmentStatus,
    ) -> Result<Appointment, SchedulingError> {
        let update = self.store.update_status(id, to).inspect_err(|err| {
            tracing::warn!(appointment_id = %id, to = %to, error = %err, "status change refused");
        })?;

        match update.transition {
            Transition::Applied { from, to } => {
                tracing::info!(appointment_id = %id, %from, %to, "appointment status changed");
                self.announce(&update.appointment);
            }
            Transition::Unchanged(status) => {
                tracing::debug!(appointment_id = %id, %status, "status already set");
            }
        }

        Ok(update.appointment)
    }

    /// Apply a payment decision that arrived for `id`.
    pub fn apply_decision(
        &self,
        id: AppointmentId,
        decision: PaymentDecision,
    ) -> Result<Appointment, SchedulingError> {
        self.apply_transition(id, decision.status())
    }

    pub(crate) fn announce(&self, appointment: &Appointment) {
        let event = LifecycleEvent {
            kind: EventKind::for_status(appointment.status()),
            appointment_id: appointment.id(),
            patient_id: appointment.patient_id(),
            status: appointment.status(),
        };
        self.events.notify(event);
    }
}
