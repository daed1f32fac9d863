//! Appointment storage. Every implementation guarantees that no two
//! non-cancelled appointments share a doctor or a patient in the same slot.
use super::appointment::{
    Appointment, AppointmentFilter, AppointmentId, AppointmentStatus, NewAppointment,
};
use super::conflict;
use super::error::SchedulingError;
use super::lifecycle::{self, StatusUpdate};
use std::sync::Mutex;

pub use super::sled_store::SledStore;

/// How a store keeps the booking invariants under concurrent writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyPolicy {
    /// Availability check and insert share one critical section.
    ExclusiveCheckThenInsert,
    /// Inserts race; uniqueness constraints reject the loser at commit.
    ConstraintEnforced,
}

pub trait AppointmentStore: Send + Sync {
    fn policy(&self) -> ConcurrencyPolicy;

    /// Persist `new` as PENDING under a fresh id, or fail with
    /// `SchedulingError::Conflict` when the doctor or patient is already booked.
    fn insert(&self, new: NewAppointment) -> Result<Appointment, SchedulingError>;

    fn get(&self, id: AppointmentId) -> Result<Option<Appointment>, SchedulingError>;

    fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, SchedulingError>;

    /// Check and write a status change as one unit.
    fn update_status(
        &self,
        id: AppointmentId,
        to: AppointmentStatus,
    ) -> Result<StatusUpdate, SchedulingError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    appointments: Vec<Appointment>,
    last_id: u64,
}

/// Single-process store: one mutex serializes every check-then-write.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, SchedulingError> {
        self.state.lock().map_err(|_| SchedulingError::Poisoned)
    }
}

impl AppointmentStore for MemoryStore {
    fn policy(&self) -> ConcurrencyPolicy {
        ConcurrencyPolicy::ExclusiveCheckThenInsert
    }

    fn insert(&self, new: NewAppointment) -> Result<Appointment, SchedulingError> {
        let mut state = self.lock()?;

        conflict::check_availability(
            new.doctor_id(),
            new.patient_id(),
            new.slot(),
            &state.appointments,
        )
        .into_result()?;

        state.last_id += 1;
        let appointment = Appointment::create(AppointmentId(state.last_id), new);
        state.appointments.push(appointment.clone());

        Ok(appointment)
    }

    fn get(&self, id: AppointmentId) -> Result<Option<Appointment>, SchedulingError> {
        let state = self.lock()?;
        Ok(state.appointments.iter().find(|a| a.id() == id).cloned())
    }

    fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, SchedulingError> {
        let state = self.lock()?;
        Ok(state
            .appointments
            .iter()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect())
    }

    fn update_status(
        &self,
        id: AppointmentId,
        to: AppointmentStatus,
    ) -> Result<StatusUpdate, SchedulingError> {
        let mut state = self.lock()?;
        let appointment = state
            .appointments
            .iter_mut()
            .find(|a| a.id() == id)
            .ok_or(SchedulingError::NotFound(id))?;

        let transition = lifecycle::transition(appointment.status(), to)?;
        appointment.set_status(to);

        Ok(StatusUpdate {
            appointment: appointment.clone(),
            transition,
        })
    }
}
