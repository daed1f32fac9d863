//! Double-booking detection over a snapshot of existing appointments.
use super::appointment::{Appointment, Slot, UserId};
use super::error::{ConflictKind, SchedulingError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Conflict(ConflictKind),
}

impl Availability {
    pub fn into_result(self) -> Result<(), SchedulingError> {
        match self {
            Availability::Available => Ok(()),
            Availability::Conflict(kind) => Err(SchedulingError::Conflict(kind)),
        }
    }
}

/// Scan `existing` for a non-cancelled appointment in `slot` held by the same
/// doctor or the same patient. The first match decides; the doctor is checked
/// before the patient.
pub fn check_availability<'a, I>(
    doctor_id: UserId,
    patient_id: UserId,
    slot: Slot,
    existing: I,
) -> Availability
where
    I: IntoIterator<Item = &'a Appointment>,
{
    for appointment in existing {
        if !appointment.status().is_active() || appointment.slot() != slot {
            continue;
        }
        if appointment.doctor_id() == doctor_id {
            return Availability::Conflict(ConflictKind::DoctorBusy);
        }
        if appointment.patient_id() == patient_id {
            return Availability::Conflict(ConflictKind::PatientBusy);
        }
    }
    Availability::Available
}
