//! Property-based tests for the booking rules
//!
//! Authorization and conflict detection are pure decisions, so they can be
//! checked against randomly generated requesters, targets and schedules. The
//! store properties then check that whatever sequence of bookings and
//! cancellations is thrown at the in-memory store, the active appointments
//! never double-book a doctor or a patient.

use appointment_scheduler::authorization::{Decision, requester_policy};
use appointment_scheduler::config::SchedulerConfig;
use appointment_scheduler::conflict::{Availability, check_availability};
use appointment_scheduler::error::{ConflictKind, DenyReason};
use appointment_scheduler::store::{AppointmentStore, MemoryStore};
use appointment_scheduler::{
    AppointmentFilter, AppointmentRequest, AppointmentStatus, Role, Slot, UserId,
};
use proptest::prelude::*;
use std::collections::HashSet;

fn role_strategy() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::Patient),
        Just(Role::Doctor),
        Just(Role::Receptionist),
        Just(Role::Admin),
    ]
}

/// A small id space so that generated bookings collide often.
fn user_strategy() -> impl Strategy<Value = UserId> {
    (1u64..=4).prop_map(UserId)
}

fn slot_strategy() -> impl Strategy<Value = String> {
    (1u32..=2, 6u32..=8).prop_map(|(day, hour)| format!("2026-09-0{day}T{hour:02}:00"))
}

#[derive(Debug, Clone)]
enum Step {
    Book {
        doctor: UserId,
        patient: UserId,
        slot: String,
    },
    Cancel(usize),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => (user_strategy(), user_strategy(), slot_strategy())
            .prop_map(|(doctor, patient, slot)| Step::Book { doctor, patient, slot }),
        1 => (0usize..20).prop_map(Step::Cancel),
    ]
}

fn request(doctor: UserId, patient: UserId, slot: &str) -> AppointmentRequest {
    AppointmentRequest::new()
        .set_requester(patient)
        .set_patient(patient)
        .set_doctor(doctor)
        .set_slot(slot)
        .set_specialty("ORTHOPEDICS")
        .set_payment_type("INSURANCE")
        .set_payment_details("Acme")
}

proptest! {
    /// Property: a patient booking for anyone else is denied whatever the other ids are
    #[test]
    fn prop_patient_cannot_book_for_others(
        requester in 1u64..1000,
        patient in 1u64..1000,
    ) {
        prop_assume!(requester != patient);
        prop_assert_eq!(
            requester_policy(UserId(requester), Role::Patient, UserId(patient)),
            Decision::Deny(DenyReason::PatientBookingForOther)
        );
    }

    /// Property: only patients (for themselves) and receptionists get past the requester rule
    #[test]
    fn prop_only_patients_and_receptionists_book(role in role_strategy(), id in user_strategy()) {
        let allowed = requester_policy(id, role, id) == Decision::Allow;
        prop_assert_eq!(allowed, matches!(role, Role::Patient | Role::Receptionist));
    }

    /// Property: the detector reports a conflict exactly when an active
    /// appointment shares the slot with the same doctor or patient
    #[test]
    fn prop_detector_matches_brute_force(
        steps in prop::collection::vec(step_strategy(), 0..20),
        doctor in user_strategy(),
        patient in user_strategy(),
        slot in slot_strategy(),
    ) {
        let store = MemoryStore::new();
        apply(&store, &steps);
        let existing = store.list(&AppointmentFilter::new()).unwrap();
        let slot = Slot::parse(&slot).unwrap();

        let doctor_busy = existing
            .iter()
            .any(|a| a.status().is_active() && a.slot() == slot && a.doctor_id() == doctor);
        let patient_busy = existing
            .iter()
            .any(|a| a.status().is_active() && a.slot() == slot && a.patient_id() == patient);

        match check_availability(doctor, patient, slot, &existing) {
            Availability::Available => prop_assert!(!doctor_busy && !patient_busy),
            Availability::Conflict(ConflictKind::DoctorBusy) => prop_assert!(doctor_busy),
            Availability::Conflict(ConflictKind::PatientBusy) => prop_assert!(patient_busy),
        }
    }

    /// Property: no sequence of bookings and cancellations leaves two active
    /// appointments sharing a doctor or a patient in one slot
    #[test]
    fn prop_store_never_double_books(steps in prop::collection::vec(step_strategy(), 0..40)) {
        let store = MemoryStore::new();
        apply(&store, &steps);

        let active = store.list(&AppointmentFilter::new().active_only()).unwrap();
        let mut doctors = HashSet::new();
        let mut patients = HashSet::new();
        for appointment in &active {
            prop_assert!(doctors.insert((appointment.doctor_id(), appointment.slot())));
            prop_assert!(patients.insert((appointment.patient_id(), appointment.slot())));
        }
    }
}

fn apply(store: &MemoryStore, steps: &[Step]) {
    let config = SchedulerConfig::default();
    let mut booked = Vec::new();

    for step in steps {
        match step {
            Step::Book { doctor, patient, slot } => {
                let (_, new) = request(*doctor, *patient, slot)
                    .validate_and_finalise(&config)
                    .unwrap();
                if let Ok(appointment) = store.insert(new) {
                    booked.push(appointment.id());
                }
            }
            Step::Cancel(index) => {
                if let Some(id) = booked.get(*index) {
                    // cancelling twice is an accepted no-op
                    store.update_status(*id, AppointmentStatus::Cancelled).unwrap();
                }
            }
        }
    }
}
