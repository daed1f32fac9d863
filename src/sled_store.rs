//! Durable appointment store on sled.
//!
//! Records live in the `appointments` tree keyed by big-endian id. The
//! `doctor_slots` and `patient_slots` trees hold one key per non-cancelled
//! appointment and act as partial uniqueness constraints: an insert whose key
//! already exists aborts the transaction with the matching conflict.
use super::appointment::{
    Appointment, AppointmentFilter, AppointmentId, AppointmentStatus, NewAppointment, Slot, UserId,
};
use super::error::{ConflictKind, SchedulingError};
use super::lifecycle::{self, StatusUpdate, Transition};
use super::store::{AppointmentStore, ConcurrencyPolicy};
use sled::Transactional;
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};
use std::path::Path;
use std::sync::Arc;

const APPOINTMENTS_TREE: &str = "appointments";
const DOCTOR_SLOTS_TREE: &str = "doctor_slots";
const PATIENT_SLOTS_TREE: &str = "patient_slots";

pub struct SledStore {
    db: Arc<sled::Db>,
    appointments: sled::Tree,
    doctor_slots: sled::Tree,
    patient_slots: sled::Tree,
}

fn id_key(id: AppointmentId) -> [u8; 8] {
    id.0.to_be_bytes()
}

fn slot_key(user: UserId, slot: Slot) -> Vec<u8> {
    format!("{user}/{slot}").into_bytes()
}

fn decode(bytes: &[u8]) -> Result<Appointment, SchedulingError> {
    Ok(minicbor::decode(bytes)?)
}

fn abort<T>(err: SchedulingError) -> Result<T, ConflictableTransactionError<SchedulingError>> {
    Err(ConflictableTransactionError::Abort(err))
}

fn flatten<T>(result: Result<T, TransactionError<SchedulingError>>) -> Result<T, SchedulingError> {
    result.map_err(|err| match err {
        TransactionError::Abort(err) => err,
        TransactionError::Storage(err) => SchedulingError::Storage(err),
    })
}

impl SledStore {
    pub fn new(db: Arc<sled::Db>) -> Result<Self, SchedulingError> {
        let appointments = db.open_tree(APPOINTMENTS_TREE)?;
        let doctor_slots = db.open_tree(DOCTOR_SLOTS_TREE)?;
        let patient_slots = db.open_tree(PATIENT_SLOTS_TREE)?;

        Ok(Self {
            db,
            appointments,
            doctor_slots,
            patient_slots,
        })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, SchedulingError> {
        let db = sled::open(path)?;
        Self::new(Arc::new(db))
    }

    fn next_id(&self) -> Result<AppointmentId, SchedulingError> {
        // generate_id starts at zero
        Ok(AppointmentId(self.db.generate_id()? + 1))
    }
}

fn release_slot(
    tree: &TransactionalTree,
    key: Vec<u8>,
    id: AppointmentId,
) -> Result<(), ConflictableTransactionError<SchedulingError>> {
    let holder = tree.get(&key)?;
    if holder.as_deref() == Some(&id_key(id)[..]) {
        tree.remove(key)?;
    }
    Ok(())
}

impl AppointmentStore for SledStore {
    fn policy(&self) -> ConcurrencyPolicy {
        ConcurrencyPolicy::ConstraintEnforced
    }

    fn insert(&self, new: NewAppointment) -> Result<Appointment, SchedulingError> {
        let appointment = Appointment::create(self.next_id()?, new);
        let record = minicbor::to_vec(&appointment)?;
        let key = id_key(appointment.id());
        let doctor_key = slot_key(appointment.doctor_id(), appointment.slot());
        let patient_key = slot_key(appointment.patient_id(), appointment.slot());

        let result = (&self.appointments, &self.doctor_slots, &self.patient_slots).transaction(
            |(appointments, doctor_slots, patient_slots)| {
                if doctor_slots.get(&doctor_key)?.is_some() {
                    return abort(SchedulingError::Conflict(ConflictKind::DoctorBusy));
                }
                if patient_slots.get(&patient_key)?.is_some() {
                    return abort(SchedulingError::Conflict(ConflictKind::PatientBusy));
                }

                appointments.insert(&key[..], record.clone())?;
                doctor_slots.insert(doctor_key.clone(), &key[..])?;
                patient_slots.insert(patient_key.clone(), &key[..])?;
                Ok(())
            },
        );
        flatten(result)?;
        self.db.flush()?;

        Ok(appointment)
    }

    fn get(&self, id: AppointmentId) -> Result<Option<Appointment>, SchedulingError> {
        match self.appointments.get(id_key(id))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, SchedulingError> {
        let mut found = Vec::new();
        for entry in self.appointments.iter() {
            let (_, bytes) = entry?;
            let appointment = decode(&bytes)?;
            if filter.matches(&appointment) {
                found.push(appointment);
            }
        }
        Ok(found)
    }

    fn update_status(
        &self,
        id: AppointmentId,
        to: AppointmentStatus,
    ) -> Result<StatusUpdate, SchedulingError> {
        let key = id_key(id);

        let result = (&self.appointments, &self.doctor_slots, &self.patient_slots).transaction(
            |(appointments, doctor_slots, patient_slots)| {
                let Some(bytes) = appointments.get(&key[..])? else {
                    return abort(SchedulingError::NotFound(id));
                };
                let mut appointment = match decode(&bytes) {
                    Ok(appointment) => appointment,
                    Err(err) => return abort(err),
                };

                let transition = match lifecycle::transition(appointment.status(), to) {
                    Ok(transition) => transition,
                    Err(err) => return abort(err),
                };

                if let Transition::Applied { .. } = transition {
                    appointment.set_status(to);
                    let record = match minicbor::to_vec(&appointment) {
                        Ok(record) => record,
                        Err(err) => return abort(err.into()),
                    };
                    appointments.insert(&key[..], record)?;

                    if to == AppointmentStatus::Cancelled {
                        let slot = appointment.slot();
                        release_slot(doctor_slots, slot_key(appointment.doctor_id(), slot), id)?;
                        release_slot(patient_slots, slot_key(appointment.patient_id(), slot), id)?;
                    }
                }

                Ok(StatusUpdate {
                    appointment,
                    transition,
                })
            },
        );
        let update = flatten(result)?;
        self.db.flush()?;

        Ok(update)
    }
}
