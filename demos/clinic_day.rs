//! Books a morning at a small clinic against a sled database and prints the
//! lifecycle events through the tracing pipeline.
//!
//! `RUST_LOG=appointment_scheduler=debug cargo run --example clinic_day`
use appointment_scheduler::collaborators::{
    DirectoryRoleResolver, ParityPaymentValidator, TracingNotifier,
};
use appointment_scheduler::config::SchedulerConfig;
use appointment_scheduler::store::SledStore;
use appointment_scheduler::telemetry::{self, DEFAULT_LOG_FILTER};
use appointment_scheduler::{
    AppointmentFilter, AppointmentRequest, AppointmentStatus, Role, SchedulingEngine, UserId,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    telemetry::init_tracing(DEFAULT_LOG_FILTER);

    let directory = DirectoryRoleResolver::new();
    directory.register(UserId(1), Role::Receptionist)?;
    directory.register(UserId(2), Role::Doctor)?;
    directory.register(UserId(7), Role::Patient)?;
    directory.register(UserId(9), Role::Patient)?;

    let temp_dir = tempfile::tempdir()?;
    let store = SledStore::open(temp_dir.path().join("clinic.db"))?;
    let config = SchedulerConfig::from_env()?;

    let engine = SchedulingEngine::new(
        Arc::new(store),
        Arc::new(directory),
        Arc::new(ParityPaymentValidator),
        Arc::new(TracingNotifier),
        config,
    );

    let first = engine.create_appointment(
        &AppointmentRequest::new()
            .set_requester(UserId(7))
            .set_patient(UserId(7))
            .set_doctor(UserId(2))
            .set_slot("2026-03-15T08:00")
            .set_specialty("CARDIOLOGY")
            .set_payment_type("INSURANCE")
            .set_payment_details("Unimed"),
    )?;
    let second = engine.create_appointment(
        &AppointmentRequest::new()
            .set_requester(UserId(1))
            .set_patient(UserId(9))
            .set_doctor(UserId(2))
            .set_slot("2026-03-15 09:00")
            .set_specialty("cardiology")
            .set_payment_type("self_pay")
            .set_payment_details("4111111111111111"),
    )?;

    engine.validate_payment(first.id)?;
    engine.validate_payment(second.id)?;
    engine.update_status(second.id, AppointmentStatus::Cancelled)?;

    for appointment in engine.list_appointments(&AppointmentFilter::new())? {
        println!(
            "#{} {} doctor {} patient {} {}",
            appointment.id(),
            appointment.slot(),
            appointment.doctor_id(),
            appointment.patient_id(),
            appointment.status()
        );
    }

    // let the notifier thread drain before the process exits
    thread::sleep(Duration::from_millis(100));
    Ok(())
}
