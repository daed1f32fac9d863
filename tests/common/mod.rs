#![allow(dead_code)]

use appointment_scheduler::collaborators::{
    CollaboratorError, DirectoryRoleResolver, LifecycleEvent, Notifier, ParityPaymentValidator,
    PaymentDecision, PaymentValidator, RoleResolver,
};
use appointment_scheduler::config::SchedulerConfig;
use appointment_scheduler::store::{AppointmentStore, MemoryStore, SledStore};
use appointment_scheduler::{AppointmentRequest, PaymentType, Role, SchedulingEngine, UserId};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

pub const RECEPTIONIST: UserId = UserId(1);
pub const DOCTOR_A: UserId = UserId(2);
pub const DOCTOR_B: UserId = UserId(3);
pub const ADMIN: UserId = UserId(4);
pub const PATIENT_A: UserId = UserId(7);
pub const PATIENT_B: UserId = UserId(9);
pub const UNKNOWN: UserId = UserId(42);

pub fn directory() -> DirectoryRoleResolver {
    DirectoryRoleResolver::with_users([
        (RECEPTIONIST, Role::Receptionist),
        (DOCTOR_A, Role::Doctor),
        (DOCTOR_B, Role::Doctor),
        (ADMIN, Role::Admin),
        (PATIENT_A, Role::Patient),
        (PATIENT_B, Role::Patient),
    ])
}

/// Keeps every event it is handed, in order.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Delivery runs on the dispatcher thread, so wait until `count` events
    /// have arrived (or a few seconds have passed) before reading them.
    pub fn wait_for(&self, count: usize) -> Vec<LifecycleEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.events.lock().unwrap().len() < count && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        self.events()
    }
}

/// Records events, but only after holding each one for `delay`.
pub struct SlowNotifier {
    pub inner: RecordingNotifier,
    pub delay: Duration,
}

impl Notifier for SlowNotifier {
    fn emit(&self, event: &LifecycleEvent) {
        thread::sleep(self.delay);
        self.inner.emit(event);
    }
}

/// Wraps the parity rule and counts how often it was asked.
#[derive(Default)]
pub struct CountingValidator {
    pub calls: AtomicUsize,
}

impl PaymentValidator for CountingValidator {
    fn validate(
        &self,
        payment_type: PaymentType,
        details: &str,
    ) -> Result<PaymentDecision, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ParityPaymentValidator.validate(payment_type, details)
    }
}

impl Notifier for RecordingNotifier {
    fn emit(&self, event: &LifecycleEvent) {
        self.events.lock().unwrap().push(*event);
    }
}

/// A notifier whose backend is down.
pub struct BrokenNotifier;

impl Notifier for BrokenNotifier {
    fn emit(&self, _: &LifecycleEvent) {
        panic!("notification backend unreachable");
    }
}

/// Answers like the directory but only after `delay`.
pub struct SlowRoleResolver {
    pub inner: DirectoryRoleResolver,
    pub delay: Duration,
}

impl RoleResolver for SlowRoleResolver {
    fn resolve(&self, caller: UserId, target: UserId) -> Result<Role, CollaboratorError> {
        thread::sleep(self.delay);
        self.inner.resolve(caller, target)
    }
}

pub struct Harness {
    pub engine: SchedulingEngine,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn harness_with(store: Arc<dyn AppointmentStore>, config: SchedulerConfig) -> Harness {
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = SchedulingEngine::new(
        store,
        Arc::new(directory()),
        Arc::new(ParityPaymentValidator),
        notifier.clone(),
        config,
    );
    Harness { engine, notifier }
}

pub fn memory_harness() -> Harness {
    harness_with(Arc::new(MemoryStore::new()), SchedulerConfig::default())
}

pub fn sled_harness(path: &Path) -> anyhow::Result<Harness> {
    let store = SledStore::open(path)?;
    Ok(harness_with(Arc::new(store), SchedulerConfig::default()))
}

/// Cardiology booking covered by the "Acme" insurer.
pub fn booking(
    requester: UserId,
    patient: UserId,
    doctor: UserId,
    slot: &str,
) -> AppointmentRequest {
    AppointmentRequest::new()
        .set_requester(requester)
        .set_patient(patient)
        .set_doctor(doctor)
        .set_slot(slot)
        .set_specialty("CARDIOLOGY")
        .set_payment_type("INSURANCE")
        .set_payment_details("Acme")
}
