//! Service layer API for appointment scheduling
use super::appointment::{
    Appointment, AppointmentFilter, AppointmentId, AppointmentReceipt, AppointmentRequest,
    AppointmentStatus,
};
use super::authorization::AuthorizationGate;
use super::collaborators::{Notifier, PaymentDecision, PaymentValidator, RoleResolver};
use super::config::SchedulerConfig;
use super::conflict;
use super::error::SchedulingError;
use super::guard::CollaboratorGuard;
use super::lifecycle::LifecycleManager;
use super::store::AppointmentStore;
use std::sync::Arc;
use uuid7::uuid7;

pub struct SchedulingEngine {
    store: Arc<dyn AppointmentStore>,
    payments: Arc<dyn PaymentValidator>,
    gate: AuthorizationGate,
    lifecycle: LifecycleManager,
    guard: CollaboratorGuard,
    config: SchedulerConfig,
}

impl SchedulingEngine {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        roles: Arc<dyn RoleResolver>,
        payments: Arc<dyn PaymentValidator>,
        notifier: Arc<dyn Notifier>,
        config: SchedulerConfig,
    ) -> Self {
        let guard = CollaboratorGuard::from_config(&config);
        Self {
            gate: AuthorizationGate::new(roles, guard),
            lifecycle: LifecycleManager::new(Arc::clone(&store), notifier),
            store,
            payments,
            guard,
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Validate, authorize, check availability and persist a new PENDING
    /// appointment. The store repeats the availability check atomically with
    /// the insert, so a booking that raced past the first check still ends
    /// as a conflict.
    pub fn create_appointment(
        &self,
        request: &AppointmentRequest,
    ) -> Result<AppointmentReceipt, SchedulingError> {
        let request_id = uuid7();
        let span = tracing::info_span!(
            "create_appointment",
            %request_id,
            requester = tracing::field::Empty,
            patient = tracing::field::Empty,
            doctor = tracing::field::Empty,
            slot = tracing::field::Empty,
        );
        let _enter = span.enter();

        let (requester_id, new) =
            request
                .validate_and_finalise(&self.config)
                .inspect_err(|err| {
                    tracing::warn!(error = %err, "request rejected");
                })?;
        span.record("requester", tracing::field::display(requester_id));
        span.record("patient", tracing::field::display(new.patient_id()));
        span.record("doctor", tracing::field::display(new.doctor_id()));
        span.record("slot", tracing::field::display(new.slot()));

        self.gate
            .authorize(requester_id, new.patient_id(), new.doctor_id())
            .inspect_err(|err| {
                tracing::warn!(error = %err, kind = ?err.kind(), "authorization failed");
            })?;

        let snapshot = self
            .store
            .list(&AppointmentFilter::new().at_slot(new.slot()).active_only())?;
        conflict::check_availability(new.doctor_id(), new.patient_id(), new.slot(), &snapshot)
            .into_result()
            .inspect_err(|err| tracing::warn!(error = %err, "slot unavailable"))?;

        let appointment = self.store.insert(new).inspect_err(|err| {
            tracing::warn!(error = %err, policy = ?self.store.policy(), "insert refused");
        })?;

        tracing::info!(
            appointment_id = %appointment.id(),
            specialty = %appointment.specialty(),
            payment_type = %appointment.payment_type(),
            payment_details = %appointment.masked_payment_details(),
            "appointment created"
        );
        self.lifecycle.announce(&appointment);

        Ok(AppointmentReceipt::from(&appointment))
    }

    pub fn list_appointments(
        &self,
        filter: &AppointmentFilter,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        self.store.list(filter)
    }

    pub fn get_appointment(&self, id: AppointmentId) -> Result<Appointment, SchedulingError> {
        self.store.get(id)?.ok_or(SchedulingError::NotFound(id))
    }

    /// Manual status change by an operator.
    pub fn update_status(
        &self,
        id: AppointmentId,
        status: AppointmentStatus,
    ) -> Result<AppointmentReceipt, SchedulingError> {
        let appointment = self.lifecycle.apply_transition(id, status)?;
        Ok(AppointmentReceipt::from(&appointment))
    }

    /// Record a payment decision that arrived from outside.
    pub fn apply_payment_decision(
        &self,
        id: AppointmentId,
        decision: PaymentDecision,
    ) -> Result<AppointmentReceipt, SchedulingError> {
        let appointment = self.lifecycle.apply_decision(id, decision)?;
        Ok(AppointmentReceipt::from(&appointment))
    }

    /// Ask the payment validator about appointment `id` and apply its decision.
    pub fn validate_payment(
        &self,
        id: AppointmentId,
    ) -> Result<AppointmentReceipt, SchedulingError> {
        let appointment = self.get_appointment(id)?;
        // only a pending appointment still awaits a decision
        if appointment.status() != AppointmentStatus::Pending {
            return Err(SchedulingError::InvalidTransition {
                from: appointment.status(),
                to: AppointmentStatus::Confirmed,
            });
        }
        let payment_type = appointment.payment_type();
        let details = appointment.payment_details().to_string();
        let payments = Arc::clone(&self.payments);

        let decision = self
            .guard
            .call("payment validator", move || {
                payments.validate(payment_type, &details)
            })
            .map_err(|source| SchedulingError::CollaboratorUnavailable {
                collaborator: "payment validator",
                source,
            })?;

        tracing::info!(
            appointment_id = %id,
            payment_details = %appointment.masked_payment_details(),
            ?decision,
            "payment decision received"
        );

        self.apply_payment_decision(id, decision)
    }
}
