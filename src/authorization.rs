//! Who may book for whom.
use super::appointment::{Role, UserId};
use super::collaborators::{CollaboratorError, RoleResolver};
use super::error::{DenyReason, SchedulingError};
use super::guard::CollaboratorGuard;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn into_result(self) -> Result<(), SchedulingError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(SchedulingError::AuthorizationDenied(reason)),
        }
    }
}

/// Requester rule: patients book only for themselves, receptionists for anyone,
/// every other role not at all.
pub fn requester_policy(
    requester_id: UserId,
    requester_role: Role,
    patient_id: UserId,
) -> Decision {
    match requester_role {
        Role::Patient if requester_id == patient_id => Decision::Allow,
        Role::Patient => Decision::Deny(DenyReason::PatientBookingForOther),
        Role::Receptionist => Decision::Allow,
        Role::Doctor | Role::Admin => Decision::Deny(DenyReason::RoleMayNotBook),
    }
}

/// Target rule: the patient must be a patient and the doctor a doctor.
pub fn target_policy(
    patient_id: UserId,
    patient_role: Role,
    doctor_id: UserId,
    doctor_role: Role,
) -> Decision {
    if patient_role != Role::Patient {
        return Decision::Deny(DenyReason::TargetNotPatient(patient_id));
    }
    if doctor_role != Role::Doctor {
        return Decision::Deny(DenyReason::TargetNotDoctor(doctor_id));
    }
    Decision::Allow
}

pub struct AuthorizationGate {
    roles: Arc<dyn RoleResolver>,
    guard: CollaboratorGuard,
}

impl AuthorizationGate {
    pub fn new(roles: Arc<dyn RoleResolver>, guard: CollaboratorGuard) -> Self {
        Self { roles, guard }
    }

    /// Resolve the requester's role and both targets' roles, then apply both
    /// rules. A resolver failure is an error of its own, never a denial.
    pub fn authorize(
        &self,
        requester_id: UserId,
        patient_id: UserId,
        doctor_id: UserId,
    ) -> Result<(), SchedulingError> {
        let requester_role = self.resolve(requester_id, requester_id)?;
        tracing::debug!(%requester_id, role = %requester_role, "requester resolved");

        requester_policy(requester_id, requester_role, patient_id).into_result()?;

        // Runs even when the requester is the patient.
        let patient_role = self.resolve(requester_id, patient_id)?;
        let doctor_role = self.resolve(requester_id, doctor_id)?;

        target_policy(patient_id, patient_role, doctor_id, doctor_role).into_result()
    }

    fn resolve(&self, caller: UserId, target: UserId) -> Result<Role, SchedulingError> {
        let roles = Arc::clone(&self.roles);
        self.guard
            .call("role resolver", move || roles.resolve(caller, target))
            .map_err(|err| match err {
                CollaboratorError::NotFound(_) => SchedulingError::UnknownIdentity(target),
                source => SchedulingError::CollaboratorUnavailable {
                    collaborator: "role resolver",
                    source,
                },
            })
    }
}
