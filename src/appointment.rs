//! Appointment records, their closed vocabularies and the draft request builder
use super::config::SchedulerConfig;
use super::error::SchedulingError;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use std::fmt;
use std::str::FromStr;

#[derive(
    minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct UserId(#[n(0)] pub u64);

// Assigned by the store, never by callers.
#[derive(
    minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct AppointmentId(#[n(0)] pub u64);

/// A closed vocabulary that arrives as free text and must be one of `ALL`.
pub trait ClosedSet: Sized + Copy + 'static {
    const FIELD: &'static str;
    const ALL: &'static [Self];

    fn as_str(&self) -> &'static str;

    /// Case-insensitive lookup; the error lists the valid options.
    fn parse(raw: &str) -> Result<Self, SchedulingError> {
        let wanted = raw.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|value| value.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let mut options: Vec<&str> = Self::ALL.iter().map(|v| v.as_str()).collect();
                options.sort_unstable();
                SchedulingError::Validation(format!(
                    "{} {:?} is invalid. Options: {}",
                    Self::FIELD,
                    raw,
                    options.join(", ")
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Patient,
    Doctor,
    Receptionist,
    Admin,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Specialty {
    #[n(0)]
    Cardiology,
    #[n(1)]
    Pediatrics,
    #[n(2)]
    Orthopedics,
    #[n(3)]
    Dermatology,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentType {
    #[n(0)]
    Insurance,
    #[n(1)]
    SelfPay,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppointmentStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Confirmed,
    #[n(2)]
    Rejected,
    #[n(3)]
    Cancelled,
}

impl ClosedSet for Role {
    const FIELD: &'static str = "role";
    const ALL: &'static [Self] = &[
        Role::Patient,
        Role::Doctor,
        Role::Receptionist,
        Role::Admin,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "PATIENT",
            Role::Doctor => "DOCTOR",
            Role::Receptionist => "RECEPTIONIST",
            Role::Admin => "ADMIN",
        }
    }
}

impl ClosedSet for Specialty {
    const FIELD: &'static str = "specialty";
    const ALL: &'static [Self] = &[
        Specialty::Cardiology,
        Specialty::Pediatrics,
        Specialty::Orthopedics,
        Specialty::Dermatology,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Specialty::Cardiology => "CARDIOLOGY",
            Specialty::Pediatrics => "PEDIATRICS",
            Specialty::Orthopedics => "ORTHOPEDICS",
            Specialty::Dermatology => "DERMATOLOGY",
        }
    }
}

impl ClosedSet for PaymentType {
    const FIELD: &'static str = "payment type";
    const ALL: &'static [Self] = &[PaymentType::Insurance, PaymentType::SelfPay];

    fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Insurance => "INSURANCE",
            PaymentType::SelfPay => "SELF_PAY",
        }
    }
}

impl ClosedSet for AppointmentStatus {
    const FIELD: &'static str = "status";
    const ALL: &'static [Self] = &[
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Rejected,
        AppointmentStatus::Cancelled,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "PENDING",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::Rejected => "REJECTED",
            AppointmentStatus::Cancelled => "CANCELLED",
        }
    }
}

impl AppointmentStatus {
    /// Cancelled appointments no longer hold their slot.
    pub fn is_active(&self) -> bool {
        *self != AppointmentStatus::Cancelled
    }
}

impl FromStr for Role {
    type Err = SchedulingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl FromStr for Specialty {
    type Err = SchedulingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl FromStr for PaymentType {
    type Err = SchedulingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl FromStr for AppointmentStatus {
    type Err = SchedulingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Specialty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AppointmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A calendar date plus an hour of the day. Always on the hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot {
    date: NaiveDate,
    hour: u32,
}

const SLOT_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"];

impl Slot {
    pub fn new(date: NaiveDate, hour: u32) -> Result<Self, SchedulingError> {
        if hour > 23 {
            return Err(SchedulingError::Validation(format!(
                "hour {hour} is not a valid hour of the day"
            )));
        }
        Ok(Self { date, hour })
    }

    /// Accepts `YYYY-MM-DDTHH:MM` or `YYYY-MM-DD HH:MM`; the minutes must be `00`.
    pub fn parse(raw: &str) -> Result<Self, SchedulingError> {
        let raw = raw.trim();
        let datetime = SLOT_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .ok_or_else(|| {
                SchedulingError::Validation(format!(
                    "slot {raw:?} is not a date and time (expected YYYY-MM-DDTHH:MM)"
                ))
            })?;

        if datetime.minute() != 0 || datetime.second() != 0 {
            return Err(SchedulingError::Validation(format!(
                "slot {raw:?} is not on the hour. Only full hours are allowed (e.g. 08:00)"
            )));
        }

        Self::new(datetime.date(), datetime.hour())
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn is_within(&self, opening_hour: u32, closing_hour: u32) -> bool {
        (opening_hour..=closing_hour).contains(&self.hour)
    }
}

impl FromStr for Slot {
    type Err = SchedulingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}T{:02}:00", self.date.format("%Y-%m-%d"), self.hour)
    }
}

impl<C> minicbor::Encode<C> for Slot {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?
            .i32(self.date.num_days_from_ce())?
            .u32(self.hour)?
            .ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Slot {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        d.array()?;
        let days = d.i32()?;
        let hour = d.u32()?;

        let date = NaiveDate::from_num_days_from_ce_opt(days)
            .ok_or(minicbor::decode::Error::message("slot date out of range"))?;
        if hour > 23 {
            return Err(minicbor::decode::Error::message("slot hour out of range"));
        }

        Ok(Slot { date, hour })
    }
}

/// A persisted booking. Only `status` ever changes after creation.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Appointment {
    #[n(0)]
    id: AppointmentId,
    #[n(1)]
    doctor_id: UserId,
    #[n(2)]
    patient_id: UserId,
    #[n(3)]
    slot: Slot,
    #[n(4)]
    specialty: Specialty,
    #[n(5)]
    payment_type: PaymentType,
    #[n(6)]
    payment_details: String, // insurer name or card number
    #[n(7)]
    status: AppointmentStatus,
}

impl Appointment {
    pub(crate) fn create(id: AppointmentId, new: NewAppointment) -> Self {
        Self {
            id,
            doctor_id: new.doctor_id,
            patient_id: new.patient_id,
            slot: new.slot,
            specialty: new.specialty,
            payment_type: new.payment_type,
            payment_details: new.payment_details,
            status: AppointmentStatus::Pending,
        }
    }

    pub(crate) fn set_status(&mut self, status: AppointmentStatus) {
        self.status = status;
    }

    pub fn id(&self) -> AppointmentId {
        self.id
    }
    pub fn doctor_id(&self) -> UserId {
        self.doctor_id
    }
    pub fn patient_id(&self) -> UserId {
        self.patient_id
    }
    pub fn slot(&self) -> Slot {
        self.slot
    }
    pub fn specialty(&self) -> Specialty {
        self.specialty
    }
    pub fn payment_type(&self) -> PaymentType {
        self.payment_type
    }
    pub fn payment_details(&self) -> &str {
        &self.payment_details
    }
    pub fn status(&self) -> AppointmentStatus {
        self.status
    }

    /// Payment details safe for logs: card numbers keep only their last four digits.
    pub fn masked_payment_details(&self) -> String {
        match self.payment_type {
            PaymentType::Insurance => self.payment_details.clone(),
            PaymentType::SelfPay => {
                let skip = self.payment_details.chars().count().saturating_sub(4);
                let tail: String = self.payment_details.chars().skip(skip).collect();
                format!("**** **** **** {tail}")
            }
        }
    }
}

/// A booking that passed input validation but has no id or status yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppointment {
    doctor_id: UserId,
    patient_id: UserId,
    slot: Slot,
    specialty: Specialty,
    payment_type: PaymentType,
    payment_details: String,
}

impl NewAppointment {
    pub fn doctor_id(&self) -> UserId {
        self.doctor_id
    }
    pub fn patient_id(&self) -> UserId {
        self.patient_id
    }
    pub fn slot(&self) -> Slot {
        self.slot
    }
}

/// What callers get back from a create or a status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppointmentReceipt {
    pub id: AppointmentId,
    pub status: AppointmentStatus,
}

impl From<&Appointment> for AppointmentReceipt {
    fn from(value: &Appointment) -> Self {
        Self {
            id: value.id,
            status: value.status,
        }
    }
}

// Draft as it arrives from a transport. Vocabulary fields stay raw until
// `validate_and_finalise` so unknown values can be reported back.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AppointmentRequest {
    requester_id: Option<UserId>,
    patient_id: Option<UserId>,
    doctor_id: Option<UserId>,
    slot: Option<String>,
    specialty: Option<String>,
    payment_type: Option<String>,
    payment_details: Option<String>,
}

const CARD_NUMBER_LENGTH: std::ops::RangeInclusive<usize> = 13..=19;

impl AppointmentRequest {
    /// Construct an empty draft
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_requester(mut self, id: UserId) -> Self {
        self.requester_id = Some(id);
        self
    }
    pub fn set_patient(mut self, id: UserId) -> Self {
        self.patient_id = Some(id);
        self
    }
    pub fn set_doctor(mut self, id: UserId) -> Self {
        self.doctor_id = Some(id);
        self
    }
    pub fn set_slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = Some(slot.into());
        self
    }
    pub fn set_specialty(mut self, specialty: impl Into<String>) -> Self {
        self.specialty = Some(specialty.into());
        self
    }
    pub fn set_payment_type(mut self, payment_type: impl Into<String>) -> Self {
        self.payment_type = Some(payment_type.into());
        self
    }
    pub fn set_payment_details(mut self, details: impl Into<String>) -> Self {
        self.payment_details = Some(details.into());
        self
    }

    pub fn requester_id(&self) -> Option<UserId> {
        self.requester_id
    }

    // Checks every field and returns the requester plus the booking to persist.
    pub fn validate_and_finalise(
        &self,
        config: &SchedulerConfig,
    ) -> Result<(UserId, NewAppointment), SchedulingError> {
        let requester_id = required_id(self.requester_id, "requester")?;
        let patient_id = required_id(self.patient_id, "patient")?;
        let doctor_id = required_id(self.doctor_id, "doctor")?;
        let slot = required_text(&self.slot, "slot")?;
        let specialty = required_text(&self.specialty, "specialty")?;
        let payment_type = required_text(&self.payment_type, "payment type")?;
        let payment_details = required_text(&self.payment_details, "payment details")?;

        let slot = Slot::parse(slot)?;
        if !slot.is_within(config.opening_hour, config.closing_hour) {
            return Err(SchedulingError::Validation(format!(
                "slot {slot} is outside clinic hours ({:02}:00 to {:02}:00)",
                config.opening_hour, config.closing_hour
            )));
        }

        let specialty = Specialty::parse(specialty)?;
        let payment_type = PaymentType::parse(payment_type)?;
        let payment_details = payment_details.trim().to_string();

        if payment_type == PaymentType::SelfPay {
            let digits_only = payment_details.chars().all(|c| c.is_ascii_digit());
            if !digits_only || !CARD_NUMBER_LENGTH.contains(&payment_details.len()) {
                return Err(SchedulingError::Validation(
                    "card number must be 13 to 19 digits".into(),
                ));
            }
        }

        Ok((
            requester_id,
            NewAppointment {
                doctor_id,
                patient_id,
                slot,
                specialty,
                payment_type,
                payment_details,
            },
        ))
    }
}

fn required_id(id: Option<UserId>, field: &str) -> Result<UserId, SchedulingError> {
    match id {
        Some(UserId(0)) | None => Err(SchedulingError::Validation(format!(
            "all fields are required: {field} is missing"
        ))),
        Some(id) => Ok(id),
    }
}

fn required_text<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, SchedulingError> {
    match value.as_deref() {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(SchedulingError::Validation(format!(
            "all fields are required: {field} is missing"
        ))),
    }
}

/// Read-side selection for `list`. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentFilter {
    doctor_id: Option<UserId>,
    patient_id: Option<UserId>,
    date: Option<NaiveDate>,
    slot: Option<Slot>,
    status: Option<AppointmentStatus>,
    active_only: bool,
}

impl AppointmentFilter {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn for_doctor(mut self, id: UserId) -> Self {
        self.doctor_id = Some(id);
        self
    }
    pub fn for_patient(mut self, id: UserId) -> Self {
        self.patient_id = Some(id);
        self
    }
    pub fn on_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
    pub fn at_slot(mut self, slot: Slot) -> Self {
        self.slot = Some(slot);
        self
    }
    pub fn with_status(mut self, status: AppointmentStatus) -> Self {
        self.status = Some(status);
        self
    }
    pub fn active_only(mut self) -> Self {
        self.active_only = true;
        self
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.doctor_id.is_none_or(|id| appointment.doctor_id == id)
            && self.patient_id.is_none_or(|id| appointment.patient_id == id)
            && self.date.is_none_or(|date| appointment.slot.date() == date)
            && self.slot.is_none_or(|slot| appointment.slot == slot)
            && self.status.is_none_or(|status| appointment.status == status)
            && (!self.active_only || appointment.status.is_active())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> AppointmentRequest {
        AppointmentRequest::new()
            .set_requester(UserId(7))
            .set_patient(UserId(7))
            .set_doctor(UserId(2))
            .set_slot("2026-03-15T08:00")
            .set_specialty("cardiology")
            .set_payment_type("INSURANCE")
            .set_payment_details("Acme")
    }

    #[test]
    fn slot_encoding() {
        let original = Slot::parse("2026-03-15 08:00").unwrap();

        let encoding = minicbor::to_vec(original).unwrap();
        let decode: Slot = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
        assert_eq!(decode.to_string(), "2026-03-15T08:00");
    }

    #[test]
    fn slot_rejects_minutes() {
        let err = Slot::parse("2026-03-15T08:30").unwrap_err();
        assert!(matches!(err, SchedulingError::Validation(_)));
    }

    #[test]
    fn closed_set_lists_sorted_options() {
        let err = Specialty::parse("NEUROLOGY").unwrap_err();
        assert_eq!(
            err.to_string(),
            concat!(
                "invalid request: specialty \"NEUROLOGY\" is invalid. ",
                "Options: CARDIOLOGY, DERMATOLOGY, ORTHOPEDICS, PEDIATRICS"
            )
        );
        assert_eq!(PaymentType::parse(" self_pay ").unwrap(), PaymentType::SelfPay);
    }

    #[test]
    fn finalise_trims_and_types_the_draft() {
        let (requester, new) = request()
            .validate_and_finalise(&SchedulerConfig::default())
            .unwrap();

        assert_eq!(requester, UserId(7));
        assert_eq!(new.doctor_id(), UserId(2));
        assert_eq!(new.slot().hour(), 8);
        assert_eq!(new.specialty, Specialty::Cardiology);
    }

    #[test]
    fn finalise_rejects_hours_outside_window() {
        let config = SchedulerConfig::default();
        let early = request().set_slot("2026-03-15T05:00");
        let late = request().set_slot("2026-03-15T17:00");
        let last = request().set_slot("2026-03-15T16:00");

        assert!(early.validate_and_finalise(&config).is_err());
        assert!(late.validate_and_finalise(&config).is_err());
        assert!(last.validate_and_finalise(&config).is_ok());
    }

    #[test]
    fn finalise_requires_every_field() {
        let config = SchedulerConfig::default();

        let missing_doctor = AppointmentRequest::new()
            .set_requester(UserId(7))
            .set_patient(UserId(7))
            .set_slot("2026-03-15T08:00")
            .set_specialty("CARDIOLOGY")
            .set_payment_type("INSURANCE")
            .set_payment_details("Acme");
        assert!(missing_doctor.validate_and_finalise(&config).is_err());

        let zero_patient = request().set_patient(UserId(0));
        assert!(zero_patient.validate_and_finalise(&config).is_err());

        let blank_details = request().set_payment_details("   ");
        assert!(blank_details.validate_and_finalise(&config).is_err());
    }

    #[test]
    fn card_numbers_are_digits_of_bounded_length() {
        let config = SchedulerConfig::default();
        let self_pay = request().set_payment_type("SELF_PAY");

        assert!(
            self_pay
                .clone()
                .set_payment_details("4111111111111111")
                .validate_and_finalise(&config)
                .is_ok()
        );
        assert!(
            self_pay
                .clone()
                .set_payment_details("411111111111")
                .validate_and_finalise(&config)
                .is_err()
        );
        assert!(
            self_pay
                .set_payment_details("4111-1111-1111-1111")
                .validate_and_finalise(&config)
                .is_err()
        );
    }

    #[test]
    fn masked_card_keeps_last_four() {
        let (_, new) = request()
            .set_payment_type("SELF_PAY")
            .set_payment_details("4111111111111234")
            .validate_and_finalise(&SchedulerConfig::default())
            .unwrap();
        let appointment = Appointment::create(AppointmentId(1), new);

        assert_eq!(appointment.masked_payment_details(), "**** **** **** 1234");
        assert_eq!(appointment.status(), AppointmentStatus::Pending);
    }

    #[test]
    fn appointment_encoding() {
        let (_, new) = request()
            .validate_and_finalise(&SchedulerConfig::default())
            .unwrap();
        let original = Appointment::create(AppointmentId(3), new);

        let encoding = minicbor::to_vec(&original).unwrap();
        let decode: Appointment = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn filter_excludes_cancelled_when_active_only() {
        let (_, new) = request()
            .validate_and_finalise(&SchedulerConfig::default())
            .unwrap();
        let mut appointment = Appointment::create(AppointmentId(1), new);
        let filter = AppointmentFilter::new().for_doctor(UserId(2)).active_only();

        assert!(filter.matches(&appointment));
        appointment.set_status(AppointmentStatus::Cancelled);
        assert!(!filter.matches(&appointment));
        assert!(AppointmentFilter::new().matches(&appointment));
    }
}
