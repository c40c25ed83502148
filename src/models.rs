use chrono::{NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::schema::{
    allergies, appointments, chronic_conditions, exams, medications, patient_medications,
    patients, prescriptions, reports, staff, teleconsultations, users,
};

pub const GENDERS: &[&str] = &["male", "female", "other"];
pub const STAFF_ROLES: &[&str] = &["doctor", "nurse", "technician", "admin"];
pub const USER_ROLES: &[&str] = &["admin", "doctor", "nurse", "technician", "patient"];
pub const URGENCIES: &[&str] = &["low", "medium", "high"];

pub const DEFAULT_APPOINTMENT_STATUS: &str = "Agendado";
pub const TELECONSULTATION_APPOINTMENT_TYPE: &str = "Teleconsulta";
pub const DEFAULT_TELECONSULTATION_STATUS: &str = "scheduled";

// Current UTC wall-clock time, as stored in the database
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub avatar: Option<String>,
    #[serde(serialize_with = "utc_timestamp::serialize")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "utc_timestamp::serialize")]
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub avatar: Option<String>,
}

// ---------------------------------------------------------------------------
// Patients
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable)]
#[diesel(table_name = patients)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Patient {
    pub id: i32,
    pub user_id: Option<i32>,
    pub full_name: String,
    pub cpf: String,
    pub birth_date: NaiveDate,
    pub gender: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub avatar: Option<String>,
    #[serde(serialize_with = "utc_timestamp::serialize")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "utc_timestamp::serialize")]
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize, Validate, Insertable)]
#[diesel(table_name = patients)]
pub struct NewPatient {
    #[serde(skip_deserializing)]
    pub user_id: Option<i32>,
    #[validate(length(min = 3, message = "full_name must have at least 3 characters"))]
    pub full_name: String,
    #[validate(custom = "validate_cpf")]
    pub cpf: String,
    #[serde(deserialize_with = "flexible_date::deserialize")]
    pub birth_date: NaiveDate,
    #[validate(custom = "validate_gender")]
    pub gender: String,
    #[validate(email(message = "invalid email"))]
    #[serde(default, deserialize_with = "empty_as_none")]
    pub email: Option<String>,
    #[validate(length(min = 10, message = "invalid phone"))]
    #[serde(default, deserialize_with = "empty_as_none")]
    pub phone: Option<String>,
    #[validate(length(min = 10, message = "address is too short"))]
    #[serde(default, deserialize_with = "empty_as_none")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, AsChangeset)]
#[diesel(table_name = patients)]
pub struct UpdatePatient {
    #[validate(length(min = 3, message = "full_name must have at least 3 characters"))]
    pub full_name: Option<String>,
    #[validate(custom = "validate_cpf")]
    pub cpf: Option<String>,
    #[serde(default, deserialize_with = "flexible_date::deserialize_option")]
    pub birth_date: Option<NaiveDate>,
    #[validate(custom = "validate_gender")]
    pub gender: Option<String>,
    #[validate(email(message = "invalid email"))]
    #[serde(default, deserialize_with = "empty_as_none")]
    pub email: Option<String>,
    #[validate(length(min = 10, message = "invalid phone"))]
    #[serde(default, deserialize_with = "empty_as_none")]
    pub phone: Option<String>,
    #[validate(length(min = 10, message = "address is too short"))]
    #[serde(default, deserialize_with = "empty_as_none")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientWithAppointments {
    #[serde(flatten)]
    pub patient: Patient,
    pub appointments: Vec<AppointmentWithDoctor>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientDetails {
    #[serde(flatten)]
    pub patient: Patient,
    pub exams: Vec<Exam>,
    pub allergies: Vec<Allergy>,
    pub chronic_conditions: Vec<ChronicCondition>,
    pub medications: Vec<Medication>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable)]
#[diesel(table_name = patients)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PatientSummary {
    pub id: i32,
    pub full_name: String,
}

impl From<&Patient> for PatientSummary {
    fn from(patient: &Patient) -> Self {
        Self { id: patient.id, full_name: patient.full_name.clone() }
    }
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = allergies)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Allergy {
    pub id: i32,
    pub patient_id: i32,
    pub allergy: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = allergies)]
pub struct NewAllergy {
    pub patient_id: i32,
    pub allergy: String,
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = chronic_conditions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ChronicCondition {
    pub id: i32,
    pub patient_id: i32,
    pub condition: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = chronic_conditions)]
pub struct NewChronicCondition {
    pub patient_id: i32,
    pub condition: String,
}

// ---------------------------------------------------------------------------
// Staff
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable)]
#[diesel(table_name = staff)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Staff {
    pub id: i32,
    pub user_id: Option<i32>,
    pub full_name: String,
    pub registration_number: String,
    pub role: String,
    pub specialization: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub avatar: Option<String>,
    pub available_schedule: Option<serde_json::Value>,
    #[serde(serialize_with = "utc_timestamp::serialize")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "utc_timestamp::serialize")]
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize, Validate, Insertable)]
#[diesel(table_name = staff)]
pub struct NewStaff {
    #[serde(skip_deserializing)]
    pub user_id: Option<i32>,
    #[validate(length(min = 3, message = "full_name must have at least 3 characters"))]
    pub full_name: String,
    #[validate(length(min = 4, message = "invalid registration_number"))]
    pub registration_number: String,
    #[validate(custom = "validate_staff_role")]
    pub role: String,
    #[validate(length(min = 3, message = "invalid specialization"))]
    #[serde(default, deserialize_with = "empty_as_none")]
    pub specialization: Option<String>,
    #[validate(email(message = "invalid email"))]
    pub email: String,
    #[validate(length(min = 10, message = "invalid phone"))]
    #[serde(default, deserialize_with = "empty_as_none")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "flexible_date::deserialize_option")]
    pub birth_date: Option<NaiveDate>,
    #[validate(custom = "validate_gender")]
    #[serde(default, deserialize_with = "empty_as_none")]
    pub gender: Option<String>,
    #[validate(length(min = 3, message = "invalid address"))]
    #[serde(default, deserialize_with = "empty_as_none")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub avatar: Option<String>,
    #[validate(custom = "validate_schedule")]
    pub available_schedule: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, AsChangeset)]
#[diesel(table_name = staff)]
pub struct UpdateStaff {
    #[validate(length(min = 3, message = "full_name must have at least 3 characters"))]
    pub full_name: Option<String>,
    #[validate(length(min = 4, message = "invalid registration_number"))]
    pub registration_number: Option<String>,
    #[validate(custom = "validate_staff_role")]
    pub role: Option<String>,
    #[validate(length(min = 3, message = "invalid specialization"))]
    #[serde(default, deserialize_with = "empty_as_none")]
    pub specialization: Option<String>,
    #[validate(email(message = "invalid email"))]
    pub email: Option<String>,
    #[validate(length(min = 10, message = "invalid phone"))]
    #[serde(default, deserialize_with = "empty_as_none")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "flexible_date::deserialize_option")]
    pub birth_date: Option<NaiveDate>,
    #[validate(custom = "validate_gender")]
    #[serde(default, deserialize_with = "empty_as_none")]
    pub gender: Option<String>,
    #[validate(length(min = 3, message = "invalid address"))]
    #[serde(default, deserialize_with = "empty_as_none")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub avatar: Option<String>,
    #[validate(custom = "validate_schedule")]
    pub available_schedule: Option<serde_json::Value>,
}

/// One weekly availability window of a staff member.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleSlot {
    pub day: u8,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable)]
#[diesel(table_name = staff)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DoctorSummary {
    pub id: i32,
    pub full_name: String,
    pub specialization: Option<String>,
}

impl From<&Staff> for DoctorSummary {
    fn from(doctor: &Staff) -> Self {
        Self {
            id: doctor.id,
            full_name: doctor.full_name.clone(),
            specialization: doctor.specialization.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Appointments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable)]
#[diesel(table_name = appointments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Appointment {
    pub id: i32,
    pub patient_id: i32,
    pub doctor_id: i32,
    pub doctor_name: String,
    #[serde(serialize_with = "utc_timestamp::serialize")]
    pub date: NaiveDateTime,
    pub time: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub notes: Option<String>,
    #[serde(serialize_with = "utc_timestamp::serialize")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "utc_timestamp::serialize")]
    pub updated_at: NaiveDateTime,
}

// Body of POST /api/appointments
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewAppointment {
    #[serde(rename = "patientId", alias = "patient_id")]
    pub patient_id: i32,
    #[serde(rename = "doctorId", alias = "doctor_id")]
    pub doctor_id: i32,
    #[serde(deserialize_with = "flexible_datetime::deserialize")]
    pub date: NaiveDateTime,
    #[validate(custom = "validate_clock_time")]
    pub time: String,
    #[serde(rename = "type")]
    #[validate(length(min = 1, message = "type is required"))]
    pub kind: String,
    pub status: Option<String>,
    #[validate(length(max = 1000, message = "notes must have at most 1000 characters"))]
    pub notes: Option<String>,
}

impl NewAppointment {
    pub fn into_record(self, doctor_name: String) -> AppointmentRecord {
        AppointmentRecord {
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            doctor_name,
            date: self.date,
            time: self.time,
            kind: self.kind,
            status: self.status.unwrap_or_else(|| DEFAULT_APPOINTMENT_STATUS.to_string()),
            notes: self.notes,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = appointments)]
pub struct AppointmentRecord {
    pub patient_id: i32,
    pub doctor_id: i32,
    pub doctor_name: String,
    pub date: NaiveDateTime,
    pub time: String,
    pub kind: String,
    pub status: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, AsChangeset)]
#[diesel(table_name = appointments)]
pub struct UpdateAppointment {
    #[serde(default, rename = "patientId", alias = "patient_id")]
    pub patient_id: Option<i32>,
    #[serde(default, rename = "doctorId", alias = "doctor_id")]
    pub doctor_id: Option<i32>,
    // Filled from the doctor record when doctor_id changes
    #[serde(skip_deserializing)]
    pub doctor_name: Option<String>,
    #[serde(default, deserialize_with = "flexible_datetime::deserialize_option")]
    pub date: Option<NaiveDateTime>,
    #[validate(custom = "validate_clock_time")]
    pub time: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    #[validate(length(max = 1000, message = "notes must have at most 1000 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentWithDoctor {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub doctor: Staff,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentListing {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient: PatientSummary,
    pub doctor: DoctorSummary,
}

// ---------------------------------------------------------------------------
// Teleconsultations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable)]
#[diesel(table_name = teleconsultations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Teleconsultation {
    pub id: i32,
    pub patient_id: i32,
    pub doctor_id: i32,
    #[serde(serialize_with = "utc_timestamp::serialize")]
    pub date: NaiveDateTime,
    pub notes: Option<String>,
    pub video_link: Option<String>,
    pub status: String,
    #[serde(serialize_with = "utc_timestamp::serialize")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "utc_timestamp::serialize")]
    pub updated_at: NaiveDateTime,
}

// Body of POST /api/telemedicine
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewTeleconsultation {
    #[serde(rename = "patientId", alias = "patient_id")]
    pub patient_id: i32,
    #[serde(rename = "doctorId", alias = "doctor_id")]
    pub doctor_id: i32,
    #[serde(deserialize_with = "flexible_datetime::deserialize")]
    pub date: NaiveDateTime,
    #[validate(length(max = 1000, message = "notes must have at most 1000 characters"))]
    pub notes: Option<String>,
    pub video_link: Option<String>,
}

impl NewTeleconsultation {
    // Splits the request into the teleconsultation row and its companion appointment
    pub fn into_records(self, doctor_name: String) -> (TeleconsultationRecord, AppointmentRecord) {
        let appointment = AppointmentRecord {
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            doctor_name,
            date: self.date,
            time: self.date.format("%H:%M").to_string(),
            kind: TELECONSULTATION_APPOINTMENT_TYPE.to_string(),
            status: DEFAULT_APPOINTMENT_STATUS.to_string(),
            notes: None,
        };
        let teleconsultation = TeleconsultationRecord {
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            date: self.date,
            notes: self.notes,
            video_link: self.video_link,
            status: DEFAULT_TELECONSULTATION_STATUS.to_string(),
        };
        (teleconsultation, appointment)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = teleconsultations)]
pub struct TeleconsultationRecord {
    pub patient_id: i32,
    pub doctor_id: i32,
    pub date: NaiveDateTime,
    pub notes: Option<String>,
    pub video_link: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, AsChangeset)]
#[diesel(table_name = teleconsultations)]
pub struct UpdateTeleconsultation {
    #[serde(default, rename = "patientId", alias = "patient_id")]
    pub patient_id: Option<i32>,
    #[serde(default, rename = "doctorId", alias = "doctor_id")]
    pub doctor_id: Option<i32>,
    #[serde(default, deserialize_with = "flexible_datetime::deserialize_option")]
    pub date: Option<NaiveDateTime>,
    #[validate(length(max = 1000, message = "notes must have at most 1000 characters"))]
    pub notes: Option<String>,
    pub video_link: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeleconsultationListing {
    #[serde(flatten)]
    pub teleconsultation: Teleconsultation,
    pub patient: Patient,
    pub doctor: Staff,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduledTeleconsultation {
    pub message: String,
    pub teleconsultation: Teleconsultation,
    pub appointment: Appointment,
}

// ---------------------------------------------------------------------------
// Medications & prescriptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable)]
#[diesel(table_name = medications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Medication {
    pub id: i32,
    pub name: String,
    pub dosage: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, Insertable)]
#[diesel(table_name = medications)]
pub struct NewMedication {
    #[validate(length(min = 3, message = "medication name is required"))]
    pub name: String,
    pub dosage: Option<String>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = patient_medications)]
pub struct NewPatientMedication {
    pub patient_id: i32,
    pub medication_id: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable)]
#[diesel(table_name = prescriptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Prescription {
    pub id: i32,
    pub patient_id: i32,
    pub doctor_id: Option<i32>,
    pub medication_id: i32,
    pub dosage: Option<String>,
    pub instructions: Option<String>,
    #[serde(serialize_with = "utc_timestamp::serialize")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "utc_timestamp::serialize")]
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize, Validate, Insertable)]
#[diesel(table_name = prescriptions)]
pub struct NewPrescription {
    pub patient_id: i32,
    pub doctor_id: Option<i32>,
    pub medication_id: i32,
    pub dosage: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, AsChangeset)]
#[diesel(table_name = prescriptions)]
pub struct UpdatePrescription {
    pub patient_id: Option<i32>,
    pub doctor_id: Option<i32>,
    pub medication_id: Option<i32>,
    pub dosage: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NameRef {
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedicationRef {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrescriptionListing {
    #[serde(flatten)]
    pub prescription: Prescription,
    pub patient: NameRef,
    pub doctor: Option<NameRef>,
    pub medication: MedicationRef,
}

// ---------------------------------------------------------------------------
// Exams
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable)]
#[diesel(table_name = exams)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Exam {
    pub id: i32,
    pub patient_id: i32,
    pub exam_type: String,
    pub urgency: String,
    pub reason: Option<String>,
    #[serde(serialize_with = "utc_timestamp::serialize_option")]
    pub scheduled_date: Option<NaiveDateTime>,
    pub fasting_required: bool,
    pub special_instructions: Option<String>,
    pub result: Option<String>,
    #[serde(serialize_with = "utc_timestamp::serialize")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "utc_timestamp::serialize")]
    pub updated_at: NaiveDateTime,
}

fn default_urgency() -> String {
    URGENCIES[0].to_string()
}

#[derive(Debug, Clone, Deserialize, Validate, Insertable)]
#[diesel(table_name = exams)]
pub struct NewExam {
    pub patient_id: i32,
    #[validate(length(min = 1, message = "exam_type is required"))]
    pub exam_type: String,
    #[serde(default = "default_urgency")]
    #[validate(custom = "validate_urgency")]
    pub urgency: String,
    pub reason: Option<String>,
    #[serde(default, deserialize_with = "flexible_datetime::deserialize_option")]
    pub scheduled_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub fasting_required: bool,
    pub special_instructions: Option<String>,
    pub result: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, AsChangeset)]
#[diesel(table_name = exams)]
pub struct UpdateExam {
    pub patient_id: Option<i32>,
    #[validate(length(min = 1, message = "exam_type is required"))]
    pub exam_type: Option<String>,
    #[validate(custom = "validate_urgency")]
    pub urgency: Option<String>,
    pub reason: Option<String>,
    #[serde(default, deserialize_with = "flexible_datetime::deserialize_option")]
    pub scheduled_date: Option<NaiveDateTime>,
    pub fasting_required: Option<bool>,
    pub special_instructions: Option<String>,
    pub result: Option<String>,
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable)]
#[diesel(table_name = reports)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Report {
    pub id: i32,
    pub title: String,
    pub content: String,
    #[serde(serialize_with = "utc_timestamp::serialize")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "utc_timestamp::serialize")]
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize, Validate, Insertable)]
#[diesel(table_name = reports)]
pub struct NewReport {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, AsChangeset)]
#[diesel(table_name = reports)]
pub struct UpdateReport {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: Option<String>,
    pub content: Option<String>,
}

// ---------------------------------------------------------------------------
// Field validators
// ---------------------------------------------------------------------------

fn one_of(value: &str, allowed: &[&str], code: &'static str) -> Result<(), ValidationError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        let mut err = ValidationError::new(code);
        err.message = Some(format!("must be one of: {}", allowed.join(", ")).into());
        Err(err)
    }
}

// CPF in the 000.000.000-00 layout
pub fn validate_cpf(cpf: &str) -> Result<(), ValidationError> {
    let bytes = cpf.as_bytes();
    let well_formed = bytes.len() == 14
        && bytes.iter().enumerate().all(|(i, b)| match i {
            3 | 7 => *b == b'.',
            11 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    if well_formed {
        Ok(())
    } else {
        let mut err = ValidationError::new("cpf");
        err.message = Some("cpf must be formatted as 000.000.000-00".into());
        Err(err)
    }
}

pub fn validate_gender(gender: &str) -> Result<(), ValidationError> {
    one_of(gender, GENDERS, "gender")
}

pub fn validate_staff_role(role: &str) -> Result<(), ValidationError> {
    one_of(role, STAFF_ROLES, "role")
}

pub fn validate_urgency(urgency: &str) -> Result<(), ValidationError> {
    one_of(urgency, URGENCIES, "urgency")
}

pub fn validate_clock_time(time: &str) -> Result<(), ValidationError> {
    match chrono::NaiveTime::parse_from_str(time, "%H:%M") {
        Ok(_) => Ok(()),
        Err(_) => {
            let mut err = ValidationError::new("time");
            err.message = Some("time must be formatted as HH:MM".into());
            Err(err)
        }
    }
}

pub fn validate_schedule(schedule: &serde_json::Value) -> Result<(), ValidationError> {
    let invalid = |msg: &'static str| {
        let mut err = ValidationError::new("available_schedule");
        err.message = Some(msg.into());
        err
    };
    let slots: Vec<ScheduleSlot> = serde_json::from_value(schedule.clone())
        .map_err(|_| invalid("available_schedule must be a list of {day, start, end}"))?;
    for slot in &slots {
        if slot.day > 6 {
            return Err(invalid("schedule day must be between 0 and 6"));
        }
        validate_clock_time(&slot.start)?;
        validate_clock_time(&slot.end)?;
    }
    Ok(())
}

/// Accepts RFC 3339 timestamps, `YYYY-MM-DDTHH:MM[:SS]` and bare `YYYY-MM-DD` dates.
pub mod flexible_datetime {
    use chrono::{DateTime, NaiveDate, NaiveDateTime};
    use serde::{Deserialize, Deserializer, de::Error};

    pub fn parse(raw: &str) -> Option<NaiveDateTime> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.naive_utc());
        }
        for layout in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
            if let Ok(ts) = NaiveDateTime::parse_from_str(raw, layout) {
                return Some(ts);
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid date: {raw}")))
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match super::non_blank(Option::<String>::deserialize(deserializer)?) {
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid date: {raw}"))),
            None => Ok(None),
        }
    }
}

/// Calendar dates sent either as `YYYY-MM-DD` or as a full RFC 3339 timestamp.
/// Timestamps keep their UTC date.
pub mod flexible_date {
    use chrono::{DateTime, NaiveDate};
    use serde::{Deserialize, Deserializer, de::Error};

    pub fn parse(raw: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|ts| ts.naive_utc().date()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid date: {raw}")))
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match super::non_blank(Option::<String>::deserialize(deserializer)?) {
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid date: {raw}"))),
            None => Ok(None),
        }
    }
}

/// Writes stored naive timestamps as UTC RFC 3339 with a trailing `Z`.
pub mod utc_timestamp {
    use chrono::{NaiveDateTime, SecondsFormat};
    use serde::Serializer;

    pub fn format(ts: &NaiveDateTime) -> String {
        ts.and_utc().to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(ts))
    }

    pub fn serialize_option<S>(ts: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match ts {
            Some(ts) => serializer.serialize_str(&format(ts)),
            None => serializer.serialize_none(),
        }
    }
}

fn non_blank(raw: Option<String>) -> Option<String> {
    raw.filter(|value| !value.trim().is_empty())
}

// Forms post untouched optional inputs as "", which counts as absent
pub fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(non_blank(Option::<String>::deserialize(deserializer)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn patient_request(cpf: &str, gender: &str) -> NewPatient {
        NewPatient {
            user_id: None,
            full_name: "Maria Silva".into(),
            cpf: cpf.into(),
            birth_date: NaiveDate::from_ymd_opt(1985, 3, 15).unwrap(),
            gender: gender.into(),
            email: Some("maria.silva@email.com".into()),
            phone: None,
            address: None,
            avatar: None,
        }
    }

    #[test_case("123.456.789-00", true ; "formatted cpf")]
    #[test_case("12345678900", false ; "digits only")]
    #[test_case("123.456.789/00", false ; "wrong separator")]
    #[test_case("123.456.78a-00", false ; "letter")]
    fn cpf_layout(cpf: &str, ok: bool) {
        assert_eq!(validate_cpf(cpf).is_ok(), ok);
    }

    #[test_case("09:00", true)]
    #[test_case("14:00:00", false ; "seconds")]
    #[test_case("9h", false)]
    #[test_case("25:00", false)]
    fn clock_time(time: &str, ok: bool) {
        assert_eq!(validate_clock_time(time).is_ok(), ok);
    }

    #[test]
    fn new_patient_rules() {
        assert!(patient_request("123.456.789-00", "female").validate().is_ok());

        let errors = patient_request("123", "unknown").validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("cpf"));
        assert!(fields.contains_key("gender"));
    }

    #[test]
    fn partial_update_checks_only_present_fields() {
        let changes = UpdatePatient { phone: Some("(11) 91234-5678".into()), ..Default::default() };
        assert!(changes.validate().is_ok());

        let changes = UpdatePatient { email: Some("not-an-email".into()), ..Default::default() };
        assert!(changes.validate().is_err());
    }

    #[test]
    fn schedule_days_are_bounded() {
        let ok = serde_json::json!([{ "day": 1, "start": "08:00", "end": "12:00" }]);
        assert!(validate_schedule(&ok).is_ok());

        let bad_day = serde_json::json!([{ "day": 7, "start": "08:00", "end": "12:00" }]);
        assert!(validate_schedule(&bad_day).is_err());

        let not_a_list = serde_json::json!({ "day": 1 });
        assert!(validate_schedule(&not_a_list).is_err());
    }

    #[test]
    fn appointment_request_uses_camel_case_ids() {
        let body = serde_json::json!({
            "patientId": 1,
            "doctorId": 2,
            "date": "2024-06-15",
            "time": "09:00",
            "type": "Consulta"
        });
        let request: NewAppointment = serde_json::from_value(body).unwrap();
        let record = request.into_record("Dr. Ana Pereira".into());
        assert_eq!(record.patient_id, 1);
        assert_eq!(record.doctor_id, 2);
        assert_eq!(record.status, DEFAULT_APPOINTMENT_STATUS);
        assert_eq!(record.date.format("%Y-%m-%d %H:%M").to_string(), "2024-06-15 00:00");
    }

    #[test]
    fn teleconsultation_spawns_companion_appointment() {
        let body = serde_json::json!({
            "patientId": 3,
            "doctorId": 4,
            "date": "2024-06-15T14:30:00Z",
            "notes": "follow-up"
        });
        let request: NewTeleconsultation = serde_json::from_value(body).unwrap();
        let (tele, appointment) = request.into_records("Dr. Ana".into());
        assert_eq!(tele.status, DEFAULT_TELECONSULTATION_STATUS);
        assert_eq!(appointment.kind, TELECONSULTATION_APPOINTMENT_TYPE);
        assert_eq!(appointment.time, "14:30");
        assert_eq!(appointment.date, tele.date);
    }

    #[test_case("2024-06-15T14:30:00-03:00", "2024-06-15 17:30" ; "rfc3339 offset")]
    #[test_case("2024-06-15T14:30", "2024-06-15 14:30" ; "datetime-local")]
    #[test_case("2024-06-15", "2024-06-15 00:00" ; "bare date")]
    fn flexible_dates(raw: &str, expected: &str) {
        let parsed = flexible_datetime::parse(raw).unwrap();
        assert_eq!(parsed.format("%Y-%m-%d %H:%M").to_string(), expected);
    }

    #[test_case("1985-03-15" ; "plain date")]
    #[test_case("1985-03-15T00:00:00.000Z" ; "javascript iso string")]
    #[test_case("1985-03-15T01:00:00+01:00" ; "offset keeps utc date")]
    fn birth_dates_accept_timestamps(raw: &str) {
        assert_eq!(flexible_date::parse(raw), NaiveDate::from_ymd_opt(1985, 3, 15));
    }

    #[test]
    fn blank_optional_fields_are_absent() {
        let body = serde_json::json!({
            "full_name": "Maria Silva",
            "cpf": "123.456.789-00",
            "birth_date": "1985-03-15T00:00:00.000Z",
            "gender": "female",
            "email": "",
            "phone": "",
            "address": "  "
        });
        let request: NewPatient = serde_json::from_value(body).unwrap();
        assert_eq!(request.email, None);
        assert_eq!(request.phone, None);
        assert_eq!(request.address, None);
        assert!(request.validate().is_ok());

        let changes: UpdateStaff =
            serde_json::from_value(serde_json::json!({ "specialization": "", "birth_date": "" })).unwrap();
        assert_eq!(changes.specialization, None);
        assert_eq!(changes.birth_date, None);
    }

    #[test]
    fn timestamps_serialize_as_utc() {
        let stamp = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap().and_hms_opt(10, 30, 0).unwrap();
        let report = Report {
            id: 1,
            title: "Monthly".into(),
            content: "ok".into(),
            created_at: stamp,
            updated_at: stamp,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["created_at"], "2024-07-01T10:30:00.000Z");

        let exam = Exam {
            id: 1,
            patient_id: 1,
            exam_type: "Hemograma".into(),
            urgency: "low".into(),
            reason: None,
            scheduled_date: None,
            fasting_required: false,
            special_instructions: None,
            result: None,
            created_at: stamp,
            updated_at: stamp,
        };
        assert!(serde_json::to_value(&exam).unwrap()["scheduled_date"].is_null());
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let user = User {
            id: 1,
            name: "Admin".into(),
            email: "admin@vidaplus.com".into(),
            password_hash: "secret-hash".into(),
            role: "admin".into(),
            avatar: None,
            created_at: now(),
            updated_at: now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
    }
}
