//! Persistence seam between the HTTP handlers and the database.
//!
//! Handlers only see [`Store`]. [`PgStore`] backs it with PostgreSQL through
//! diesel; [`MemoryStore`] keeps everything in process and enforces the same
//! uniqueness and reference rules, which is what the HTTP tests and seed tests
//! run against.
//!
//! All methods are blocking. Call them from `web::block` inside handlers.

use chrono::NaiveDate;

use crate::models::*;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{DbPool, PgStore, build_pool, run_migrations};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidReference(String),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Profile created together with a new user account.
#[derive(Debug, Clone)]
pub enum AccountProfile {
    Patient(NewPatient),
    Staff(NewStaff),
}

pub trait Store: Send + Sync + 'static {
    // Users

    /// Creates the user and its profile atomically; the profile's `user_id` is
    /// filled with the new user's id.
    fn create_account(&self, user: NewUser, profile: AccountProfile) -> StoreResult<User>;
    /// Creates a bare user without a profile (seeded administrators).
    fn create_user(&self, user: NewUser) -> StoreResult<User>;
    fn find_user(&self, id: i32) -> StoreResult<User>;
    fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    // Patients
    fn list_patients(&self) -> StoreResult<Vec<PatientWithAppointments>>;
    fn count_patients(&self) -> StoreResult<usize>;
    fn get_patient(&self, id: i32) -> StoreResult<PatientDetails>;
    fn find_patient_by_cpf(&self, cpf: &str) -> StoreResult<Option<Patient>>;
    fn create_patient(&self, patient: NewPatient) -> StoreResult<Patient>;
    fn update_patient(&self, id: i32, changes: UpdatePatient) -> StoreResult<Patient>;
    fn delete_patient(&self, id: i32) -> StoreResult<()>;
    fn add_allergy(&self, allergy: NewAllergy) -> StoreResult<Allergy>;
    fn add_chronic_condition(&self, condition: NewChronicCondition) -> StoreResult<ChronicCondition>;
    fn add_patient_medication(&self, link: NewPatientMedication) -> StoreResult<()>;

    // Staff
    fn list_staff(&self) -> StoreResult<Vec<Staff>>;
    fn get_staff(&self, id: i32) -> StoreResult<Staff>;
    fn get_staff_by_user(&self, user_id: i32) -> StoreResult<Staff>;
    fn create_staff(&self, member: NewStaff) -> StoreResult<Staff>;
    fn update_staff(&self, id: i32, changes: UpdateStaff) -> StoreResult<Staff>;
    fn delete_staff(&self, id: i32) -> StoreResult<()>;

    // Appointments
    fn list_appointments(&self) -> StoreResult<Vec<AppointmentListing>>;
    fn get_appointment(&self, id: i32) -> StoreResult<Appointment>;
    fn create_appointment(&self, appointment: AppointmentRecord) -> StoreResult<Appointment>;
    fn update_appointment(&self, id: i32, changes: UpdateAppointment) -> StoreResult<Appointment>;
    fn delete_appointment(&self, id: i32) -> StoreResult<()>;

    // Teleconsultations

    /// Teleconsultations ordered by date, optionally restricted to one UTC day.
    fn list_teleconsultations(&self, day: Option<NaiveDate>) -> StoreResult<Vec<TeleconsultationListing>>;
    fn get_teleconsultation(&self, id: i32) -> StoreResult<Teleconsultation>;
    /// Inserts the teleconsultation and its companion appointment in one transaction.
    fn create_teleconsultation(
        &self,
        teleconsultation: TeleconsultationRecord,
        appointment: AppointmentRecord,
    ) -> StoreResult<(Teleconsultation, Appointment)>;
    fn update_teleconsultation(&self, id: i32, changes: UpdateTeleconsultation) -> StoreResult<Teleconsultation>;
    fn delete_teleconsultation(&self, id: i32) -> StoreResult<()>;

    // Medications
    fn list_medications(&self) -> StoreResult<Vec<Medication>>;
    fn get_medication(&self, id: i32) -> StoreResult<Medication>;
    fn create_medication(&self, medication: NewMedication) -> StoreResult<Medication>;

    // Prescriptions
    fn list_prescriptions(&self) -> StoreResult<Vec<PrescriptionListing>>;
    fn count_prescriptions(&self) -> StoreResult<usize>;
    fn get_prescription(&self, id: i32) -> StoreResult<PrescriptionListing>;
    fn create_prescription(&self, prescription: NewPrescription) -> StoreResult<Prescription>;
    fn update_prescription(&self, id: i32, changes: UpdatePrescription) -> StoreResult<Prescription>;
    fn delete_prescription(&self, id: i32) -> StoreResult<()>;

    // Exams
    fn list_exams(&self) -> StoreResult<Vec<Exam>>;
    fn count_exams(&self) -> StoreResult<usize>;
    fn get_exam(&self, id: i32) -> StoreResult<Exam>;
    fn create_exam(&self, exam: NewExam) -> StoreResult<Exam>;
    fn update_exam(&self, id: i32, changes: UpdateExam) -> StoreResult<Exam>;
    fn delete_exam(&self, id: i32) -> StoreResult<()>;

    // Reports
    fn list_reports(&self) -> StoreResult<Vec<Report>>;
    fn get_report(&self, id: i32) -> StoreResult<Report>;
    fn create_report(&self, report: NewReport) -> StoreResult<Report>;
    fn update_report(&self, id: i32, changes: UpdateReport) -> StoreResult<Report>;
    fn delete_report(&self, id: i32) -> StoreResult<()>;
}
