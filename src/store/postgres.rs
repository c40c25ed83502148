use std::collections::HashMap;

use anyhow::{Context, anyhow};
use chrono::{Days, NaiveDate};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, PooledConnection};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

use super::{AccountProfile, Store, StoreError, StoreResult};
use crate::models::*;
use crate::schema::{
    allergies, appointments, chronic_conditions, exams, medications, patient_medications,
    patients, prescriptions, reports, staff, teleconsultations, users,
};

// Database connection pool type
pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub fn build_pool(database_url: &str, max_connections: u32) -> anyhow::Result<DbPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    r2d2::Pool::builder()
        .max_size(max_connections)
        .build(manager)
        .context("failed to create database pool")
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let mut pooled = pool.get().context("couldn't get db connection from pool")?;
    let conn: &mut PgConnection = &mut pooled;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow!("failed to run migrations: {e}"))?;
    tracing::info!(applied = applied.len(), "database migrations up to date");
    Ok(())
}

// Translates driver errors into the store's vocabulary
fn classify(entity: &'static str) -> impl Fn(DieselError) -> StoreError {
    move |err| match err {
        DieselError::NotFound => StoreError::NotFound(entity),
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            let message = match info.constraint_name() {
                Some("users_email_key") => "Email already registered".to_string(),
                Some("patients_cpf_key") => "CPF already registered".to_string(),
                Some("patients_user_id_key") | Some("staff_user_id_key") => {
                    "User already has a profile".to_string()
                }
                _ => format!("{entity} already exists"),
            };
            StoreError::Conflict(message)
        }
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
            StoreError::InvalidReference(format!(
                "{entity} references a record that does not exist ({})",
                info.constraint_name().unwrap_or("foreign key")
            ))
        }
        other => StoreError::Database(other),
    }
}

fn expect_deleted(rows: usize, entity: &'static str) -> StoreResult<()> {
    if rows == 0 { Err(StoreError::NotFound(entity)) } else { Ok(()) }
}

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> StoreResult<PooledConnection<ConnectionManager<PgConnection>>> {
        self.pool.get().map_err(|e| StoreError::Pool(e.to_string()))
    }

    fn load_prescriptions(
        conn: &mut PgConnection,
        only: Option<i32>,
    ) -> StoreResult<Vec<PrescriptionListing>> {
        let mut query = prescriptions::table
            .inner_join(patients::table)
            .left_join(staff::table)
            .inner_join(medications::table)
            .select((
                Prescription::as_select(),
                patients::full_name,
                staff::full_name.nullable(),
                medications::name,
            ))
            .order(prescriptions::id.asc())
            .into_boxed();
        if let Some(id) = only {
            query = query.filter(prescriptions::id.eq(id));
        }
        let rows: Vec<(Prescription, String, Option<String>, String)> = query.load(conn)?;
        Ok(rows
            .into_iter()
            .map(|(prescription, patient, doctor, medication)| PrescriptionListing {
                prescription,
                patient: NameRef { full_name: patient },
                doctor: doctor.map(|full_name| NameRef { full_name }),
                medication: MedicationRef { name: medication },
            })
            .collect())
    }
}

impl Store for PgStore {
    fn create_account(&self, user: NewUser, profile: AccountProfile) -> StoreResult<User> {
        let mut conn = self.conn()?;
        conn.transaction::<_, StoreError, _>(|conn| {
            let created: User = diesel::insert_into(users::table)
                .values(&user)
                .returning(User::as_returning())
                .get_result(conn)
                .map_err(classify("User"))?;
            match profile {
                AccountProfile::Patient(mut patient) => {
                    patient.user_id = Some(created.id);
                    diesel::insert_into(patients::table)
                        .values(&patient)
                        .execute(conn)
                        .map_err(classify("Patient"))?;
                }
                AccountProfile::Staff(mut member) => {
                    member.user_id = Some(created.id);
                    diesel::insert_into(staff::table)
                        .values(&member)
                        .execute(conn)
                        .map_err(classify("Staff"))?;
                }
            }
            Ok(created)
        })
    }

    fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut conn = self.conn()?;
        diesel::insert_into(users::table)
            .values(&user)
            .returning(User::as_returning())
            .get_result(&mut conn)
            .map_err(classify("User"))
    }

    fn find_user(&self, id: i32) -> StoreResult<User> {
        let mut conn = self.conn()?;
        users::table
            .find(id)
            .select(User::as_select())
            .first(&mut conn)
            .map_err(classify("User"))
    }

    fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(users::table
            .filter(users::email.eq(email))
            .select(User::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn count_patients(&self) -> StoreResult<usize> {
        let mut conn = self.conn()?;
        let total: i64 = patients::table.count().get_result(&mut conn)?;
        Ok(total as usize)
    }

    fn list_patients(&self) -> StoreResult<Vec<PatientWithAppointments>> {
        let mut conn = self.conn()?;
        let patients: Vec<Patient> = patients::table
            .order(patients::id.asc())
            .select(Patient::as_select())
            .load(&mut conn)?;
        let rows: Vec<(Appointment, Staff)> = appointments::table
            .inner_join(staff::table)
            .order(appointments::date.asc())
            .select((Appointment::as_select(), Staff::as_select()))
            .load(&mut conn)?;

        let mut by_patient: HashMap<i32, Vec<AppointmentWithDoctor>> = HashMap::new();
        for (appointment, doctor) in rows {
            by_patient
                .entry(appointment.patient_id)
                .or_default()
                .push(AppointmentWithDoctor { appointment, doctor });
        }
        Ok(patients
            .into_iter()
            .map(|patient| PatientWithAppointments {
                appointments: by_patient.remove(&patient.id).unwrap_or_default(),
                patient,
            })
            .collect())
    }

    fn get_patient(&self, id: i32) -> StoreResult<PatientDetails> {
        let mut conn = self.conn()?;
        let patient = patients::table
            .find(id)
            .select(Patient::as_select())
            .first(&mut conn)
            .map_err(classify("Patient"))?;
        let exams = exams::table
            .filter(exams::patient_id.eq(id))
            .order(exams::id.asc())
            .select(Exam::as_select())
            .load(&mut conn)?;
        let allergies = allergies::table
            .filter(allergies::patient_id.eq(id))
            .select(Allergy::as_select())
            .load(&mut conn)?;
        let chronic_conditions = chronic_conditions::table
            .filter(chronic_conditions::patient_id.eq(id))
            .select(ChronicCondition::as_select())
            .load(&mut conn)?;
        let medications = patient_medications::table
            .inner_join(medications::table)
            .filter(patient_medications::patient_id.eq(id))
            .select(Medication::as_select())
            .load(&mut conn)?;
        Ok(PatientDetails { patient, exams, allergies, chronic_conditions, medications })
    }

    fn find_patient_by_cpf(&self, cpf: &str) -> StoreResult<Option<Patient>> {
        let mut conn = self.conn()?;
        Ok(patients::table
            .filter(patients::cpf.eq(cpf))
            .select(Patient::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn create_patient(&self, patient: NewPatient) -> StoreResult<Patient> {
        let mut conn = self.conn()?;
        diesel::insert_into(patients::table)
            .values(&patient)
            .returning(Patient::as_returning())
            .get_result(&mut conn)
            .map_err(classify("Patient"))
    }

    fn update_patient(&self, id: i32, changes: UpdatePatient) -> StoreResult<Patient> {
        let mut conn = self.conn()?;
        diesel::update(patients::table.find(id))
            .set((&changes, patients::updated_at.eq(now())))
            .returning(Patient::as_returning())
            .get_result(&mut conn)
            .map_err(classify("Patient"))
    }

    fn delete_patient(&self, id: i32) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let rows = diesel::delete(patients::table.find(id)).execute(&mut conn)?;
        expect_deleted(rows, "Patient")
    }

    fn add_allergy(&self, allergy: NewAllergy) -> StoreResult<Allergy> {
        let mut conn = self.conn()?;
        diesel::insert_into(allergies::table)
            .values(&allergy)
            .returning(Allergy::as_returning())
            .get_result(&mut conn)
            .map_err(classify("Allergy"))
    }

    fn add_chronic_condition(&self, condition: NewChronicCondition) -> StoreResult<ChronicCondition> {
        let mut conn = self.conn()?;
        diesel::insert_into(chronic_conditions::table)
            .values(&condition)
            .returning(ChronicCondition::as_returning())
            .get_result(&mut conn)
            .map_err(classify("Chronic condition"))
    }

    fn add_patient_medication(&self, link: NewPatientMedication) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(patient_medications::table)
            .values(&link)
            .execute(&mut conn)
            .map_err(classify("Patient medication"))?;
        Ok(())
    }

    fn list_staff(&self) -> StoreResult<Vec<Staff>> {
        let mut conn = self.conn()?;
        Ok(staff::table
            .order(staff::id.asc())
            .select(Staff::as_select())
            .load(&mut conn)?)
    }

    fn get_staff(&self, id: i32) -> StoreResult<Staff> {
        let mut conn = self.conn()?;
        staff::table
            .find(id)
            .select(Staff::as_select())
            .first(&mut conn)
            .map_err(classify("Staff"))
    }

    fn get_staff_by_user(&self, user_id: i32) -> StoreResult<Staff> {
        let mut conn = self.conn()?;
        staff::table
            .filter(staff::user_id.eq(user_id))
            .select(Staff::as_select())
            .first(&mut conn)
            .map_err(classify("Staff"))
    }

    fn create_staff(&self, member: NewStaff) -> StoreResult<Staff> {
        let mut conn = self.conn()?;
        diesel::insert_into(staff::table)
            .values(&member)
            .returning(Staff::as_returning())
            .get_result(&mut conn)
            .map_err(classify("Staff"))
    }

    fn update_staff(&self, id: i32, changes: UpdateStaff) -> StoreResult<Staff> {
        let mut conn = self.conn()?;
        diesel::update(staff::table.find(id))
            .set((&changes, staff::updated_at.eq(now())))
            .returning(Staff::as_returning())
            .get_result(&mut conn)
            .map_err(classify("Staff"))
    }

    fn delete_staff(&self, id: i32) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let rows = diesel::delete(staff::table.find(id)).execute(&mut conn)?;
        expect_deleted(rows, "Staff")
    }

    fn list_appointments(&self) -> StoreResult<Vec<AppointmentListing>> {
        let mut conn = self.conn()?;
        let rows: Vec<(Appointment, PatientSummary, DoctorSummary)> = appointments::table
            .inner_join(patients::table)
            .inner_join(staff::table)
            .order((appointments::date.asc(), appointments::id.asc()))
            .select((
                Appointment::as_select(),
                PatientSummary::as_select(),
                DoctorSummary::as_select(),
            ))
            .load(&mut conn)?;
        Ok(rows
            .into_iter()
            .map(|(appointment, patient, doctor)| AppointmentListing { appointment, patient, doctor })
            .collect())
    }

    fn get_appointment(&self, id: i32) -> StoreResult<Appointment> {
        let mut conn = self.conn()?;
        appointments::table
            .find(id)
            .select(Appointment::as_select())
            .first(&mut conn)
            .map_err(classify("Appointment"))
    }

    fn create_appointment(&self, appointment: AppointmentRecord) -> StoreResult<Appointment> {
        let mut conn = self.conn()?;
        diesel::insert_into(appointments::table)
            .values(&appointment)
            .returning(Appointment::as_returning())
            .get_result(&mut conn)
            .map_err(classify("Appointment"))
    }

    fn update_appointment(&self, id: i32, changes: UpdateAppointment) -> StoreResult<Appointment> {
        let mut conn = self.conn()?;
        diesel::update(appointments::table.find(id))
            .set((&changes, appointments::updated_at.eq(now())))
            .returning(Appointment::as_returning())
            .get_result(&mut conn)
            .map_err(classify("Appointment"))
    }

    fn delete_appointment(&self, id: i32) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let rows = diesel::delete(appointments::table.find(id)).execute(&mut conn)?;
        expect_deleted(rows, "Appointment")
    }

    fn list_teleconsultations(&self, day: Option<NaiveDate>) -> StoreResult<Vec<TeleconsultationListing>> {
        let mut conn = self.conn()?;
        let mut query = teleconsultations::table
            .inner_join(patients::table)
            .inner_join(staff::table)
            .select((Teleconsultation::as_select(), Patient::as_select(), Staff::as_select()))
            .order((teleconsultations::date.asc(), teleconsultations::id.asc()))
            .into_boxed();
        if let Some(day) = day {
            let start = day.and_time(chrono::NaiveTime::MIN);
            let end = start + Days::new(1);
            query = query.filter(teleconsultations::date.ge(start).and(teleconsultations::date.lt(end)));
        }
        let rows: Vec<(Teleconsultation, Patient, Staff)> = query.load(&mut conn)?;
        Ok(rows
            .into_iter()
            .map(|(teleconsultation, patient, doctor)| TeleconsultationListing {
                teleconsultation,
                patient,
                doctor,
            })
            .collect())
    }

    fn get_teleconsultation(&self, id: i32) -> StoreResult<Teleconsultation> {
        let mut conn = self.conn()?;
        teleconsultations::table
            .find(id)
            .select(Teleconsultation::as_select())
            .first(&mut conn)
            .map_err(classify("Teleconsultation"))
    }

    fn create_teleconsultation(
        &self,
        teleconsultation: TeleconsultationRecord,
        appointment: AppointmentRecord,
    ) -> StoreResult<(Teleconsultation, Appointment)> {
        let mut conn = self.conn()?;
        conn.transaction::<_, StoreError, _>(|conn| {
            let tele = diesel::insert_into(teleconsultations::table)
                .values(&teleconsultation)
                .returning(Teleconsultation::as_returning())
                .get_result(conn)
                .map_err(classify("Teleconsultation"))?;
            let appointment = diesel::insert_into(appointments::table)
                .values(&appointment)
                .returning(Appointment::as_returning())
                .get_result(conn)
                .map_err(classify("Appointment"))?;
            Ok((tele, appointment))
        })
    }

    fn update_teleconsultation(&self, id: i32, changes: UpdateTeleconsultation) -> StoreResult<Teleconsultation> {
        let mut conn = self.conn()?;
        diesel::update(teleconsultations::table.find(id))
            .set((&changes, teleconsultations::updated_at.eq(now())))
            .returning(Teleconsultation::as_returning())
            .get_result(&mut conn)
            .map_err(classify("Teleconsultation"))
    }

    fn delete_teleconsultation(&self, id: i32) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let rows = diesel::delete(teleconsultations::table.find(id)).execute(&mut conn)?;
        expect_deleted(rows, "Teleconsultation")
    }

    fn list_medications(&self) -> StoreResult<Vec<Medication>> {
        let mut conn = self.conn()?;
        Ok(medications::table
            .order(medications::name.asc())
            .select(Medication::as_select())
            .load(&mut conn)?)
    }

    fn get_medication(&self, id: i32) -> StoreResult<Medication> {
        let mut conn = self.conn()?;
        medications::table
            .find(id)
            .select(Medication::as_select())
            .first(&mut conn)
            .map_err(classify("Medication"))
    }

    fn create_medication(&self, medication: NewMedication) -> StoreResult<Medication> {
        let mut conn = self.conn()?;
        diesel::insert_into(medications::table)
            .values(&medication)
            .returning(Medication::as_returning())
            .get_result(&mut conn)
            .map_err(classify("Medication"))
    }

    fn list_prescriptions(&self) -> StoreResult<Vec<PrescriptionListing>> {
        let mut conn = self.conn()?;
        Self::load_prescriptions(&mut conn, None)
    }

    fn count_prescriptions(&self) -> StoreResult<usize> {
        let mut conn = self.conn()?;
        let total: i64 = prescriptions::table.count().get_result(&mut conn)?;
        Ok(total as usize)
    }

    fn get_prescription(&self, id: i32) -> StoreResult<PrescriptionListing> {
        let mut conn = self.conn()?;
        Self::load_prescriptions(&mut conn, Some(id))?
            .into_iter()
            .next()
            .ok_or(StoreError::NotFound("Prescription"))
    }

    fn create_prescription(&self, prescription: NewPrescription) -> StoreResult<Prescription> {
        let mut conn = self.conn()?;
        diesel::insert_into(prescriptions::table)
            .values(&prescription)
            .returning(Prescription::as_returning())
            .get_result(&mut conn)
            .map_err(classify("Prescription"))
    }

    fn update_prescription(&self, id: i32, changes: UpdatePrescription) -> StoreResult<Prescription> {
        let mut conn = self.conn()?;
        diesel::update(prescriptions::table.find(id))
            .set((&changes, prescriptions::updated_at.eq(now())))
            .returning(Prescription::as_returning())
            .get_result(&mut conn)
            .map_err(classify("Prescription"))
    }

    fn delete_prescription(&self, id: i32) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let rows = diesel::delete(prescriptions::table.find(id)).execute(&mut conn)?;
        expect_deleted(rows, "Prescription")
    }

    fn list_exams(&self) -> StoreResult<Vec<Exam>> {
        let mut conn = self.conn()?;
        Ok(exams::table
            .order(exams::id.asc())
            .select(Exam::as_select())
            .load(&mut conn)?)
    }

    fn count_exams(&self) -> StoreResult<usize> {
        let mut conn = self.conn()?;
        let total: i64 = exams::table.count().get_result(&mut conn)?;
        Ok(total as usize)
    }

    fn get_exam(&self, id: i32) -> StoreResult<Exam> {
        let mut conn = self.conn()?;
        exams::table
            .find(id)
            .select(Exam::as_select())
            .first(&mut conn)
            .map_err(classify("Exam"))
    }

    fn create_exam(&self, exam: NewExam) -> StoreResult<Exam> {
        let mut conn = self.conn()?;
        diesel::insert_into(exams::table)
            .values(&exam)
            .returning(Exam::as_returning())
            .get_result(&mut conn)
            .map_err(classify("Exam"))
    }

    fn update_exam(&self, id: i32, changes: UpdateExam) -> StoreResult<Exam> {
        let mut conn = self.conn()?;
        diesel::update(exams::table.find(id))
            .set((&changes, exams::updated_at.eq(now())))
            .returning(Exam::as_returning())
            .get_result(&mut conn)
            .map_err(classify("Exam"))
    }

    fn delete_exam(&self, id: i32) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let rows = diesel::delete(exams::table.find(id)).execute(&mut conn)?;
        expect_deleted(rows, "Exam")
    }

    fn list_reports(&self) -> StoreResult<Vec<Report>> {
        let mut conn = self.conn()?;
        Ok(reports::table
            .order(reports::id.asc())
            .select(Report::as_select())
            .load(&mut conn)?)
    }

    fn get_report(&self, id: i32) -> StoreResult<Report> {
        let mut conn = self.conn()?;
        reports::table
            .find(id)
            .select(Report::as_select())
            .first(&mut conn)
            .map_err(classify("Report"))
    }

    fn create_report(&self, report: NewReport) -> StoreResult<Report> {
        let mut conn = self.conn()?;
        diesel::insert_into(reports::table)
            .values(&report)
            .returning(Report::as_returning())
            .get_result(&mut conn)
            .map_err(classify("Report"))
    }

    fn update_report(&self, id: i32, changes: UpdateReport) -> StoreResult<Report> {
        let mut conn = self.conn()?;
        diesel::update(reports::table.find(id))
            .set((&changes, reports::updated_at.eq(now())))
            .returning(Report::as_returning())
            .get_result(&mut conn)
            .map_err(classify("Report"))
    }

    fn delete_report(&self, id: i32) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let rows = diesel::delete(reports::table.find(id)).execute(&mut conn)?;
        expect_deleted(rows, "Report")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Needs a disposable PostgreSQL database: DATABASE_URL=... cargo test -- --ignored
    fn test_store() -> PgStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres tests");
        let pool = build_pool(&url, 2).expect("pool");
        run_migrations(&pool).expect("migrations");
        PgStore::new(pool)
    }

    #[test]
    #[ignore]
    fn duplicate_cpf_is_a_conflict() {
        let store = test_store();
        let cpf = format!("{:03}.{:03}.{:03}-{:02}", rand::random::<u16>() % 1000, 111, 222, 33);
        let patient = NewPatient {
            user_id: None,
            full_name: "Conflict Probe".into(),
            cpf,
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            gender: "other".into(),
            email: None,
            phone: None,
            address: None,
            avatar: None,
        };
        let created = store.create_patient(patient.clone()).expect("first insert");
        let err = store.create_patient(patient).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        store.delete_patient(created.id).expect("cleanup");
    }

    #[test]
    #[ignore]
    fn deleting_missing_row_is_not_found() {
        let store = test_store();
        let err = store.delete_exam(i32::MAX).unwrap_err();
        assert!(matches!(err, StoreError::NotFound("Exam")));
    }
}
