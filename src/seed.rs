//! Demo data for local environments.
//!
//! Every step goes through [`Store`], so the same code seeds PostgreSQL from
//! the `vidaplus-seed` binary and the in-memory store in tests. `base` and
//! `doctor_agenda` can be re-run without duplicating rows.

use anyhow::{Context, anyhow, bail};
use chrono::{Days, NaiveDate, NaiveDateTime};
use fake::Fake;
use fake::faker::internet::raw::SafeEmail;
use fake::faker::name::raw::Name;
use fake::faker::phone_number::raw::PhoneNumber;
use fake::locales::PT_BR;
use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::auth::hash_password;
use crate::models::*;
use crate::store::Store;

pub const DOCTOR_EMAIL: &str = "dr.ana@vidaplus.com";
pub const ADMIN_EMAIL: &str = "admin@vidaplus.com";
pub const DOCTOR_NAME: &str = "Dr(a). Ana Beatriz Santos";
pub const DOCTOR_REGISTRATION: &str = "CRM12345";

fn datetime(date: &str, time: &str) -> anyhow::Result<NaiveDateTime> {
    flexible_datetime::parse(&format!("{date}T{time}")).with_context(|| format!("bad seed date {date} {time}"))
}

fn ensure_user(store: &dyn Store, name: &str, email: &str, password: &str, role: &str, avatar: &str) -> anyhow::Result<User> {
    if let Some(user) = store.find_user_by_email(email)? {
        return Ok(user);
    }
    let password_hash = hash_password(password).map_err(|e| anyhow!("password hashing failed: {e}"))?;
    let user = store.create_user(NewUser {
        name: name.into(),
        email: email.into(),
        password_hash,
        role: role.into(),
        avatar: Some(avatar.into()),
    })?;
    tracing::info!(user_id = user.id, %email, "seeded user");
    Ok(user)
}

// Returns the patient and whether it was created by this call
fn ensure_patient(store: &dyn Store, patient: NewPatient) -> anyhow::Result<(Patient, bool)> {
    if let Some(existing) = store.find_patient_by_cpf(&patient.cpf)? {
        return Ok((existing, false));
    }
    let created = store.create_patient(patient)?;
    tracing::info!(patient_id = created.id, cpf = %created.cpf, "seeded patient");
    Ok((created, true))
}

fn ensure_staff(store: &dyn Store, member: NewStaff) -> anyhow::Result<Staff> {
    let existing = store
        .list_staff()?
        .into_iter()
        .find(|s| s.registration_number == member.registration_number);
    if let Some(existing) = existing {
        return Ok(existing);
    }
    let created = store.create_staff(member)?;
    tracing::info!(staff_id = created.id, registration = %created.registration_number, "seeded staff member");
    Ok(created)
}

fn ensure_medication(store: &dyn Store, name: &str, dosage: &str) -> anyhow::Result<Medication> {
    if let Some(existing) = store.list_medications()?.into_iter().find(|m| m.name == name) {
        return Ok(existing);
    }
    Ok(store.create_medication(NewMedication { name: name.into(), dosage: Some(dosage.into()) })?)
}

fn staff_member(full_name: &str, registration: &str, role: &str, email: &str, phone: &str, specialization: Option<&str>, avatar: &str) -> NewStaff {
    NewStaff {
        user_id: None,
        full_name: full_name.into(),
        registration_number: registration.into(),
        role: role.into(),
        specialization: specialization.map(Into::into),
        email: email.into(),
        phone: Some(phone.into()),
        birth_date: None,
        gender: None,
        address: None,
        avatar: Some(avatar.into()),
        available_schedule: None,
    }
}

// The CRM12345 doctor is the staff profile of the dr.ana login
fn ensure_demo_doctor(store: &dyn Store, user: &User) -> anyhow::Result<Staff> {
    let mut doctor = staff_member(
        DOCTOR_NAME,
        DOCTOR_REGISTRATION,
        "doctor",
        DOCTOR_EMAIL,
        "(11) 99999-8888",
        Some("Cardiology"),
        "https://images.pexels.com/photos/5214959/pexels-photo-5214959.jpeg?auto=compress&cs=tinysrgb&w=150",
    );
    doctor.user_id = Some(user.id);
    ensure_staff(store, doctor)
}

/// Users, patients with their clinical history, staff, medications and two appointments.
pub fn base(store: &dyn Store) -> anyhow::Result<()> {
    let doctor_user = ensure_user(
        store,
        "Dr. Ana Beatriz Santos",
        DOCTOR_EMAIL,
        "password123",
        "doctor",
        "https://images.pexels.com/photos/5214959/pexels-photo-5214959.jpeg?auto=compress&cs=tinysrgb&w=150",
    )?;
    ensure_user(store, "Admin João", ADMIN_EMAIL, "admin123", "admin", "/admin-user.png")?;

    let (maria, maria_is_new) = ensure_patient(
        store,
        NewPatient {
            user_id: None,
            full_name: "Maria Silva".into(),
            cpf: "123.456.789-00".into(),
            birth_date: NaiveDate::from_ymd_opt(1985, 3, 15).context("invalid birth date")?,
            gender: "female".into(),
            email: Some("maria.silva@email.com".into()),
            phone: Some("(11) 91234-5678".into()),
            address: Some("Rua das Flores, 123, São Paulo, SP".into()),
            avatar: Some("https://randomuser.me/api/portraits/women/1.jpg".into()),
        },
    )?;
    let (joao, joao_is_new) = ensure_patient(
        store,
        NewPatient {
            user_id: None,
            full_name: "João Souza".into(),
            cpf: "987.654.321-00".into(),
            birth_date: NaiveDate::from_ymd_opt(1990, 7, 22).context("invalid birth date")?,
            gender: "male".into(),
            email: Some("joao.souza@email.com".into()),
            phone: Some("(21) 99876-5432".into()),
            address: Some("Av. Brasil, 456, Rio de Janeiro, RJ".into()),
            avatar: Some("https://randomuser.me/api/portraits/men/2.jpg".into()),
        },
    )?;

    let doctor = ensure_demo_doctor(store, &doctor_user)?;
    ensure_staff(
        store,
        staff_member(
            "Enf. Carlos Mendes",
            "COREN54321",
            "nurse",
            "carlos.mendes@hospital.com",
            "(11) 91234-1111",
            None,
            "https://randomuser.me/api/portraits/men/11.jpg",
        ),
    )?;
    ensure_staff(
        store,
        staff_member(
            "Téc. Paula Oliveira",
            "TECH9876",
            "technician",
            "paula.oliveira@hospital.com",
            "(11) 91234-2222",
            Some("Radiology"),
            "https://randomuser.me/api/portraits/women/15.jpg",
        ),
    )?;

    let dipirona = ensure_medication(store, "Dipirona", "500mg")?;
    let losartana = ensure_medication(store, "Losartana", "50mg")?;

    // Clinical history only goes in with the patient's first insert
    let histories = [
        (maria_is_new, &maria, &dipirona, "Penicillin", "Diabetes", "Blood Test", "2023-02-10", "Normal"),
        (joao_is_new, &joao, &losartana, "Latex", "Hypertension", "ECG", "2023-03-15", "Altered"),
    ];
    for (is_new, patient, medication, allergy, condition, exam_type, exam_date, result) in histories {
        if !is_new {
            continue;
        }
        store.add_patient_medication(NewPatientMedication { patient_id: patient.id, medication_id: medication.id })?;
        store.add_allergy(NewAllergy { patient_id: patient.id, allergy: allergy.into() })?;
        store.add_chronic_condition(NewChronicCondition { patient_id: patient.id, condition: condition.into() })?;
        store.create_exam(NewExam {
            patient_id: patient.id,
            exam_type: exam_type.into(),
            urgency: URGENCIES[0].into(),
            reason: None,
            scheduled_date: Some(datetime(exam_date, "00:00")?),
            fasting_required: false,
            special_instructions: None,
            result: Some(result.into()),
        })?;
    }

    let visits = [
        (maria_is_new, &maria, "2023-06-15", "09:00", "Consultation", "Scheduled"),
        (joao_is_new, &joao, "2023-06-16", "14:00", "Follow-up", "Completed"),
    ];
    for (is_new, patient, date, time, kind, status) in visits {
        if !is_new {
            continue;
        }
        store.create_appointment(AppointmentRecord {
            patient_id: patient.id,
            doctor_id: doctor.id,
            doctor_name: doctor.full_name.clone(),
            date: datetime(date, time)?,
            time: time.into(),
            kind: kind.into(),
            status: status.into(),
            notes: None,
        })?;
    }

    tracing::info!("base seed finished");
    Ok(())
}

/// Creates `count` nurses and technicians with generated contact details.
pub fn non_doctors<R: Rng>(store: &dyn Store, count: usize, rng: &mut R) -> anyhow::Result<Vec<Staff>> {
    let mut created = Vec::with_capacity(count);
    for _ in 0..count {
        let (role, specialization) = if rng.gen_bool(0.5) {
            ("nurse", "Enfermagem")
        } else {
            ("technician", "Técnico em Radiologia")
        };
        let full_name: String = Name(PT_BR).fake_with_rng(rng);
        let email: String = SafeEmail(PT_BR).fake_with_rng(rng);
        let phone: String = PhoneNumber(PT_BR).fake_with_rng(rng);
        let registration: String = (0..8).map(|_| char::from(rng.sample(Alphanumeric))).collect();

        let member = store.create_staff(NewStaff {
            user_id: None,
            full_name,
            registration_number: registration,
            role: role.into(),
            specialization: Some(specialization.into()),
            email,
            phone: Some(phone),
            birth_date: None,
            gender: None,
            address: None,
            avatar: None,
            available_schedule: None,
        })?;
        created.push(member);
    }
    tracing::info!(count = created.len(), "seeded non-doctor staff");
    Ok(created)
}

/// Five daily slots for the demo doctor starting at `today` 09:00; odd days
/// are teleconsultations. Returns how many appointments were added.
pub fn doctor_agenda(store: &dyn Store, today: NaiveDate) -> anyhow::Result<usize> {
    let existing = store
        .list_staff()?
        .into_iter()
        .find(|s| s.full_name.contains("Ana Beatriz Santos"));
    let doctor = match existing {
        Some(doctor) => doctor,
        None => {
            let user = store
                .find_user_by_email(DOCTOR_EMAIL)?
                .with_context(|| format!("user {DOCTOR_EMAIL} not found, run the base seed first"))?;
            ensure_demo_doctor(store, &user)?
        }
    };

    let Some(patient) = store.list_patients()?.into_iter().map(|p| p.patient).min_by_key(|p| p.id) else {
        bail!("no patients found, run the base seed first");
    };

    let booked: Vec<NaiveDateTime> = store
        .list_appointments()?
        .into_iter()
        .filter(|a| a.appointment.doctor_id == doctor.id)
        .map(|a| a.appointment.date)
        .collect();

    let mut added = 0;
    for offset in 0..5u32 {
        let day = today
            .checked_add_days(Days::new(u64::from(offset)))
            .context("agenda date out of range")?;
        let date = day.and_hms_opt(9 + offset, 0, 0).context("invalid agenda hour")?;
        if booked.contains(&date) {
            continue;
        }

        let remote = offset % 2 == 1;
        let appointment = AppointmentRecord {
            patient_id: patient.id,
            doctor_id: doctor.id,
            doctor_name: doctor.full_name.clone(),
            date,
            time: date.format("%H:%M").to_string(),
            kind: (if remote { TELECONSULTATION_APPOINTMENT_TYPE } else { "Consulta Presencial" }).into(),
            status: DEFAULT_APPOINTMENT_STATUS.into(),
            notes: None,
        };
        if remote {
            let teleconsultation = TeleconsultationRecord {
                patient_id: patient.id,
                doctor_id: doctor.id,
                date,
                notes: Some("Consulta agendada via seed script".into()),
                video_link: None,
                status: DEFAULT_TELECONSULTATION_STATUS.into(),
            };
            store.create_teleconsultation(teleconsultation, appointment)?;
        } else {
            store.create_appointment(appointment)?;
        }
        added += 1;
    }

    tracing::info!(doctor_id = doctor.id, patient_id = patient.id, added, "doctor agenda seeded");
    Ok(added)
}

pub fn all<R: Rng>(store: &dyn Store, non_doctor_count: usize, today: NaiveDate, rng: &mut R) -> anyhow::Result<()> {
    base(store)?;
    non_doctors(store, non_doctor_count, rng)?;
    doctor_agenda(store, today)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_password;
    use crate::store::MemoryStore;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    #[test]
    fn base_is_idempotent() {
        let store = MemoryStore::new();
        base(&store).unwrap();
        base(&store).unwrap();

        assert_eq!(store.list_patients().unwrap().len(), 2);
        assert_eq!(store.list_staff().unwrap().len(), 3);
        assert_eq!(store.list_medications().unwrap().len(), 2);
        assert_eq!(store.list_appointments().unwrap().len(), 2);
        assert_eq!(store.list_exams().unwrap().len(), 2);

        let maria = store.find_patient_by_cpf("123.456.789-00").unwrap().unwrap();
        let details = store.get_patient(maria.id).unwrap();
        assert_eq!(details.allergies.len(), 1);
        assert_eq!(details.medications[0].name, "Dipirona");
    }

    #[test]
    fn demo_logins_work_and_doctor_is_linked() {
        let store = MemoryStore::new();
        base(&store).unwrap();

        let doctor_user = store.find_user_by_email(DOCTOR_EMAIL).unwrap().unwrap();
        assert!(verify_password("password123", &doctor_user.password_hash));
        let admin = store.find_user_by_email(ADMIN_EMAIL).unwrap().unwrap();
        assert!(verify_password("admin123", &admin.password_hash));
        assert_eq!(admin.role, "admin");

        let profile = store.get_staff_by_user(doctor_user.id).unwrap();
        assert_eq!(profile.registration_number, DOCTOR_REGISTRATION);
    }

    #[test]
    fn non_doctors_get_generated_details() {
        let store = MemoryStore::new();
        let mut rng = StdRng::seed_from_u64(7);
        let created = non_doctors(&store, 10, &mut rng).unwrap();

        assert_eq!(created.len(), 10);
        for member in &created {
            assert!(member.role == "nurse" || member.role == "technician");
            assert_eq!(member.registration_number.len(), 8);
            assert!(member.registration_number.chars().all(|c| c.is_ascii_alphanumeric()));
            assert!(member.email.contains('@'));
            assert!(!member.full_name.is_empty());
            assert!(member.phone.as_deref().is_some_and(|phone| !phone.is_empty()));
        }
    }

    #[test]
    fn agenda_alternates_teleconsultations() {
        let store = MemoryStore::new();
        base(&store).unwrap();

        assert_eq!(doctor_agenda(&store, today()).unwrap(), 5);
        assert_eq!(doctor_agenda(&store, today()).unwrap(), 0);

        let teleconsultations = store.list_teleconsultations(None).unwrap();
        assert_eq!(teleconsultations.len(), 2);
        assert_eq!(teleconsultations[0].teleconsultation.date, datetime("2024-06-11", "10:00").unwrap());

        let agenda: Vec<_> = store
            .list_appointments()
            .unwrap()
            .into_iter()
            .filter(|a| a.appointment.date.date() >= today())
            .collect();
        assert_eq!(agenda.len(), 5);
        assert_eq!(agenda[0].appointment.time, "09:00");
        assert_eq!(agenda[1].appointment.kind, TELECONSULTATION_APPOINTMENT_TYPE);
    }

    #[test]
    fn agenda_requires_the_doctor_login() {
        let store = MemoryStore::new();
        let err = doctor_agenda(&store, today()).unwrap_err();
        assert!(err.to_string().contains(DOCTOR_EMAIL));
    }

    #[test]
    fn all_runs_every_step() {
        let store = MemoryStore::new();
        let mut rng = StdRng::seed_from_u64(1);
        all(&store, 4, today(), &mut rng).unwrap();
        assert_eq!(store.list_staff().unwrap().len(), 7);
        assert_eq!(store.list_appointments().unwrap().len(), 7);
    }
}
