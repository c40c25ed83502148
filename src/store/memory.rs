use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;

use super::{AccountProfile, Store, StoreError, StoreResult};
use crate::models::*;

#[derive(Debug, Clone, Copy)]
struct PatientMedicationRow {
    patient_id: i32,
    medication_id: i32,
}

#[derive(Default)]
struct Tables {
    sequences: HashMap<&'static str, i32>,
    users: BTreeMap<i32, User>,
    patients: BTreeMap<i32, Patient>,
    staff: BTreeMap<i32, Staff>,
    appointments: BTreeMap<i32, Appointment>,
    teleconsultations: BTreeMap<i32, Teleconsultation>,
    medications: BTreeMap<i32, Medication>,
    patient_medications: BTreeMap<i32, PatientMedicationRow>,
    prescriptions: BTreeMap<i32, Prescription>,
    exams: BTreeMap<i32, Exam>,
    allergies: BTreeMap<i32, Allergy>,
    chronic_conditions: BTreeMap<i32, ChronicCondition>,
    reports: BTreeMap<i32, Report>,
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn set_nullable<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

fn missing(entity: &str, id: i32) -> StoreError {
    StoreError::InvalidReference(format!("{entity} {id} does not exist"))
}

impl Tables {
    fn next_id(&mut self, table: &'static str) -> i32 {
        let seq = self.sequences.entry(table).or_insert(0);
        *seq += 1;
        *seq
    }

    fn require_patient(&self, id: i32) -> StoreResult<()> {
        if self.patients.contains_key(&id) { Ok(()) } else { Err(missing("Patient", id)) }
    }

    fn require_staff(&self, id: i32) -> StoreResult<()> {
        if self.staff.contains_key(&id) { Ok(()) } else { Err(missing("Staff", id)) }
    }

    fn require_medication(&self, id: i32) -> StoreResult<()> {
        if self.medications.contains_key(&id) { Ok(()) } else { Err(missing("Medication", id)) }
    }

    fn check_cpf_free(&self, cpf: &str, except: Option<i32>) -> StoreResult<()> {
        let taken = self
            .patients
            .values()
            .any(|p| p.cpf == cpf && Some(p.id) != except);
        if taken { Err(StoreError::Conflict("CPF already registered".into())) } else { Ok(()) }
    }

    fn check_profile_free(&self, user_id: Option<i32>) -> StoreResult<()> {
        let Some(user_id) = user_id else { return Ok(()) };
        let taken = self.patients.values().any(|p| p.user_id == Some(user_id))
            || self.staff.values().any(|s| s.user_id == Some(user_id));
        if taken { Err(StoreError::Conflict("User already has a profile".into())) } else { Ok(()) }
    }

    fn insert_user(&mut self, new: NewUser) -> StoreResult<User> {
        if self.users.values().any(|u| u.email == new.email) {
            return Err(StoreError::Conflict("Email already registered".into()));
        }
        let ts = now();
        let user = User {
            id: self.next_id("users"),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            avatar: new.avatar,
            created_at: ts,
            updated_at: ts,
        };
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn insert_patient(&mut self, new: NewPatient) -> StoreResult<Patient> {
        self.check_cpf_free(&new.cpf, None)?;
        self.check_profile_free(new.user_id)?;
        let ts = now();
        let patient = Patient {
            id: self.next_id("patients"),
            user_id: new.user_id,
            full_name: new.full_name,
            cpf: new.cpf,
            birth_date: new.birth_date,
            gender: new.gender,
            email: new.email,
            phone: new.phone,
            address: new.address,
            avatar: new.avatar,
            created_at: ts,
            updated_at: ts,
        };
        self.patients.insert(patient.id, patient.clone());
        Ok(patient)
    }

    fn insert_staff(&mut self, new: NewStaff) -> StoreResult<Staff> {
        self.check_profile_free(new.user_id)?;
        let ts = now();
        let member = Staff {
            id: self.next_id("staff"),
            user_id: new.user_id,
            full_name: new.full_name,
            registration_number: new.registration_number,
            role: new.role,
            specialization: new.specialization,
            email: new.email,
            phone: new.phone,
            birth_date: new.birth_date,
            gender: new.gender,
            address: new.address,
            avatar: new.avatar,
            available_schedule: new.available_schedule,
            created_at: ts,
            updated_at: ts,
        };
        self.staff.insert(member.id, member.clone());
        Ok(member)
    }

    fn insert_appointment(&mut self, record: AppointmentRecord) -> StoreResult<Appointment> {
        self.require_patient(record.patient_id)?;
        self.require_staff(record.doctor_id)?;
        let ts = now();
        let appointment = Appointment {
            id: self.next_id("appointments"),
            patient_id: record.patient_id,
            doctor_id: record.doctor_id,
            doctor_name: record.doctor_name,
            date: record.date,
            time: record.time,
            kind: record.kind,
            status: record.status,
            notes: record.notes,
            created_at: ts,
            updated_at: ts,
        };
        self.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    fn prescription_listing(&self, prescription: &Prescription) -> Option<PrescriptionListing> {
        let patient = self.patients.get(&prescription.patient_id)?;
        let medication = self.medications.get(&prescription.medication_id)?;
        let doctor = prescription
            .doctor_id
            .and_then(|id| self.staff.get(&id))
            .map(|d| NameRef { full_name: d.full_name.clone() });
        Some(PrescriptionListing {
            prescription: prescription.clone(),
            patient: NameRef { full_name: patient.full_name.clone() },
            doctor,
            medication: MedicationRef { name: medication.name.clone() },
        })
    }
}

/// In-process [`Store`] with the same integrity rules as the PostgreSQL schema.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Pool("memory store lock poisoned".into()))
    }
}

impl Store for MemoryStore {
    fn create_account(&self, user: NewUser, profile: AccountProfile) -> StoreResult<User> {
        let mut t = self.tables()?;
        if t.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("Email already registered".into()));
        }
        // Check the profile before touching any table so a failure leaves nothing behind
        if let AccountProfile::Patient(patient) = &profile {
            t.check_cpf_free(&patient.cpf, None)?;
        }

        let created = t.insert_user(user)?;
        match profile {
            AccountProfile::Patient(mut patient) => {
                patient.user_id = Some(created.id);
                t.insert_patient(patient)?;
            }
            AccountProfile::Staff(mut member) => {
                member.user_id = Some(created.id);
                t.insert_staff(member)?;
            }
        }
        Ok(created)
    }

    fn create_user(&self, user: NewUser) -> StoreResult<User> {
        self.tables()?.insert_user(user)
    }

    fn find_user(&self, id: i32) -> StoreResult<User> {
        self.tables()?.users.get(&id).cloned().ok_or(StoreError::NotFound("User"))
    }

    fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.tables()?.users.values().find(|u| u.email == email).cloned())
    }

    fn count_patients(&self) -> StoreResult<usize> {
        Ok(self.tables()?.patients.len())
    }

    fn list_patients(&self) -> StoreResult<Vec<PatientWithAppointments>> {
        let t = self.tables()?;
        let mut appointments: Vec<&Appointment> = t.appointments.values().collect();
        appointments.sort_by_key(|a| (a.date, a.id));
        Ok(t.patients
            .values()
            .map(|patient| PatientWithAppointments {
                patient: patient.clone(),
                appointments: appointments
                    .iter()
                    .filter(|a| a.patient_id == patient.id)
                    .filter_map(|a| {
                        t.staff.get(&a.doctor_id).map(|doctor| AppointmentWithDoctor {
                            appointment: (*a).clone(),
                            doctor: doctor.clone(),
                        })
                    })
                    .collect(),
            })
            .collect())
    }

    fn get_patient(&self, id: i32) -> StoreResult<PatientDetails> {
        let t = self.tables()?;
        let patient = t.patients.get(&id).cloned().ok_or(StoreError::NotFound("Patient"))?;
        Ok(PatientDetails {
            patient,
            exams: t.exams.values().filter(|e| e.patient_id == id).cloned().collect(),
            allergies: t.allergies.values().filter(|a| a.patient_id == id).cloned().collect(),
            chronic_conditions: t
                .chronic_conditions
                .values()
                .filter(|c| c.patient_id == id)
                .cloned()
                .collect(),
            medications: t
                .patient_medications
                .values()
                .filter(|link| link.patient_id == id)
                .filter_map(|link| t.medications.get(&link.medication_id).cloned())
                .collect(),
        })
    }

    fn find_patient_by_cpf(&self, cpf: &str) -> StoreResult<Option<Patient>> {
        Ok(self.tables()?.patients.values().find(|p| p.cpf == cpf).cloned())
    }

    fn create_patient(&self, patient: NewPatient) -> StoreResult<Patient> {
        self.tables()?.insert_patient(patient)
    }

    fn update_patient(&self, id: i32, changes: UpdatePatient) -> StoreResult<Patient> {
        let mut t = self.tables()?;
        if !t.patients.contains_key(&id) {
            return Err(StoreError::NotFound("Patient"));
        }
        if let Some(cpf) = &changes.cpf {
            t.check_cpf_free(cpf, Some(id))?;
        }
        let patient = t.patients.get_mut(&id).ok_or(StoreError::NotFound("Patient"))?;
        set(&mut patient.full_name, changes.full_name);
        set(&mut patient.cpf, changes.cpf);
        set(&mut patient.birth_date, changes.birth_date);
        set(&mut patient.gender, changes.gender);
        set_nullable(&mut patient.email, changes.email);
        set_nullable(&mut patient.phone, changes.phone);
        set_nullable(&mut patient.address, changes.address);
        set_nullable(&mut patient.avatar, changes.avatar);
        patient.updated_at = now();
        Ok(patient.clone())
    }

    fn delete_patient(&self, id: i32) -> StoreResult<()> {
        let mut t = self.tables()?;
        t.patients.remove(&id).ok_or(StoreError::NotFound("Patient"))?;
        t.appointments.retain(|_, a| a.patient_id != id);
        t.teleconsultations.retain(|_, c| c.patient_id != id);
        t.prescriptions.retain(|_, p| p.patient_id != id);
        t.exams.retain(|_, e| e.patient_id != id);
        t.allergies.retain(|_, a| a.patient_id != id);
        t.chronic_conditions.retain(|_, c| c.patient_id != id);
        t.patient_medications.retain(|_, m| m.patient_id != id);
        Ok(())
    }

    fn add_allergy(&self, allergy: NewAllergy) -> StoreResult<Allergy> {
        let mut t = self.tables()?;
        t.require_patient(allergy.patient_id)?;
        let row = Allergy {
            id: t.next_id("allergies"),
            patient_id: allergy.patient_id,
            allergy: allergy.allergy,
        };
        t.allergies.insert(row.id, row.clone());
        Ok(row)
    }

    fn add_chronic_condition(&self, condition: NewChronicCondition) -> StoreResult<ChronicCondition> {
        let mut t = self.tables()?;
        t.require_patient(condition.patient_id)?;
        let row = ChronicCondition {
            id: t.next_id("chronic_conditions"),
            patient_id: condition.patient_id,
            condition: condition.condition,
        };
        t.chronic_conditions.insert(row.id, row.clone());
        Ok(row)
    }

    fn add_patient_medication(&self, link: NewPatientMedication) -> StoreResult<()> {
        let mut t = self.tables()?;
        t.require_patient(link.patient_id)?;
        t.require_medication(link.medication_id)?;
        let id = t.next_id("patient_medications");
        t.patient_medications.insert(
            id,
            PatientMedicationRow { patient_id: link.patient_id, medication_id: link.medication_id },
        );
        Ok(())
    }

    fn list_staff(&self) -> StoreResult<Vec<Staff>> {
        Ok(self.tables()?.staff.values().cloned().collect())
    }

    fn get_staff(&self, id: i32) -> StoreResult<Staff> {
        self.tables()?.staff.get(&id).cloned().ok_or(StoreError::NotFound("Staff"))
    }

    fn get_staff_by_user(&self, user_id: i32) -> StoreResult<Staff> {
        self.tables()?
            .staff
            .values()
            .find(|s| s.user_id == Some(user_id))
            .cloned()
            .ok_or(StoreError::NotFound("Staff"))
    }

    fn create_staff(&self, member: NewStaff) -> StoreResult<Staff> {
        self.tables()?.insert_staff(member)
    }

    fn update_staff(&self, id: i32, changes: UpdateStaff) -> StoreResult<Staff> {
        let mut t = self.tables()?;
        let member = t.staff.get_mut(&id).ok_or(StoreError::NotFound("Staff"))?;
        set(&mut member.full_name, changes.full_name);
        set(&mut member.registration_number, changes.registration_number);
        set(&mut member.role, changes.role);
        set_nullable(&mut member.specialization, changes.specialization);
        set(&mut member.email, changes.email);
        set_nullable(&mut member.phone, changes.phone);
        set_nullable(&mut member.birth_date, changes.birth_date);
        set_nullable(&mut member.gender, changes.gender);
        set_nullable(&mut member.address, changes.address);
        set_nullable(&mut member.avatar, changes.avatar);
        set_nullable(&mut member.available_schedule, changes.available_schedule);
        member.updated_at = now();
        Ok(member.clone())
    }

    fn delete_staff(&self, id: i32) -> StoreResult<()> {
        let mut t = self.tables()?;
        t.staff.remove(&id).ok_or(StoreError::NotFound("Staff"))?;
        t.appointments.retain(|_, a| a.doctor_id != id);
        t.teleconsultations.retain(|_, c| c.doctor_id != id);
        for prescription in t.prescriptions.values_mut() {
            if prescription.doctor_id == Some(id) {
                prescription.doctor_id = None;
            }
        }
        Ok(())
    }

    fn list_appointments(&self) -> StoreResult<Vec<AppointmentListing>> {
        let t = self.tables()?;
        let mut rows: Vec<AppointmentListing> = t
            .appointments
            .values()
            .filter_map(|a| {
                let patient = t.patients.get(&a.patient_id)?;
                let doctor = t.staff.get(&a.doctor_id)?;
                Some(AppointmentListing {
                    appointment: a.clone(),
                    patient: patient.into(),
                    doctor: doctor.into(),
                })
            })
            .collect();
        rows.sort_by_key(|row| (row.appointment.date, row.appointment.id));
        Ok(rows)
    }

    fn get_appointment(&self, id: i32) -> StoreResult<Appointment> {
        self.tables()?
            .appointments
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("Appointment"))
    }

    fn create_appointment(&self, appointment: AppointmentRecord) -> StoreResult<Appointment> {
        self.tables()?.insert_appointment(appointment)
    }

    fn update_appointment(&self, id: i32, changes: UpdateAppointment) -> StoreResult<Appointment> {
        let mut t = self.tables()?;
        if !t.appointments.contains_key(&id) {
            return Err(StoreError::NotFound("Appointment"));
        }
        if let Some(patient_id) = changes.patient_id {
            t.require_patient(patient_id)?;
        }
        if let Some(doctor_id) = changes.doctor_id {
            t.require_staff(doctor_id)?;
        }
        let appointment = t.appointments.get_mut(&id).ok_or(StoreError::NotFound("Appointment"))?;
        set(&mut appointment.patient_id, changes.patient_id);
        set(&mut appointment.doctor_id, changes.doctor_id);
        set(&mut appointment.doctor_name, changes.doctor_name);
        set(&mut appointment.date, changes.date);
        set(&mut appointment.time, changes.time);
        set(&mut appointment.kind, changes.kind);
        set(&mut appointment.status, changes.status);
        set_nullable(&mut appointment.notes, changes.notes);
        appointment.updated_at = now();
        Ok(appointment.clone())
    }

    fn delete_appointment(&self, id: i32) -> StoreResult<()> {
        self.tables()?
            .appointments
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound("Appointment"))
    }

    fn list_teleconsultations(&self, day: Option<NaiveDate>) -> StoreResult<Vec<TeleconsultationListing>> {
        let t = self.tables()?;
        let mut rows: Vec<TeleconsultationListing> = t
            .teleconsultations
            .values()
            .filter(|c| day.is_none_or(|d| c.date.date() == d))
            .filter_map(|c| {
                Some(TeleconsultationListing {
                    teleconsultation: c.clone(),
                    patient: t.patients.get(&c.patient_id)?.clone(),
                    doctor: t.staff.get(&c.doctor_id)?.clone(),
                })
            })
            .collect();
        rows.sort_by_key(|row| (row.teleconsultation.date, row.teleconsultation.id));
        Ok(rows)
    }

    fn get_teleconsultation(&self, id: i32) -> StoreResult<Teleconsultation> {
        self.tables()?
            .teleconsultations
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("Teleconsultation"))
    }

    fn create_teleconsultation(
        &self,
        teleconsultation: TeleconsultationRecord,
        appointment: AppointmentRecord,
    ) -> StoreResult<(Teleconsultation, Appointment)> {
        let mut t = self.tables()?;
        t.require_patient(teleconsultation.patient_id)?;
        t.require_staff(teleconsultation.doctor_id)?;
        t.require_patient(appointment.patient_id)?;
        t.require_staff(appointment.doctor_id)?;

        let ts = now();
        let tele = Teleconsultation {
            id: t.next_id("teleconsultations"),
            patient_id: teleconsultation.patient_id,
            doctor_id: teleconsultation.doctor_id,
            date: teleconsultation.date,
            notes: teleconsultation.notes,
            video_link: teleconsultation.video_link,
            status: teleconsultation.status,
            created_at: ts,
            updated_at: ts,
        };
        t.teleconsultations.insert(tele.id, tele.clone());
        let appointment = t.insert_appointment(appointment)?;
        Ok((tele, appointment))
    }

    fn update_teleconsultation(&self, id: i32, changes: UpdateTeleconsultation) -> StoreResult<Teleconsultation> {
        let mut t = self.tables()?;
        if !t.teleconsultations.contains_key(&id) {
            return Err(StoreError::NotFound("Teleconsultation"));
        }
        if let Some(patient_id) = changes.patient_id {
            t.require_patient(patient_id)?;
        }
        if let Some(doctor_id) = changes.doctor_id {
            t.require_staff(doctor_id)?;
        }
        let tele = t
            .teleconsultations
            .get_mut(&id)
            .ok_or(StoreError::NotFound("Teleconsultation"))?;
        set(&mut tele.patient_id, changes.patient_id);
        set(&mut tele.doctor_id, changes.doctor_id);
        set(&mut tele.date, changes.date);
        set_nullable(&mut tele.notes, changes.notes);
        set_nullable(&mut tele.video_link, changes.video_link);
        set(&mut tele.status, changes.status);
        tele.updated_at = now();
        Ok(tele.clone())
    }

    fn delete_teleconsultation(&self, id: i32) -> StoreResult<()> {
        self.tables()?
            .teleconsultations
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound("Teleconsultation"))
    }

    fn list_medications(&self) -> StoreResult<Vec<Medication>> {
        let mut rows: Vec<Medication> = self.tables()?.medications.values().cloned().collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    fn get_medication(&self, id: i32) -> StoreResult<Medication> {
        self.tables()?
            .medications
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("Medication"))
    }

    fn create_medication(&self, medication: NewMedication) -> StoreResult<Medication> {
        let mut t = self.tables()?;
        let row = Medication {
            id: t.next_id("medications"),
            name: medication.name,
            dosage: medication.dosage,
        };
        t.medications.insert(row.id, row.clone());
        Ok(row)
    }

    fn list_prescriptions(&self) -> StoreResult<Vec<PrescriptionListing>> {
        let t = self.tables()?;
        Ok(t.prescriptions.values().filter_map(|p| t.prescription_listing(p)).collect())
    }

    fn count_prescriptions(&self) -> StoreResult<usize> {
        Ok(self.tables()?.prescriptions.len())
    }

    fn get_prescription(&self, id: i32) -> StoreResult<PrescriptionListing> {
        let t = self.tables()?;
        t.prescriptions
            .get(&id)
            .and_then(|p| t.prescription_listing(p))
            .ok_or(StoreError::NotFound("Prescription"))
    }

    fn create_prescription(&self, prescription: NewPrescription) -> StoreResult<Prescription> {
        let mut t = self.tables()?;
        t.require_patient(prescription.patient_id)?;
        t.require_medication(prescription.medication_id)?;
        if let Some(doctor_id) = prescription.doctor_id {
            t.require_staff(doctor_id)?;
        }
        let ts = now();
        let row = Prescription {
            id: t.next_id("prescriptions"),
            patient_id: prescription.patient_id,
            doctor_id: prescription.doctor_id,
            medication_id: prescription.medication_id,
            dosage: prescription.dosage,
            instructions: prescription.instructions,
            created_at: ts,
            updated_at: ts,
        };
        t.prescriptions.insert(row.id, row.clone());
        Ok(row)
    }

    fn update_prescription(&self, id: i32, changes: UpdatePrescription) -> StoreResult<Prescription> {
        let mut t = self.tables()?;
        if !t.prescriptions.contains_key(&id) {
            return Err(StoreError::NotFound("Prescription"));
        }
        if let Some(patient_id) = changes.patient_id {
            t.require_patient(patient_id)?;
        }
        if let Some(medication_id) = changes.medication_id {
            t.require_medication(medication_id)?;
        }
        if let Some(doctor_id) = changes.doctor_id {
            t.require_staff(doctor_id)?;
        }
        let row = t.prescriptions.get_mut(&id).ok_or(StoreError::NotFound("Prescription"))?;
        set(&mut row.patient_id, changes.patient_id);
        set_nullable(&mut row.doctor_id, changes.doctor_id);
        set(&mut row.medication_id, changes.medication_id);
        set_nullable(&mut row.dosage, changes.dosage);
        set_nullable(&mut row.instructions, changes.instructions);
        row.updated_at = now();
        Ok(row.clone())
    }

    fn delete_prescription(&self, id: i32) -> StoreResult<()> {
        self.tables()?
            .prescriptions
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound("Prescription"))
    }

    fn list_exams(&self) -> StoreResult<Vec<Exam>> {
        Ok(self.tables()?.exams.values().cloned().collect())
    }

    fn count_exams(&self) -> StoreResult<usize> {
        Ok(self.tables()?.exams.len())
    }

    fn get_exam(&self, id: i32) -> StoreResult<Exam> {
        self.tables()?.exams.get(&id).cloned().ok_or(StoreError::NotFound("Exam"))
    }

    fn create_exam(&self, exam: NewExam) -> StoreResult<Exam> {
        let mut t = self.tables()?;
        t.require_patient(exam.patient_id)?;
        let ts = now();
        let row = Exam {
            id: t.next_id("exams"),
            patient_id: exam.patient_id,
            exam_type: exam.exam_type,
            urgency: exam.urgency,
            reason: exam.reason,
            scheduled_date: exam.scheduled_date,
            fasting_required: exam.fasting_required,
            special_instructions: exam.special_instructions,
            result: exam.result,
            created_at: ts,
            updated_at: ts,
        };
        t.exams.insert(row.id, row.clone());
        Ok(row)
    }

    fn update_exam(&self, id: i32, changes: UpdateExam) -> StoreResult<Exam> {
        let mut t = self.tables()?;
        if !t.exams.contains_key(&id) {
            return Err(StoreError::NotFound("Exam"));
        }
        if let Some(patient_id) = changes.patient_id {
            t.require_patient(patient_id)?;
        }
        let row = t.exams.get_mut(&id).ok_or(StoreError::NotFound("Exam"))?;
        set(&mut row.patient_id, changes.patient_id);
        set(&mut row.exam_type, changes.exam_type);
        set(&mut row.urgency, changes.urgency);
        set_nullable(&mut row.reason, changes.reason);
        set_nullable(&mut row.scheduled_date, changes.scheduled_date);
        set(&mut row.fasting_required, changes.fasting_required);
        set_nullable(&mut row.special_instructions, changes.special_instructions);
        set_nullable(&mut row.result, changes.result);
        row.updated_at = now();
        Ok(row.clone())
    }

    fn delete_exam(&self, id: i32) -> StoreResult<()> {
        self.tables()?
            .exams
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound("Exam"))
    }

    fn list_reports(&self) -> StoreResult<Vec<Report>> {
        Ok(self.tables()?.reports.values().cloned().collect())
    }

    fn get_report(&self, id: i32) -> StoreResult<Report> {
        self.tables()?.reports.get(&id).cloned().ok_or(StoreError::NotFound("Report"))
    }

    fn create_report(&self, report: NewReport) -> StoreResult<Report> {
        let mut t = self.tables()?;
        let ts = now();
        let row = Report {
            id: t.next_id("reports"),
            title: report.title,
            content: report.content,
            created_at: ts,
            updated_at: ts,
        };
        t.reports.insert(row.id, row.clone());
        Ok(row)
    }

    fn update_report(&self, id: i32, changes: UpdateReport) -> StoreResult<Report> {
        let mut t = self.tables()?;
        let row = t.reports.get_mut(&id).ok_or(StoreError::NotFound("Report"))?;
        set(&mut row.title, changes.title);
        set(&mut row.content, changes.content);
        row.updated_at = now();
        Ok(row.clone())
    }

    fn delete_report(&self, id: i32) -> StoreResult<()> {
        self.tables()?
            .reports
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound("Report"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_patient(cpf: &str) -> NewPatient {
        NewPatient {
            user_id: None,
            full_name: "João Souza".into(),
            cpf: cpf.into(),
            birth_date: NaiveDate::from_ymd_opt(1990, 7, 22).unwrap(),
            gender: "male".into(),
            email: None,
            phone: None,
            address: None,
            avatar: None,
        }
    }

    fn new_doctor() -> NewStaff {
        NewStaff {
            user_id: None,
            full_name: "Dr. Ana Pereira".into(),
            registration_number: "CRM12345".into(),
            role: "doctor".into(),
            specialization: Some("Cardiology".into()),
            email: "ana.pereira@hospital.com".into(),
            phone: None,
            birth_date: None,
            gender: None,
            address: None,
            avatar: None,
            available_schedule: None,
        }
    }

    fn appointment_for(patient_id: i32, doctor: &Staff, day: u32) -> AppointmentRecord {
        AppointmentRecord {
            patient_id,
            doctor_id: doctor.id,
            doctor_name: doctor.full_name.clone(),
            date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap().and_hms_opt(9, 0, 0).unwrap(),
            time: "09:00".into(),
            kind: "Consulta".into(),
            status: "Agendado".into(),
            notes: None,
        }
    }

    #[test]
    fn cpf_is_unique() {
        let store = MemoryStore::new();
        store.create_patient(new_patient("123.456.789-00")).unwrap();
        let err = store.create_patient(new_patient("123.456.789-00")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let other = store.create_patient(new_patient("987.654.321-00")).unwrap();
        let changes = UpdatePatient { cpf: Some("123.456.789-00".into()), ..Default::default() };
        assert!(matches!(store.update_patient(other.id, changes), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn dangling_references_are_rejected() {
        let store = MemoryStore::new();
        let doctor = store.create_staff(new_doctor()).unwrap();
        let err = store.create_appointment(appointment_for(42, &doctor, 1)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidReference(_)));
    }

    #[test]
    fn deleting_patient_cascades() {
        let store = MemoryStore::new();
        let patient = store.create_patient(new_patient("123.456.789-00")).unwrap();
        let doctor = store.create_staff(new_doctor()).unwrap();
        store.create_appointment(appointment_for(patient.id, &doctor, 1)).unwrap();
        store
            .add_allergy(NewAllergy { patient_id: patient.id, allergy: "Latex".into() })
            .unwrap();

        store.delete_patient(patient.id).unwrap();
        assert!(store.list_appointments().unwrap().is_empty());
        assert!(matches!(store.get_patient(patient.id), Err(StoreError::NotFound("Patient"))));
        assert!(matches!(store.delete_patient(patient.id), Err(StoreError::NotFound("Patient"))));
    }

    #[test]
    fn deleting_doctor_detaches_prescriptions() {
        let store = MemoryStore::new();
        let patient = store.create_patient(new_patient("123.456.789-00")).unwrap();
        let doctor = store.create_staff(new_doctor()).unwrap();
        let medication = store
            .create_medication(NewMedication { name: "Dipirona".into(), dosage: Some("500mg".into()) })
            .unwrap();
        let prescription = store
            .create_prescription(NewPrescription {
                patient_id: patient.id,
                doctor_id: Some(doctor.id),
                medication_id: medication.id,
                dosage: None,
                instructions: None,
            })
            .unwrap();

        assert_eq!(store.count_prescriptions().unwrap(), 1);
        assert_eq!(store.count_patients().unwrap(), 1);
        assert_eq!(store.count_exams().unwrap(), 0);

        store.delete_staff(doctor.id).unwrap();
        let listing = store.get_prescription(prescription.id).unwrap();
        assert_eq!(listing.prescription.doctor_id, None);
        assert!(listing.doctor.is_none());
        assert_eq!(listing.medication.name, "Dipirona");
    }

    #[test]
    fn appointments_are_listed_by_date() {
        let store = MemoryStore::new();
        let patient = store.create_patient(new_patient("123.456.789-00")).unwrap();
        let doctor = store.create_staff(new_doctor()).unwrap();
        store.create_appointment(appointment_for(patient.id, &doctor, 20)).unwrap();
        store.create_appointment(appointment_for(patient.id, &doctor, 5)).unwrap();

        let days: Vec<u32> = store
            .list_appointments()
            .unwrap()
            .iter()
            .map(|row| chrono::Datelike::day(&row.appointment.date))
            .collect();
        assert_eq!(days, vec![5, 20]);
        assert_eq!(store.list_patients().unwrap()[0].appointments.len(), 2);
    }

    #[test]
    fn failed_registration_leaves_no_user() {
        let store = MemoryStore::new();
        store.create_patient(new_patient("123.456.789-00")).unwrap();
        let user = NewUser {
            name: "Maria".into(),
            email: "maria@vidaplus.com".into(),
            password_hash: "hash".into(),
            role: "patient".into(),
            avatar: None,
        };
        let err = store
            .create_account(user, AccountProfile::Patient(new_patient("123.456.789-00")))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert!(store.find_user_by_email("maria@vidaplus.com").unwrap().is_none());
    }
}
