//! Aggregates behind the dashboard widgets.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::models::{AppointmentListing, Staff, TeleconsultationListing};

const UPCOMING_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Totals {
    pub patients: usize,
    pub staff: usize,
    pub doctors: usize,
    pub appointments: usize,
    pub teleconsultations: usize,
    pub exams: usize,
    pub prescriptions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthCount {
    pub month: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpcomingTeleconsultation {
    pub id: i32,
    #[serde(serialize_with = "crate::models::utc_timestamp::serialize")]
    pub date: NaiveDateTime,
    pub patient_name: String,
    pub doctor_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub totals: Totals,
    pub appointments_by_status: BTreeMap<String, usize>,
    pub appointments_by_type: BTreeMap<String, usize>,
    pub appointments_by_month: Vec<MonthCount>,
    pub staff_by_specialization: BTreeMap<String, usize>,
    pub upcoming_teleconsultations: Vec<UpcomingTeleconsultation>,
}

/// Raw rows the summary is computed from.
pub struct DashboardInput {
    pub patients: usize,
    pub exams: usize,
    pub prescriptions: usize,
    pub staff: Vec<Staff>,
    pub appointments: Vec<AppointmentListing>,
    pub teleconsultations: Vec<TeleconsultationListing>,
}

fn tally<'a>(keys: impl Iterator<Item = &'a str>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for key in keys {
        *counts.entry(key.to_string()).or_insert(0) += 1;
    }
    counts
}

pub fn summarize(input: DashboardInput, now: NaiveDateTime) -> DashboardSummary {
    let totals = Totals {
        patients: input.patients,
        staff: input.staff.len(),
        doctors: input.staff.iter().filter(|s| s.role == "doctor").count(),
        appointments: input.appointments.len(),
        teleconsultations: input.teleconsultations.len(),
        exams: input.exams,
        prescriptions: input.prescriptions,
    };

    let appointments_by_status = tally(input.appointments.iter().map(|a| a.appointment.status.as_str()));
    let appointments_by_type = tally(input.appointments.iter().map(|a| a.appointment.kind.as_str()));

    let months: Vec<String> = input
        .appointments
        .iter()
        .map(|a| a.appointment.date.format("%Y-%m").to_string())
        .collect();
    let appointments_by_month = tally(months.iter().map(String::as_str))
        .into_iter()
        .map(|(month, count)| MonthCount { month, count })
        .collect();

    let staff_by_specialization = tally(
        input
            .staff
            .iter()
            .map(|s| s.specialization.as_deref().unwrap_or("Unspecified")),
    );

    let mut upcoming: Vec<&TeleconsultationListing> = input
        .teleconsultations
        .iter()
        .filter(|t| t.teleconsultation.date >= now)
        .collect();
    upcoming.sort_by_key(|t| (t.teleconsultation.date, t.teleconsultation.id));
    let upcoming_teleconsultations = upcoming
        .into_iter()
        .take(UPCOMING_LIMIT)
        .map(|t| UpcomingTeleconsultation {
            id: t.teleconsultation.id,
            date: t.teleconsultation.date,
            patient_name: t.patient.full_name.clone(),
            doctor_name: t.doctor.full_name.clone(),
        })
        .collect();

    DashboardSummary {
        totals,
        appointments_by_status,
        appointments_by_type,
        appointments_by_month,
        staff_by_specialization,
        upcoming_teleconsultations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use chrono::NaiveDate;

    fn at(month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, month, day).unwrap().and_hms_opt(hour, 0, 0).unwrap()
    }

    fn staff(id: i32, role: &str, specialization: Option<&str>) -> Staff {
        Staff {
            id,
            user_id: None,
            full_name: format!("Staff {id}"),
            registration_number: format!("REG{id:04}"),
            role: role.into(),
            specialization: specialization.map(Into::into),
            email: format!("staff{id}@hospital.com"),
            phone: None,
            birth_date: None,
            gender: None,
            address: None,
            avatar: None,
            available_schedule: None,
            created_at: at(1, 1, 0),
            updated_at: at(1, 1, 0),
        }
    }

    fn patient() -> Patient {
        Patient {
            id: 1,
            user_id: None,
            full_name: "Maria Silva".into(),
            cpf: "123.456.789-00".into(),
            birth_date: NaiveDate::from_ymd_opt(1985, 3, 15).unwrap(),
            gender: "female".into(),
            email: None,
            phone: None,
            address: None,
            avatar: None,
            created_at: at(1, 1, 0),
            updated_at: at(1, 1, 0),
        }
    }

    fn appointment(id: i32, date: NaiveDateTime, kind: &str, status: &str) -> AppointmentListing {
        let doctor = staff(1, "doctor", Some("Cardiology"));
        AppointmentListing {
            appointment: Appointment {
                id,
                patient_id: 1,
                doctor_id: 1,
                doctor_name: doctor.full_name.clone(),
                date,
                time: date.format("%H:%M").to_string(),
                kind: kind.into(),
                status: status.into(),
                notes: None,
                created_at: date,
                updated_at: date,
            },
            patient: (&patient()).into(),
            doctor: (&doctor).into(),
        }
    }

    fn teleconsultation(id: i32, date: NaiveDateTime) -> TeleconsultationListing {
        TeleconsultationListing {
            teleconsultation: Teleconsultation {
                id,
                patient_id: 1,
                doctor_id: 1,
                date,
                notes: None,
                video_link: None,
                status: "scheduled".into(),
                created_at: date,
                updated_at: date,
            },
            patient: patient(),
            doctor: staff(1, "doctor", Some("Cardiology")),
        }
    }

    #[test]
    fn counts_and_groups() {
        let input = DashboardInput {
            patients: 2,
            exams: 3,
            prescriptions: 1,
            staff: vec![
                staff(1, "doctor", Some("Cardiology")),
                staff(2, "nurse", None),
                staff(3, "doctor", Some("Cardiology")),
            ],
            appointments: vec![
                appointment(1, at(6, 15, 9), "Consultation", "Scheduled"),
                appointment(2, at(6, 16, 14), "Follow-up", "Completed"),
                appointment(3, at(7, 1, 10), "Teleconsulta", "Agendado"),
            ],
            teleconsultations: vec![],
        };
        let summary = summarize(input, at(1, 1, 0));

        assert_eq!(summary.totals.doctors, 2);
        assert_eq!(summary.totals.staff, 3);
        assert_eq!(summary.totals.appointments, 3);
        assert_eq!(summary.appointments_by_status["Completed"], 1);
        assert_eq!(summary.appointments_by_type["Teleconsulta"], 1);
        assert_eq!(
            summary.appointments_by_month,
            vec![
                MonthCount { month: "2024-06".into(), count: 2 },
                MonthCount { month: "2024-07".into(), count: 1 },
            ]
        );
        assert_eq!(summary.staff_by_specialization["Cardiology"], 2);
        assert_eq!(summary.staff_by_specialization["Unspecified"], 1);
    }

    #[test]
    fn upcoming_skips_past_and_caps_list() {
        let mut teleconsultations: Vec<_> = (1..=7).map(|i| teleconsultation(i, at(6, i as u32 + 1, 9))).collect();
        teleconsultations.push(teleconsultation(99, at(5, 1, 9)));
        let input = DashboardInput {
            patients: 1,
            exams: 0,
            prescriptions: 0,
            staff: vec![],
            appointments: vec![],
            teleconsultations,
        };
        let summary = summarize(input, at(6, 1, 0));

        let ids: Vec<i32> = summary.upcoming_teleconsultations.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(summary.upcoming_teleconsultations[0].patient_name, "Maria Silva");
    }
}
