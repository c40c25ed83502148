use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use validator::Validate;

use super::{blocking, doctor_lookup, doctor_not_found};
use crate::error::ApiError;
use crate::models::{NewTeleconsultation, ScheduledTeleconsultation, UpdateTeleconsultation};
use crate::store::Store;

#[derive(Debug, Deserialize)]
pub struct DayFilter {
    pub date: Option<NaiveDate>,
}

// Handler to list teleconsultations, optionally for a single day
pub async fn list_teleconsultations(
    store: web::Data<dyn Store>,
    filter: web::Query<DayFilter>,
) -> Result<HttpResponse, ApiError> {
    let day = filter.into_inner().date;
    let teleconsultations = blocking(store, move |s| s.list_teleconsultations(day)).await?;
    Ok(HttpResponse::Ok().json(teleconsultations))
}

pub async fn get_teleconsultation(
    store: web::Data<dyn Store>,
    id: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    let teleconsultation = blocking(store, move |s| s.get_teleconsultation(id)).await?;
    Ok(HttpResponse::Ok().json(teleconsultation))
}

// Handler to schedule a teleconsultation and its calendar appointment
pub async fn create_teleconsultation(
    store: web::Data<dyn Store>,
    body: web::Json<NewTeleconsultation>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();
    request.validate()?;

    let (teleconsultation, appointment) = blocking(store, move |s| {
        let Some(doctor) = doctor_lookup(s, request.doctor_id)? else {
            return Ok(None);
        };
        let (teleconsultation, appointment) = request.into_records(doctor.full_name);
        s.create_teleconsultation(teleconsultation, appointment).map(Some)
    })
    .await?
    .ok_or_else(doctor_not_found)?;

    tracing::info!(
        teleconsultation_id = teleconsultation.id,
        appointment_id = appointment.id,
        "teleconsultation scheduled"
    );
    Ok(HttpResponse::Created().json(ScheduledTeleconsultation {
        message: "Teleconsultation scheduled successfully".into(),
        teleconsultation,
        appointment,
    }))
}

pub async fn update_teleconsultation(
    store: web::Data<dyn Store>,
    id: web::Path<i32>,
    body: web::Json<UpdateTeleconsultation>,
) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    let changes = body.into_inner();
    changes.validate()?;

    let teleconsultation = blocking(store, move |s| {
        if let Some(doctor_id) = changes.doctor_id {
            if doctor_lookup(s, doctor_id)?.is_none() {
                return Ok(None);
            }
        }
        s.update_teleconsultation(id, changes).map(Some)
    })
    .await?
    .ok_or_else(doctor_not_found)?;
    Ok(HttpResponse::Ok().json(teleconsultation))
}

pub async fn delete_teleconsultation(
    store: web::Data<dyn Store>,
    id: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    blocking(store, move |s| s.delete_teleconsultation(id)).await?;
    tracing::info!(teleconsultation_id = id, "teleconsultation deleted");
    Ok(HttpResponse::NoContent().finish())
}
