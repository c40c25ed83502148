use actix_web::{HttpResponse, web};
use validator::Validate;

use super::{blocking, doctor_lookup, doctor_not_found};
use crate::error::ApiError;
use crate::models::{NewAppointment, UpdateAppointment};
use crate::store::Store;

// Handler to list appointments in date order with patient and doctor summaries
pub async fn list_appointments(store: web::Data<dyn Store>) -> Result<HttpResponse, ApiError> {
    let appointments = blocking(store, |s| s.list_appointments()).await?;
    Ok(HttpResponse::Ok().json(appointments))
}

pub async fn get_appointment(store: web::Data<dyn Store>, id: web::Path<i32>) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    let appointment = blocking(store, move |s| s.get_appointment(id)).await?;
    Ok(HttpResponse::Ok().json(appointment))
}

// Handler to book an appointment; the doctor's name is copied onto the row
pub async fn create_appointment(
    store: web::Data<dyn Store>,
    body: web::Json<NewAppointment>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();
    request.validate()?;

    let created = blocking(store, move |s| {
        let Some(doctor) = doctor_lookup(s, request.doctor_id)? else {
            return Ok(None);
        };
        s.create_appointment(request.into_record(doctor.full_name)).map(Some)
    })
    .await?
    .ok_or_else(doctor_not_found)?;

    tracing::info!(
        appointment_id = created.id,
        patient_id = created.patient_id,
        doctor_id = created.doctor_id,
        "appointment created"
    );
    Ok(HttpResponse::Created().json(created))
}

pub async fn update_appointment(
    store: web::Data<dyn Store>,
    id: web::Path<i32>,
    body: web::Json<UpdateAppointment>,
) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    let mut changes = body.into_inner();
    changes.validate()?;

    let updated = blocking(store, move |s| {
        if let Some(doctor_id) = changes.doctor_id {
            let Some(doctor) = doctor_lookup(s, doctor_id)? else {
                return Ok(None);
            };
            changes.doctor_name = Some(doctor.full_name);
        }
        s.update_appointment(id, changes).map(Some)
    })
    .await?
    .ok_or_else(doctor_not_found)?;

    Ok(HttpResponse::Ok().json(updated))
}

pub async fn delete_appointment(store: web::Data<dyn Store>, id: web::Path<i32>) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    blocking(store, move |s| s.delete_appointment(id)).await?;
    tracing::info!(appointment_id = id, "appointment deleted");
    Ok(HttpResponse::NoContent().finish())
}
