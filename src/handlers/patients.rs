use actix_web::{HttpResponse, web};
use validator::Validate;

use super::blocking;
use crate::error::ApiError;
use crate::models::{NewPatient, UpdatePatient};
use crate::store::Store;

// Handler to list every patient with their appointments
pub async fn list_patients(store: web::Data<dyn Store>) -> Result<HttpResponse, ApiError> {
    let patients = blocking(store, |s| s.list_patients()).await?;
    Ok(HttpResponse::Ok().json(patients))
}

// Handler to get a patient with exams, allergies, conditions and medications
pub async fn get_patient(store: web::Data<dyn Store>, id: web::Path<i32>) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    let patient = blocking(store, move |s| s.get_patient(id)).await?;
    Ok(HttpResponse::Ok().json(patient))
}

// Handler to create a new patient
pub async fn create_patient(
    store: web::Data<dyn Store>,
    body: web::Json<NewPatient>,
) -> Result<HttpResponse, ApiError> {
    let new_patient = body.into_inner();
    new_patient.validate()?;

    let patient = blocking(store, move |s| s.create_patient(new_patient)).await?;
    tracing::info!(patient_id = patient.id, "patient created");
    Ok(HttpResponse::Created().json(patient))
}

pub async fn update_patient(
    store: web::Data<dyn Store>,
    id: web::Path<i32>,
    body: web::Json<UpdatePatient>,
) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    let changes = body.into_inner();
    changes.validate()?;

    let patient = blocking(store, move |s| s.update_patient(id, changes)).await?;
    Ok(HttpResponse::Ok().json(patient))
}

pub async fn delete_patient(store: web::Data<dyn Store>, id: web::Path<i32>) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    blocking(store, move |s| s.delete_patient(id)).await?;
    tracing::info!(patient_id = id, "patient deleted");
    Ok(HttpResponse::NoContent().finish())
}
