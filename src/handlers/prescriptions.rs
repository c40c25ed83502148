use actix_web::{HttpResponse, web};
use validator::Validate;

use super::blocking;
use crate::error::ApiError;
use crate::models::{NewPrescription, UpdatePrescription};
use crate::store::Store;

// Handler to list prescriptions with patient, doctor and medication names
pub async fn list_prescriptions(store: web::Data<dyn Store>) -> Result<HttpResponse, ApiError> {
    let prescriptions = blocking(store, |s| s.list_prescriptions()).await?;
    Ok(HttpResponse::Ok().json(prescriptions))
}

pub async fn get_prescription(store: web::Data<dyn Store>, id: web::Path<i32>) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    let prescription = blocking(store, move |s| s.get_prescription(id)).await?;
    Ok(HttpResponse::Ok().json(prescription))
}

pub async fn create_prescription(
    store: web::Data<dyn Store>,
    body: web::Json<NewPrescription>,
) -> Result<HttpResponse, ApiError> {
    let new_prescription = body.into_inner();
    new_prescription.validate()?;

    let prescription = blocking(store, move |s| s.create_prescription(new_prescription)).await?;
    tracing::info!(
        prescription_id = prescription.id,
        patient_id = prescription.patient_id,
        "prescription created"
    );
    Ok(HttpResponse::Created().json(prescription))
}

pub async fn update_prescription(
    store: web::Data<dyn Store>,
    id: web::Path<i32>,
    body: web::Json<UpdatePrescription>,
) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    let changes = body.into_inner();
    changes.validate()?;

    let prescription = blocking(store, move |s| s.update_prescription(id, changes)).await?;
    Ok(HttpResponse::Ok().json(prescription))
}

pub async fn delete_prescription(
    store: web::Data<dyn Store>,
    id: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    blocking(store, move |s| s.delete_prescription(id)).await?;
    tracing::info!(prescription_id = id, "prescription deleted");
    Ok(HttpResponse::NoContent().finish())
}
