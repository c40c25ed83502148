use actix_web::{HttpResponse, web};
use validator::Validate;

use super::blocking;
use crate::error::ApiError;
use crate::models::NewMedication;
use crate::store::Store;

pub async fn list_medications(store: web::Data<dyn Store>) -> Result<HttpResponse, ApiError> {
    let medications = blocking(store, |s| s.list_medications()).await?;
    Ok(HttpResponse::Ok().json(medications))
}

pub async fn get_medication(store: web::Data<dyn Store>, id: web::Path<i32>) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    let medication = blocking(store, move |s| s.get_medication(id)).await?;
    Ok(HttpResponse::Ok().json(medication))
}

pub async fn create_medication(
    store: web::Data<dyn Store>,
    body: web::Json<NewMedication>,
) -> Result<HttpResponse, ApiError> {
    let new_medication = body.into_inner();
    new_medication.validate()?;

    let medication = blocking(store, move |s| s.create_medication(new_medication)).await?;
    tracing::info!(medication_id = medication.id, name = %medication.name, "medication created");
    Ok(HttpResponse::Created().json(medication))
}
