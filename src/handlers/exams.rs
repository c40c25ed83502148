use actix_web::{HttpResponse, web};
use validator::Validate;

use super::blocking;
use crate::error::ApiError;
use crate::models::{NewExam, UpdateExam};
use crate::store::Store;

pub async fn list_exams(store: web::Data<dyn Store>) -> Result<HttpResponse, ApiError> {
    let exams = blocking(store, |s| s.list_exams()).await?;
    Ok(HttpResponse::Ok().json(exams))
}

pub async fn get_exam(store: web::Data<dyn Store>, id: web::Path<i32>) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    let exam = blocking(store, move |s| s.get_exam(id)).await?;
    Ok(HttpResponse::Ok().json(exam))
}

// Handler to request an exam for a patient
pub async fn create_exam(store: web::Data<dyn Store>, body: web::Json<NewExam>) -> Result<HttpResponse, ApiError> {
    let new_exam = body.into_inner();
    new_exam.validate()?;

    let exam = blocking(store, move |s| s.create_exam(new_exam)).await?;
    tracing::info!(exam_id = exam.id, patient_id = exam.patient_id, urgency = %exam.urgency, "exam created");
    Ok(HttpResponse::Created().json(exam))
}

pub async fn update_exam(
    store: web::Data<dyn Store>,
    id: web::Path<i32>,
    body: web::Json<UpdateExam>,
) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    let changes = body.into_inner();
    changes.validate()?;

    let exam = blocking(store, move |s| s.update_exam(id, changes)).await?;
    Ok(HttpResponse::Ok().json(exam))
}

pub async fn delete_exam(store: web::Data<dyn Store>, id: web::Path<i32>) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    blocking(store, move |s| s.delete_exam(id)).await?;
    tracing::info!(exam_id = id, "exam deleted");
    Ok(HttpResponse::NoContent().finish())
}
