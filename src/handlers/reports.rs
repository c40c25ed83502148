use actix_web::{HttpResponse, web};
use validator::Validate;

use super::blocking;
use crate::error::ApiError;
use crate::models::{NewReport, UpdateReport};
use crate::store::Store;

pub async fn list_reports(store: web::Data<dyn Store>) -> Result<HttpResponse, ApiError> {
    let reports = blocking(store, |s| s.list_reports()).await?;
    Ok(HttpResponse::Ok().json(reports))
}

pub async fn get_report(store: web::Data<dyn Store>, id: web::Path<i32>) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    let report = blocking(store, move |s| s.get_report(id)).await?;
    Ok(HttpResponse::Ok().json(report))
}

pub async fn create_report(store: web::Data<dyn Store>, body: web::Json<NewReport>) -> Result<HttpResponse, ApiError> {
    let new_report = body.into_inner();
    new_report.validate()?;

    let report = blocking(store, move |s| s.create_report(new_report)).await?;
    tracing::info!(report_id = report.id, "report created");
    Ok(HttpResponse::Created().json(report))
}

pub async fn update_report(
    store: web::Data<dyn Store>,
    id: web::Path<i32>,
    body: web::Json<UpdateReport>,
) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    let changes = body.into_inner();
    changes.validate()?;

    let report = blocking(store, move |s| s.update_report(id, changes)).await?;
    Ok(HttpResponse::Ok().json(report))
}

pub async fn delete_report(store: web::Data<dyn Store>, id: web::Path<i32>) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    blocking(store, move |s| s.delete_report(id)).await?;
    tracing::info!(report_id = id, "report deleted");
    Ok(HttpResponse::NoContent().finish())
}
