use actix_web::{HttpResponse, web};

use super::blocking;
use crate::dashboard::{DashboardInput, summarize};
use crate::error::ApiError;
use crate::models::now;
use crate::store::Store;

// Handler to compute the dashboard aggregates
pub async fn summary(store: web::Data<dyn Store>) -> Result<HttpResponse, ApiError> {
    let input = blocking(store, |s| {
        Ok(DashboardInput {
            patients: s.count_patients()?,
            exams: s.count_exams()?,
            prescriptions: s.count_prescriptions()?,
            staff: s.list_staff()?,
            appointments: s.list_appointments()?,
            teleconsultations: s.list_teleconsultations(None)?,
        })
    })
    .await?;

    Ok(HttpResponse::Ok().json(summarize(input, now())))
}
