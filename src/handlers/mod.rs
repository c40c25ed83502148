use actix_web::web;

use crate::error::ApiError;
use crate::store::{Store, StoreError, StoreResult};

pub mod appointments;
pub mod auth;
pub mod dashboard;
pub mod exams;
pub mod medications;
pub mod patients;
pub mod prescriptions;
pub mod reports;
pub mod staff;
pub mod telemedicine;

// Runs a store call on the blocking pool
pub(crate) async fn blocking<T, F>(store: web::Data<dyn Store>, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&dyn Store) -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(web::block(move || f(store.get_ref())).await??)
}

// Resolves a doctor for appointment-like bodies, with the client-facing message
pub(crate) fn doctor_lookup(store: &dyn Store, doctor_id: i32) -> StoreResult<Option<crate::models::Staff>> {
    match store.get_staff(doctor_id) {
        Ok(doctor) => Ok(Some(doctor)),
        Err(StoreError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

pub(crate) fn doctor_not_found() -> ApiError {
    ApiError::NotFound("Doctor not found".into())
}
