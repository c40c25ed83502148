use actix_web::{HttpResponse, web};
use validator::Validate;

use super::blocking;
use crate::error::ApiError;
use crate::models::{NewStaff, UpdateStaff};
use crate::store::Store;

pub async fn list_staff(store: web::Data<dyn Store>) -> Result<HttpResponse, ApiError> {
    let members = blocking(store, |s| s.list_staff()).await?;
    Ok(HttpResponse::Ok().json(members))
}

pub async fn get_staff(store: web::Data<dyn Store>, id: web::Path<i32>) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    let member = blocking(store, move |s| s.get_staff(id)).await?;
    Ok(HttpResponse::Ok().json(member))
}

// Handler to get the staff profile linked to a user account
pub async fn get_staff_by_user(
    store: web::Data<dyn Store>,
    user_id: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let user_id = user_id.into_inner();
    let member = blocking(store, move |s| s.get_staff_by_user(user_id)).await?;
    Ok(HttpResponse::Ok().json(member))
}

pub async fn create_staff(store: web::Data<dyn Store>, body: web::Json<NewStaff>) -> Result<HttpResponse, ApiError> {
    let new_member = body.into_inner();
    new_member.validate()?;

    let member = blocking(store, move |s| s.create_staff(new_member)).await?;
    tracing::info!(staff_id = member.id, role = %member.role, "staff member created");
    Ok(HttpResponse::Created().json(member))
}

pub async fn update_staff(
    store: web::Data<dyn Store>,
    id: web::Path<i32>,
    body: web::Json<UpdateStaff>,
) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    let changes = body.into_inner();
    changes.validate()?;

    let member = blocking(store, move |s| s.update_staff(id, changes)).await?;
    Ok(HttpResponse::Ok().json(member))
}

pub async fn delete_staff(store: web::Data<dyn Store>, id: web::Path<i32>) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    blocking(store, move |s| s.delete_staff(id)).await?;
    tracing::info!(staff_id = id, "staff member deleted");
    Ok(HttpResponse::NoContent().finish())
}
