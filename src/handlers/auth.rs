use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use super::blocking;
use crate::auth::{AuthenticatedUser, TokenService, hash_password, verify_password};
use crate::error::ApiError;
use crate::models::{NewPatient, NewStaff, NewUser, empty_as_none, flexible_date};
use crate::store::{AccountProfile, Store, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Patient,
    Staff,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(rename = "userType", alias = "user_type")]
    pub user_type: UserType,
    #[validate(length(min = 3, message = "full_name must have at least 3 characters"))]
    pub full_name: String,
    #[validate(email(message = "email must be valid"))]
    pub email: String,
    #[validate(length(min = 6, message = "password must have at least 6 characters"))]
    pub password: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub cpf: Option<String>,
    #[serde(default, deserialize_with = "flexible_date::deserialize_option")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub registration_number: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub specialization: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub role: Option<String>,
}

fn required<T>(value: Option<T>, field: &str, user_type: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::BadRequest(format!("{field} is required for {user_type} registration")))
}

impl RegisterRequest {
    // Role stored on the user row plus the profile created alongside it
    fn into_profile(self) -> Result<(String, AccountProfile), ApiError> {
        match self.user_type {
            UserType::Patient => {
                let patient = NewPatient {
                    user_id: None,
                    full_name: self.full_name,
                    cpf: required(self.cpf, "cpf", "patient")?,
                    birth_date: required(self.birth_date, "birth_date", "patient")?,
                    gender: required(self.gender, "gender", "patient")?,
                    email: Some(self.email),
                    phone: self.phone,
                    address: self.address,
                    avatar: None,
                };
                patient.validate()?;
                Ok(("patient".to_string(), AccountProfile::Patient(patient)))
            }
            UserType::Staff => {
                let role = required(self.role, "role", "staff")?;
                let member = NewStaff {
                    user_id: None,
                    full_name: self.full_name,
                    registration_number: required(self.registration_number, "registration_number", "staff")?,
                    role: role.clone(),
                    specialization: self.specialization,
                    email: self.email,
                    phone: self.phone,
                    birth_date: self.birth_date,
                    gender: self.gender,
                    address: self.address,
                    avatar: None,
                    available_schedule: None,
                };
                member.validate()?;
                Ok((role, AccountProfile::Staff(member)))
            }
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    // Malformed addresses fall through to the unknown-email lookup
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: String,
    #[serde(rename = "staffId")]
    pub staff_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user: SessionUser,
}

// Handler to register a user together with its patient or staff profile
pub async fn register(
    store: web::Data<dyn Store>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    body.validate()?;

    let email = body.email.clone();
    let lookup = email.clone();
    if blocking(store.clone(), move |s| s.find_user_by_email(&lookup)).await?.is_some() {
        return Err(ApiError::Conflict("User already exists".into()));
    }

    let name = body.full_name.clone();
    let password = body.password.clone();
    let (role, profile) = body.into_profile()?;

    let password_hash = web::block(move || hash_password(&password))
        .await?
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {e}")))?;

    let user = NewUser { name, email, password_hash, role, avatar: None };
    let created = blocking(store, move |s| s.create_account(user, profile)).await?;
    tracing::info!(user_id = created.id, role = %created.role, "user registered");

    Ok(HttpResponse::Created().json(json!({ "message": "User registered successfully" })))
}

// Handler to exchange credentials for a session token
pub async fn login(
    store: web::Data<dyn Store>,
    tokens: web::Data<TokenService>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();
    request.validate()?;
    let LoginRequest { email, password } = request;

    let lookup = email.clone();
    let user = blocking(store.clone(), move |s| s.find_user_by_email(&lookup))
        .await?
        .ok_or_else(|| {
            tracing::warn!(%email, "login for unknown email");
            ApiError::not_found("User")
        })?;

    let stored_hash = user.password_hash.clone();
    if !web::block(move || verify_password(&password, &stored_hash)).await? {
        tracing::warn!(user_id = user.id, "login with wrong password");
        return Err(ApiError::Unauthorized("Invalid password".into()));
    }

    let staff_id = if user.role == "patient" {
        None
    } else {
        let user_id = user.id;
        blocking(store, move |s| match s.get_staff_by_user(user_id) {
            Ok(member) => Ok(Some(member.id)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        })
        .await?
    };

    let token = tokens
        .issue(user.id, &user.email)
        .map_err(|e| ApiError::Internal(e.into()))?;
    tracing::info!(user_id = user.id, "user logged in");

    Ok(HttpResponse::Ok().json(LoginResponse {
        message: "Login successful".into(),
        token,
        user: SessionUser {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            staff_id,
        },
    }))
}

// Handler to describe the caller's own account
pub async fn me(store: web::Data<dyn Store>, caller: AuthenticatedUser) -> Result<HttpResponse, ApiError> {
    let user = blocking(store, move |s| s.find_user(caller.id)).await?;
    Ok(HttpResponse::Ok().json(json!({
        "id": user.id,
        "name": user.name,
        "email": user.email,
        "role": user.role,
    })))
}
