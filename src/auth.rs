//! Token issuing, password hashing and the bearer-token middleware.

use std::future::{Ready, ready};

use actix_web::body::EitherBody;
use actix_web::dev::{Payload, Service, ServiceRequest, ServiceResponse, Transform, forward_ready};
use actix_web::{FromRequest, HttpMessage, HttpRequest, ResponseError, http::header, web};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng};
use argon2::Argon2;
use chrono::{Duration, Utc};
use futures::future::LocalBoxFuture;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: i32,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies HS256 session tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, user_id: i32, email: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let issued_at = Utc::now();
        let claims = Claims {
            id: user_id,
            email: email.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::default(), claims, &self.encoding)
    }

    // Checks signature and expiry
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding, &Validation::default()).map(|data| data.claims)
    }
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

// A malformed stored hash counts as a mismatch
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Identity attached to a request by [`Authenticate`].
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    pub id: i32,
    pub email: String,
}

impl FromRequest for AuthenticatedUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthenticatedUser>()
                .cloned()
                .ok_or_else(|| ApiError::Unauthorized("No token provided".into())),
        )
    }
}

fn bearer_token(req: &ServiceRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn authorize(req: &ServiceRequest) -> Result<AuthenticatedUser, ApiError> {
    let tokens = req
        .app_data::<web::Data<TokenService>>()
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("token service not configured")))?;
    let token = bearer_token(req).ok_or_else(|| ApiError::Unauthorized("No token provided".into()))?;
    let claims = tokens.verify(token).map_err(|e| {
        tracing::warn!(error = %e, path = %req.path(), "rejected bearer token");
        ApiError::Unauthorized("Invalid token".into())
    })?;
    Ok(AuthenticatedUser { id: claims.id, email: claims.email })
}

/// Middleware rejecting requests without a valid bearer token.
pub struct Authenticate;

impl<S, B> Transform<S, ServiceRequest> for Authenticate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type Transform = AuthenticateMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthenticateMiddleware { service }))
    }
}

pub struct AuthenticateMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AuthenticateMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        match authorize(&req) {
            Ok(user) => {
                req.extensions_mut().insert(user);
                let fut = self.service.call(req);
                Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
            }
            Err(err) => {
                let response = req.into_response(err.error_response()).map_into_right_body();
                Box::pin(async move { Ok(response) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("test-secret", Duration::hours(168))
    }

    #[test]
    fn issued_token_verifies() {
        let tokens = service();
        let token = tokens.issue(7, "dr.ana@vidaplus.com").unwrap();
        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.id, 7);
        assert_eq!(claims.email, "dr.ana@vidaplus.com");
        assert_eq!(claims.exp - claims.iat, 168 * 3600);
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let token = TokenService::new("other-secret", Duration::hours(1)).issue(1, "a@b.com").unwrap();
        assert!(service().verify(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = service();
        let past = Utc::now() - Duration::hours(2);
        let claims = Claims {
            id: 1,
            email: "admin@vidaplus.com".into(),
            iat: (past - Duration::hours(1)).timestamp(),
            exp: past.timestamp(),
        };
        let token = tokens.sign(&claims).unwrap();
        assert!(tokens.verify(&token).is_err());
    }

    #[test]
    fn password_round_trip() {
        let hash = hash_password("password123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("password123", &hash));
        assert!(!verify_password("password124", &hash));
        assert!(!verify_password("password123", "not-a-phc-string"));
    }

    #[test]
    fn bcrypt_hashes_are_not_accepted() {
        let legacy = "$2b$10$N9qo8uLOickgx2ZMRZoMyeIjZAgcfl7p92ldGxad68LJZdL17lhWy";
        assert!(!verify_password("password123", legacy));
    }
}
