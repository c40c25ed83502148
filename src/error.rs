use actix_web::{HttpRequest, HttpResponse, ResponseError, error, http::StatusCode};
use serde_json::json;
use validator::ValidationErrors;

use crate::store::StoreError;

/// Error returned by every handler; rendered as `{"message": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal Server Error")]
    Internal(#[source] anyhow::Error),
}

impl ApiError {
    pub fn not_found(entity: &str) -> Self {
        ApiError::NotFound(format!("{entity} not found"))
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ApiError::Internal(cause) = self {
            tracing::error!(error = ?cause, "request failed");
        }
        HttpResponse::build(self.status_code()).json(json!({ "message": self.to_string() }))
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(entity) => ApiError::not_found(entity),
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            StoreError::InvalidReference(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.into()),
        }
    }
}

impl From<error::BlockingError> for ApiError {
    fn from(err: error::BlockingError) -> Self {
        ApiError::Internal(anyhow::anyhow!("blocking task failed: {err}"))
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);
        let details: Vec<String> = fields
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => format!("{field}: {msg}"),
                    None => format!("{field}: invalid value ({})", e.code),
                })
            })
            .collect();
        ApiError::BadRequest(format!("Validation failed: {}", details.join("; ")))
    }
}

// Extractor error handlers so malformed input gets the same JSON shape

pub fn json_error_handler(err: error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::BadRequest(format!("Invalid request body: {err}")).into()
}

pub fn path_error_handler(err: error::PathError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::BadRequest(format!("Invalid path parameter: {err}")).into()
}

pub fn query_error_handler(err: error::QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::BadRequest(format!("Invalid query string: {err}")).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use validator::Validate;

    #[derive(Validate)]
    struct Probe {
        #[validate(length(min = 3, message = "too short"))]
        name: String,
    }

    #[test]
    fn store_errors_map_to_statuses() {
        let cases = [
            (StoreError::NotFound("Patient"), StatusCode::NOT_FOUND),
            (StoreError::Conflict("CPF already registered".into()), StatusCode::CONFLICT),
            (StoreError::InvalidReference("unknown patient".into()), StatusCode::BAD_REQUEST),
            (StoreError::Pool("exhausted".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn validation_errors_name_the_field() {
        let err = ApiError::from(Probe { name: "ab".into() }.validate().unwrap_err());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Validation failed: name: too short");
    }

    #[actix_web::test]
    async fn body_is_json_message() {
        let response = ApiError::not_found("Exam").error_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "Exam not found");
    }

    #[actix_web::test]
    async fn internal_errors_hide_details() {
        let response = ApiError::Internal(anyhow::anyhow!("connection refused")).error_response();
        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "Internal Server Error");
    }
}
