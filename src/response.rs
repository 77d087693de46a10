use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::warn;

use crate::users::{error::DomainError, validation::FieldError};

/// Success envelope: `{status:"success", message, data, pagination?}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize, P: Serialize = ()> {
    pub status: &'static str,
    pub message: String,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<P>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success",
            message: message.into(),
            data,
            pagination: None,
        }
    }
}

impl<T: Serialize, P: Serialize> ApiResponse<T, P> {
    pub fn paginated(message: impl Into<String>, data: T, pagination: P) -> Self {
        Self {
            status: "success",
            message: message.into(),
            data,
            pagination: Some(pagination),
        }
    }
}

/// Error envelope: `{status:"error", message, errors?}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

/// Handler-level failure, rendered with the error envelope.
#[derive(Debug)]
pub enum ApiError {
    Validation(Vec<FieldError>),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    MethodNotAllowed,
    Timeout,
    Internal,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Timeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NotFound { .. } => ApiError::NotFound("User not found".into()),
            DomainError::Conflict { .. } => {
                ApiError::Conflict("A user with this email already exists".into())
            }
            DomainError::Internal => ApiError::Internal,
        }
    }
}

impl From<Vec<FieldError>> for ApiError {
    fn from(errors: Vec<FieldError>) -> Self {
        ApiError::Validation(errors)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(error = %rejection.body_text(), "rejected request body");
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        warn!(error = %rejection.body_text(), "rejected query string");
        ApiError::BadRequest("Invalid query parameters".into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (message, errors) = match self {
            ApiError::Validation(errors) => ("Validation failed".to_string(), Some(errors)),
            ApiError::BadRequest(m) | ApiError::NotFound(m) | ApiError::Conflict(m) => (m, None),
            ApiError::MethodNotAllowed => ("Method not allowed".to_string(), None),
            ApiError::Timeout => ("Request timed out".to_string(), None),
            // details were logged where the failure happened
            ApiError::Internal => ("Internal server error".to_string(), None),
        };
        (
            status,
            Json(ErrorBody {
                status: "error",
                message,
                errors,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_omits_pagination() {
        let json = serde_json::to_value(ApiResponse::success("ok", 1)).unwrap();
        assert_eq!(json, serde_json::json!({"status": "success", "message": "ok", "data": 1}));
    }

    #[test]
    fn validation_error_lists_fields() {
        let resp = ApiError::Validation(vec![FieldError::new("email", "Email is required")])
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn internal_error_body_is_generic() {
        let resp = ApiError::from(DomainError::Internal).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "error", "message": "Internal server error"})
        );
    }

    #[test]
    fn domain_errors_map_to_statuses() {
        let id = uuid::Uuid::new_v4();
        assert_eq!(
            ApiError::from(DomainError::not_found(id)).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(DomainError::conflict("a@b.co")).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(DomainError::Internal).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
