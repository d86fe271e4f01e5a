//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps domain errors from bloodnet-state and bloodnet-core to HTTP status
//! codes with a single JSON body shape:
//!
//! ```json
//! { "success": false, "message": "...", "errors": [{ "field": "...", "message": "..." }] }
//! ```
//!
//! Debug builds add a `stack` field carrying the error's debug rendering.
//! Internal error details are never returned to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bloodnet_core::ValidationError;
use bloodnet_state::{AccountError, DonationError, InventoryError, RequestError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl From<&ValidationError> for FieldError {
    fn from(err: &ValidationError) -> Self {
        Self {
            field: err.field().to_string(),
            message: err.reason(),
        }
    }
}

/// JSON error response body shared by every endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Always `false`.
    pub success: bool,
    pub message: String,
    /// Per-field details for validation failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    /// Debug rendering of the error. Present in development builds only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            errors: None,
            stack: None,
        }
    }
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Input or business-rule violation (400).
    #[error("{message}")]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },

    /// Body or query string could not be parsed (400).
    #[error("{0}")]
    BadRequest(String),

    /// Missing, invalid or expired credentials (401).
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated, but the role or ownership check failed (403).
    #[error("{0}")]
    Forbidden(String),

    /// Referenced entity absent or identifier malformed (404).
    #[error("{0}")]
    NotFound(String),

    /// Infrastructure failure (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// A validation failure without per-field details.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            errors: Vec::new(),
        }
    }

    /// Return the HTTP status code and a short error kind for logging.
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Validation { .. } => (StatusCode::BAD_REQUEST, "validation"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();

        let message = match &self {
            Self::Internal(_) => {
                tracing::error!(error = %self, "internal server error");
                "Server Error".to_string()
            }
            other => {
                tracing::debug!(kind, error = %other, "request rejected");
                other.to_string()
            }
        };

        let errors = match &self {
            Self::Validation { errors, .. } if !errors.is_empty() => Some(errors.clone()),
            _ => None,
        };

        let stack = if cfg!(debug_assertions) && !matches!(self, Self::Internal(_)) {
            Some(format!("{self:?}"))
        } else {
            None
        };

        let body = ErrorBody {
            success: false,
            message,
            errors,
            stack,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Validation {
            message: err.to_string(),
            errors: vec![FieldError::from(&err)],
        }
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Invalid(errors) if errors.len() == 1 => Self::from(errors[0].clone()),
            AccountError::Invalid(errors) => Self::Validation {
                message: "Validation failed".to_string(),
                errors: errors.iter().map(FieldError::from).collect(),
            },
            other @ AccountError::NotADonor { .. } => Self::validation(other.to_string()),
            other @ AccountError::PasswordHash(_) => Self::Internal(other.to_string()),
        }
    }
}

impl From<InventoryError> for AppError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::Validation(v) => Self::from(v),
            other => Self::validation(other.to_string()),
        }
    }
}

impl From<DonationError> for AppError {
    fn from(err: DonationError) -> Self {
        match err {
            DonationError::Validation(v) => Self::from(v),
            DonationError::DonorNotFound { .. } => Self::NotFound("Donor not found".to_string()),
            other @ DonationError::NotEligible { .. } => Self::validation(other.to_string()),
        }
    }
}

impl From<RequestError> for AppError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::Validation(v) => Self::from(v),
            other => Self::validation(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(format!("database error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bloodnet_core::AccountId;
    use bloodnet_state::RequestStatus;
    use http_body_util::BodyExt;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn validation_status_code() {
        let (status, kind) = AppError::validation("bad field").status_and_kind();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(kind, "validation");
    }

    #[test]
    fn bad_request_status_code() {
        let (status, _) = AppError::BadRequest("malformed JSON".into()).status_and_kind();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unauthorized_status_code() {
        let (status, _) = AppError::Unauthorized("no token".into()).status_and_kind();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn forbidden_status_code() {
        let (status, _) = AppError::Forbidden("not yours".into()).status_and_kind();
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn not_found_status_code() {
        let (status, _) = AppError::NotFound("missing".into()).status_and_kind();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn internal_status_code() {
        let (status, _) = AppError::Internal("db down".into()).status_and_kind();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn internal_message_is_hidden() {
        let (status, body) = body_json(AppError::Internal("password=hunter2".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Server Error");
        assert!(!body.to_string().contains("hunter2"));
    }

    #[tokio::test]
    async fn validation_error_carries_field_details() {
        let err = AppError::from(ValidationError::MissingField { field: "email" });
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "email is required");
        assert_eq!(body["errors"][0]["field"], "email");
    }

    #[tokio::test]
    async fn plain_errors_omit_errors_field() {
        let (_, body) = body_json(AppError::Forbidden("nope".into())).await;
        assert!(body.get("errors").is_none());
        assert_eq!(body["message"], "nope");
    }

    #[test]
    fn account_errors_collect_all_fields() {
        let err = AppError::from(AccountError::Invalid(vec![
            ValidationError::MissingField { field: "name" },
            ValidationError::invalid("phone", "must be 10 digits"),
        ]));
        match err {
            AppError::Validation { message, errors } => {
                assert_eq!(message, "Validation failed");
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[1].field, "phone");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_donor_maps_to_not_found() {
        let err = AppError::from(DonationError::DonorNotFound {
            donor_id: AccountId::new(),
        });
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn ineligible_donor_maps_to_validation() {
        let err = AppError::from(DonationError::NotEligible {
            donor_id: AccountId::new(),
            days_remaining: 12,
        });
        assert!(matches!(err, AppError::Validation { .. }));
        assert!(err.to_string().contains("12 days remaining"));
    }

    #[test]
    fn terminal_request_maps_to_validation() {
        let err = AppError::from(RequestError::InvalidTransition {
            from: RequestStatus::Approved,
            to: RequestStatus::Rejected,
        });
        assert!(matches!(err, AppError::Validation { .. }));
    }
}
