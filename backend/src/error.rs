//! # Ledger Errors
//!
//! One error type for every service operation. Handlers return
//! `Result<HttpResponse, LedgerError>` and actix renders the error through
//! [`ResponseError`] as the uniform envelope:
//!
//! ```json
//! {
//!     "status": "error",
//!     "statusCode": 409,
//!     "title": "Conflict",
//!     "message": "Task already completed"
//! }
//! ```

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::db::DatabaseError;
use crate::models::ApiResponse;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),

    /// User, task, withdrawal, level or config absent.
    #[error("{0}")]
    NotFound(String),

    /// No or invalid caller identity.
    #[error("{0}")]
    Unauthorized(String),

    /// Already completed, already processed, duplicate key.
    #[error("{0}")]
    Conflict(String),

    /// A debit would take the wallet below zero.
    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: Decimal, requested: Decimal },

    /// The withdrawal window rejected the request.
    #[error("Withdrawal not allowed: {0}")]
    WithdrawalNotAllowed(String),

    /// Storage failure or broken invariant.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Short human title shown in the envelope.
    pub fn title(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "Validation Error",
            LedgerError::NotFound(_) => "Not Found",
            LedgerError::Unauthorized(_) => "Unauthorized",
            LedgerError::Conflict(_) => "Conflict",
            LedgerError::InsufficientBalance { .. } => "Insufficient Balance",
            LedgerError::WithdrawalNotAllowed(_) => "Withdrawal Not Allowed",
            LedgerError::Internal(_) => "Internal Server Error",
        }
    }
}

impl From<DatabaseError> for LedgerError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::UniqueViolation(constraint) => {
                LedgerError::Conflict(format!("Duplicate record ({})", constraint))
            }
            DatabaseError::NotFound(what) => LedgerError::NotFound(what),
            other => LedgerError::Internal(other.to_string()),
        }
    }
}

impl From<tokio_postgres::Error> for LedgerError {
    fn from(e: tokio_postgres::Error) -> Self {
        DatabaseError::from(e).into()
    }
}

impl ResponseError for LedgerError {
    fn status_code(&self) -> StatusCode {
        match self {
            LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            LedgerError::Conflict(_) => StatusCode::CONFLICT,
            LedgerError::InsufficientBalance { .. } => StatusCode::BAD_REQUEST,
            LedgerError::WithdrawalNotAllowed(_) => StatusCode::BAD_REQUEST,
            LedgerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        let message = match self {
            LedgerError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                "Something went wrong, please try again later".to_string()
            }
            other => {
                tracing::warn!("{}: {}", other.title(), other);
                other.to_string()
            }
        };

        HttpResponse::build(status).json(ApiResponse::<()>::error(status, self.title(), &message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_codes() {
        assert_eq!(LedgerError::Validation("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(LedgerError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(LedgerError::Unauthorized("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(LedgerError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            LedgerError::InsufficientBalance { available: dec!(1), requested: dec!(2) }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(LedgerError::Internal("x".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unique_violation_maps_to_conflict() {
        let err: LedgerError = DatabaseError::UniqueViolation("task_completions_user_task_key".into()).into();
        assert!(matches!(err, LedgerError::Conflict(_)));
    }

    #[actix_rt::test]
    async fn test_error_envelope_hides_internal_detail() {
        let response = LedgerError::Internal("connection reset by peer".into()).error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["statusCode"], 500);
        assert_eq!(json["title"], "Internal Server Error");
        assert!(!json["message"].as_str().unwrap().contains("connection reset"));
        assert!(json.get("data").is_none());
    }
}
