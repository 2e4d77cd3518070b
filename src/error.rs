use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str, String),
    Forbidden(&'static str, String),
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    Conflict(&'static str, String),
    Internal(String),
}

impl ApiError {
    pub fn session_expired() -> Self {
        ApiError::Unauthorized("SESSION_EXPIRED", "Session expired".into())
    }

    fn to_error_response(code: &str, message: &str) -> Json<ErrorResponse> {
        Json(ErrorResponse {
            error: ErrorObject {
                code: code.to_string(),
                message: message.to_string(),
            },
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(code, msg) => {
                (StatusCode::UNAUTHORIZED, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Forbidden(code, msg) => {
                (StatusCode::FORBIDDEN, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::BadRequest(code, msg) => {
                (StatusCode::BAD_REQUEST, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::NotFound(code, msg) => {
                (StatusCode::NOT_FOUND, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Conflict(code, msg) => {
                (StatusCode::CONFLICT, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::to_error_response("INTERNAL", &msg),
            )
                .into_response(),
        }
    }
}

/// Failures of the queue dispatcher and its store.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    IncompleteData(String),
    #[error("{0}")]
    Validation(String),
    /// A concurrent write won the race; the transaction may be retried.
    #[error("{0}")]
    Conflict(String),
    #[error("a ticket was already issued for appointment {0}")]
    TicketExists(Uuid),
    #[error("db error: {0}")]
    Store(String),
}

impl QueueError {
    /// Manual status change that would put a second ticket in service.
    pub fn already_in_check() -> Self {
        QueueError::Conflict("another ticket is already in check for this room today".into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, QueueError::Conflict(_))
    }
}

// 40001 serialization_failure, 40P01 deadlock_detected
const RETRYABLE_SQLSTATES: [&str; 2] = ["40001", "40P01"];

impl From<sqlx::Error> for QueueError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            let retryable = db_err
                .code()
                .is_some_and(|code| RETRYABLE_SQLSTATES.iter().any(|c| code == *c));
            if retryable || db_err.is_unique_violation() {
                return QueueError::Conflict(format!("concurrent queue update: {}", db_err.message()));
            }
        }
        QueueError::Store(e.to_string())
    }
}

impl From<QueueError> for ApiError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::NotFound(msg) => ApiError::NotFound("NOT_FOUND", msg),
            QueueError::IncompleteData(msg) => ApiError::NotFound("INCOMPLETE_DATA", msg),
            QueueError::Validation(msg) => ApiError::BadRequest("VALIDATION_ERROR", msg),
            QueueError::Conflict(msg) => ApiError::Conflict("CONFLICT", msg),
            e @ QueueError::TicketExists(_) => ApiError::Conflict("TICKET_EXISTS", e.to_string()),
            e @ QueueError::Store(_) => {
                tracing::error!(error = %e, "queue store failure");
                ApiError::Internal(e.to_string())
            }
        }
    }
}
