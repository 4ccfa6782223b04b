use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rusqlite::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    SlotUnavailable(String),

    #[error("{0}")]
    Validation(String),

    /// The transition is legal but carries a warning the caller must acknowledge.
    #[error("confirmation required: {0}")]
    ConfirmationRequired(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn slot_unavailable() -> Self {
        AppError::SlotUnavailable("Selected time slot is not available".to_string())
    }

    /// Expected business outcomes, as opposed to store or programming faults.
    pub fn is_business(&self) -> bool {
        matches!(
            self,
            AppError::NotFound(_)
                | AppError::InvalidState(_)
                | AppError::SlotUnavailable(_)
                | AppError::Validation(_)
                | AppError::ConfirmationRequired(_)
                | AppError::Unauthorized
                | AppError::RateLimited(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::InvalidState(_) => "invalid_state",
            AppError::SlotUnavailable(_) => "slot_unavailable",
            AppError::Validation(_) => "validation_error",
            AppError::ConfirmationRequired(_) => "confirmation_required",
            AppError::Unauthorized => "unauthorized",
            AppError::RateLimited(_) => "rate_limited",
            AppError::ConcurrencyConflict(_) => "concurrency_conflict",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                AppError::ConcurrencyConflict(err.to_string())
            }
            _ => AppError::Internal(format!("database error: {err}")),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::SlotUnavailable(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ConfirmationRequired(_) => StatusCode::CONFLICT,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::ConcurrencyConflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if !self.is_business() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.kind(), "message": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_maps_to_concurrency_conflict() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        );
        assert!(matches!(AppError::from(err), AppError::ConcurrencyConflict(_)));
    }

    #[test]
    fn test_other_database_errors_are_internal() {
        let err = AppError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(err, AppError::Internal(_)));
        assert!(!err.is_business());
    }

    #[test]
    fn test_slot_unavailable_message() {
        assert_eq!(
            AppError::slot_unavailable().to_string(),
            "Selected time slot is not available"
        );
    }
}
