use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

/// Per-field validation messages, keyed by the JSON/form field name the
/// client sent. Only the first message per field is kept.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(|s| s.as_str())
    }

    /// Finishes a validation pass: no messages means the input was valid.
    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(FieldErrors),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Validation(fields) => json!({ "error": fields }),
            Self::Internal(e) => {
                error!(error = %e, "internal error");
                json!({ "error": { "message": "Internal server error" } })
            }
            other => json!({ "error": { "message": other.to_string() } }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_keep_first_message_per_field() {
        let mut fields = FieldErrors::new();
        fields.push("budget", "Budget is required");
        fields.push("budget", "Budget must be a positive number");
        assert_eq!(fields.get("budget"), Some("Budget is required"));
    }

    #[test]
    fn empty_field_errors_are_ok() {
        assert!(FieldErrors::new().into_result().is_ok());
    }

    #[test]
    fn validation_body_is_field_keyed() {
        let mut fields = FieldErrors::new();
        fields.push("date", "Date must be within trip timeline");
        let err = fields.into_result().unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let ApiError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        let body = json!({ "error": fields });
        assert_eq!(
            body["error"]["date"],
            json!("Date must be within trip timeline")
        );
    }

    #[test]
    fn generic_errors_carry_flat_message() {
        let err = ApiError::not_found("Trip not found");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Trip not found");
    }
}
