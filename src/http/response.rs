//! Error responses.
//!
//! # Responsibilities
//! - Map handler failures to a 500 JSON body
//! - Attach the failure detail to the response for the completion log
//! - Decide how much error detail a client may see
//!
//! # Design Decisions
//! - Detailed error text is only exposed in development mode
//! - The detail travels as a response extension, never in the body by default

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

/// Failure a handler already dealt with (and logged) but cannot recover from.
#[derive(Debug, Error)]
#[error("{public}: {detail}")]
pub struct ApiError {
    /// Message safe to show to clients.
    pub public: String,
    /// Underlying cause, for logs only.
    pub detail: String,
}

impl ApiError {
    pub fn internal(public: impl Into<String>, detail: impl ToString) -> Self {
        Self {
            public: public.into(),
            detail: detail.to_string(),
        }
    }
}

/// Failure detail carried on a response for the instrumentation middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    pub detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": "Internal server error",
            "message": self.public,
        });
        let mut response = (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
        response
            .extensions_mut()
            .insert(HandlerFailure { detail: self.detail });
        response
    }
}

/// Body for failures that escaped the handler entirely.
pub fn unhandled_error_body(development: bool, detail: &str) -> Value {
    let message = if development {
        detail
    } else {
        "Something went wrong"
    };
    json!({
        "error": "Internal server error",
        "message": message,
    })
}

pub fn unhandled_error_response(development: bool, detail: &str) -> Response {
    let mut response = (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(unhandled_error_body(development, detail)),
    )
        .into_response();
    response.extensions_mut().insert(HandlerFailure {
        detail: detail.to_string(),
    });
    response
}

/// JSON `{"error": message}` with the given status.
pub fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_keeps_detail_out_of_body() {
        let response = ApiError::internal("Failed to retrieve users", "connection reset").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.extensions().get::<HandlerFailure>(),
            Some(&HandlerFailure {
                detail: "connection reset".into()
            })
        );
    }

    #[test]
    fn test_unhandled_detail_only_in_development() {
        assert_eq!(
            unhandled_error_body(true, "index out of bounds")["message"],
            "index out of bounds"
        );
        assert_eq!(
            unhandled_error_body(false, "index out of bounds")["message"],
            "Something went wrong"
        );
    }
}
