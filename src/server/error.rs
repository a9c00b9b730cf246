//! Error-to-HTTP response conversion.
//!
//! Handlers return `Result<T, AppError>`; queue errors convert via `?` and
//! keep the status code chosen by [`Error::http_status`].

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use convertd_common::Error;
use serde_json::json;

/// Seconds a client is told to back off when the queue is full.
pub const QUEUE_FULL_RETRY_AFTER_SECS: u64 = 5;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
    retry_after: Option<u64>,
}

impl AppError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_input", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "not_finished", message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "conversion_failed", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        let status =
            StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let retry_after =
            matches!(e, Error::QueueFull { .. }).then_some(QUEUE_FULL_RETRY_AFTER_SECS);

        Self {
            status,
            code: e.code(),
            message: e.to_string(),
            retry_after,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                status = %self.status,
                error = %self.message,
                "Server error in API handler"
            );
        }

        let body = json!({
            "error": self.message,
            "code": self.code,
        });

        let mut response = (self.status, axum::Json(body)).into_response();
        if let Some(secs) = self.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convertd_common::JobId;

    #[test]
    fn not_found_produces_404() {
        let response = AppError::from(Error::not_found(JobId::new())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn queue_full_produces_503_with_retry_after() {
        let response = AppError::from(Error::QueueFull { capacity: 10 }).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            &QUEUE_FULL_RETRY_AFTER_SECS.to_string()
        );
    }

    #[test]
    fn invalid_input_produces_400() {
        let err = AppError::from(Error::invalid_input("unknown tool: nope"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "invalid_input");
    }
}
