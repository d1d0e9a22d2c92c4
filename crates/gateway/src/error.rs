//! Mapping of core errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use vibecraft_core::{Error, ErrorClass};

/// Body returned for every failed call.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
    /// What the caller should do about it.
    pub class: ErrorClass,
}

/// Status code for an error class.
pub fn status_for(class: ErrorClass) -> StatusCode {
    match class {
        ErrorClass::RetryLater => StatusCode::SERVICE_UNAVAILABLE,
        ErrorClass::FixInput => StatusCode::BAD_REQUEST,
        ErrorClass::Refused => StatusCode::FORBIDDEN,
        ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Wrapper letting handlers return `Result<_, ApiError>`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let class = self.0.class();
        let body = ErrorResponse {
            error: self.0.to_string(),
            class,
        };
        (status_for(class), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError(Error::timeout("slow")).into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError(Error::tool_not_found("x")).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(Error::governance("no")).into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError(Error::internal("bug")).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
