use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mongogate_core::GateError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Not found")]
    RouteNotFound,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Gate(
                GateError::InvalidFilter
                | GateError::InvalidParameter(_)
                | GateError::MissingCollection,
            ) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Gate(GateError::NotFound) | ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::Gate(GateError::Store(_) | GateError::Timeout(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({"error": self.to_string()}))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (ApiError::from(GateError::InvalidFilter), 400),
            (ApiError::from(GateError::MissingCollection), 400),
            (ApiError::from(GateError::InvalidParameter("`id` repeated".into())), 400),
            (ApiError::from(GateError::NotFound), 404),
            (ApiError::from(GateError::Store("boom".into())), 500),
            (ApiError::from(GateError::Timeout(Duration::from_millis(5))), 500),
            (ApiError::MethodNotAllowed, 405),
            (ApiError::RouteNotFound, 404),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code().as_u16(), status, "{err}");
        }
    }

    #[test]
    fn store_messages_pass_through_verbatim() {
        let err = ApiError::from(GateError::Store("connection refused".into()));
        assert_eq!(err.to_string(), "connection refused");
        assert_eq!(
            ApiError::from(GateError::InvalidFilter).to_string(),
            "Invalid filter format"
        );
    }
}
