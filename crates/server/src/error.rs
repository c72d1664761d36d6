//! HTTP mapping of engine errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use krait_core::EngineError;
use serde_json::json;
use tracing::{error, warn};

/// Engine error carried to an HTTP response.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub EngineError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            EngineError::UnknownJob(_) => StatusCode::NOT_FOUND,
            EngineError::InvalidTransition { .. } | EngineError::MetaBeforeTerminal(_) => {
                StatusCode::CONFLICT
            }
            EngineError::UnknownJobType(_) | EngineError::NoCredential(_) => {
                StatusCode::BAD_REQUEST
            }
            EngineError::LaunchFailure(_)
            | EngineError::ParserFault { .. }
            | EngineError::Storage(_)
            | EngineError::Bus(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        } else {
            warn!(error = %self.0, status = %status, "request rejected");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use krait_core::JobId;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError(EngineError::UnknownJob(JobId(9))).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(EngineError::UnknownJobType("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(EngineError::NoCredential("10.0.0.1".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(EngineError::Storage("io".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
