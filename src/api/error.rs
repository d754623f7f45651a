use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

use crate::service::error::EngineError;
use crate::store::StoreError;

/// Maps engine failures onto HTTP responses with a `{"message": ...}` body.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub EngineError);

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::OverlappingLeave { .. } => StatusCode::CONFLICT,
            EngineError::InvalidStateTransition { .. }
            | EngineError::NoClockInFound { .. }
            | EngineError::InvalidInterval { .. }
            | EngineError::ClockOutBeforeClockIn { .. }
            | EngineError::InvalidYear(_) => StatusCode::BAD_REQUEST,
            EngineError::Storage(StoreError::Contended(_)) => StatusCode::CONFLICT,
            EngineError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "Store failure");
            "Internal Server Error".to_string()
        } else {
            self.0.to_string()
        };
        HttpResponse::build(status).json(json!({ "message": message }))
    }
}
