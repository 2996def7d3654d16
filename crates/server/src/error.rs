//! HTTP error mapping for the v1 API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use solarflow_core::lifecycle::{LifecycleError, Phase, StoreError};

#[derive(Debug, Error)]
pub enum ApiError {
    /// Advancement refused; lists what is still missing
    #[error("{phase} cannot advance: missing {}", .missing.join(", "))]
    Unsatisfied { phase: Phase, missing: Vec<String> },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("internal error: {0:#}")]
    Internal(anyhow::Error),
}

impl ApiError {
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unsatisfied { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::NotFound { .. } => Self::NotFound(err.to_string()),
            LifecycleError::UnknownStatus { .. } | LifecycleError::PhaseMismatch { .. } => {
                Self::BadRequest(err.to_string())
            }
            LifecycleError::Persistence(e) => Self::Internal(e),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        LifecycleError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::Unsatisfied { phase, missing } => json!({
                "error": self.to_string(),
                "phase": phase,
                "missing": missing,
            }),
            Self::Internal(e) => {
                // details stay in the log
                tracing::error!("Request failed: {:#}", e);
                json!({ "error": "Internal server error" })
            }
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
