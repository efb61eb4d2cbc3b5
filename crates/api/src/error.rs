//! Mapping of harvester errors onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use harvester_core::error::{
    BlockIntegrityError, BlockRange, ChainError, DomainError, HarvesterError,
};

/// Error returned by every handler.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    missing: Vec<BlockRange>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    missing: &'a [BlockRange],
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            missing: Vec::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<HarvesterError> for ApiError {
    fn from(err: HarvesterError) -> Self {
        let status = match &err {
            HarvesterError::BlockAlreadyAdded { .. } | HarvesterError::BlockIntegrity(_) => {
                StatusCode::CONFLICT
            }
            HarvesterError::Domain(DomainError::ValidationError(_)) => StatusCode::BAD_REQUEST,
            HarvesterError::Chain(ChainError::UnknownBlock(_))
            | HarvesterError::Domain(DomainError::BlockNotFound(_)) => StatusCode::NOT_FOUND,
            HarvesterError::Chain(_) => StatusCode::BAD_GATEWAY,
            HarvesterError::ShutdownRequested => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let missing = match &err {
            HarvesterError::BlockIntegrity(BlockIntegrityError::MissingBlocks(ranges)) => {
                ranges.clone()
            }
            _ => Vec::new(),
        };

        if status.is_server_error() {
            error!(error = %err, "❌ Request failed");
        }

        Self {
            status,
            message: err.to_string(),
            missing,
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        HarvesterError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: &self.message,
            missing: &self.missing,
        };
        (self.status, Json(body)).into_response()
    }
}
