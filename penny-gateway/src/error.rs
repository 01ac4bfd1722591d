//! Maps engine errors onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use penny_ontology::OntologyError;
use serde::Serialize;
use tracing::warn;

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
}

/// An engine error on its way back to the caller.
#[derive(Debug)]
pub struct ApiError(pub OntologyError);

impl From<OntologyError> for ApiError {
    fn from(err: OntologyError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            OntologyError::UnknownProfile { .. } | OntologyError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            OntologyError::RelationConflict { .. } => StatusCode::CONFLICT,
            OntologyError::WriteQueueOverflow { .. } => StatusCode::TOO_MANY_REQUESTS,
            OntologyError::AuthExpired(_) => StatusCode::UNAUTHORIZED,
            OntologyError::SchemaNotConverged { .. }
            | OntologyError::EntityNotYetVisible(_)
            | OntologyError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            OntologyError::BackendUnreachable(_)
            | OntologyError::Rejected { .. }
            | OntologyError::Protocol(_) => StatusCode::BAD_GATEWAY,
            OntologyError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(kind = self.0.kind(), error = %self.0, "Request failed");
        }
        let body = ErrorBody {
            error: self.0.to_string(),
            kind: self.0.kind(),
        };
        (status, Json(body)).into_response()
    }
}
