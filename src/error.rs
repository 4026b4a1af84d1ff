use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::api::ErrorResponse;

const INTERNAL_MESSAGE: &str = "internal server error";

#[derive(Debug, Error)]
pub enum CatalogueError {
    /// Malformed input: bad serial or card, unknown action, missing card.
    #[error("{0}")]
    Validation(String),
    /// Duplicate serial number, or borrowing a book that is out.
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CatalogueError {
    pub fn status_code(&self) -> StatusCode {
        use CatalogueError::*;
        match self {
            Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Conflict(_) => StatusCode::CONFLICT,
            NotFound(_) => StatusCode::NOT_FOUND,
            Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<libsql::Error> for CatalogueError {
    fn from(error: libsql::Error) -> Self {
        CatalogueError::Internal(error.into())
    }
}

impl From<JsonRejection> for CatalogueError {
    fn from(rejection: JsonRejection) -> Self {
        CatalogueError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for CatalogueError {
    fn from(rejection: PathRejection) -> Self {
        CatalogueError::Validation(rejection.body_text())
    }
}

impl IntoResponse for CatalogueError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match self {
            CatalogueError::Internal(e) => {
                tracing::error!(error = %format!("{e:#}"), "request failed");
                INTERNAL_MESSAGE.to_owned()
            }
            other => {
                tracing::warn!(status = status.as_u16(), error = %other, "request rejected");
                other.to_string()
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
