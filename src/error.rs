use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::error;

/// Field name to messages, the shape clients get back for rejected input.
#[derive(Debug, Default, Clone, PartialEq, serde::Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

/// Key used for errors that concern the payload as a whole.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("authentication credentials were not provided")]
    Unauthorized,

    #[error("you do not have permission to perform this action")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] DieselError),

    #[error("failed to get DB connection: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("task execution failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Maps constraint violations of an insert or update to 400s: the row
    /// clashes with an existing name or points at a row that is gone.
    pub fn from_write(err: DieselError, unique_msg: &str, fk_msg: &str) -> Self {
        match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                ApiError::BadRequest(unique_msg.to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                ApiError::BadRequest(fk_msg.to_string())
            }
            other => ApiError::Database(other),
        }
    }

    /// Maps a delete blocked by rows still referencing the target to 409.
    pub fn from_delete(err: DieselError, referenced_msg: &str) -> Self {
        match err {
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                ApiError::Conflict(referenced_msg.to_string())
            }
            other => ApiError::Database(other),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Database(DieselError::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Database(_) | ApiError::Pool(_) | ApiError::Join(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "Request failed");
        }
        let body = match self {
            ApiError::Validation(fields) => json!(fields),
            ApiError::Database(DieselError::NotFound) => json!({ "message": "Not found." }),
            ApiError::Database(_) | ApiError::Pool(_) | ApiError::Join(_) => {
                json!({ "message": "Internal server error." })
            }
            other => json!({ "message": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

/// Runs blocking diesel work off the async executor.
pub async fn blocking<F, T>(work: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}
