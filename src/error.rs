//! Error type shared by the store, the query engine and the HTTP handlers
//!
//! Every failure is rendered as a JSON body of the form
//! `{"error": "<message>", "code": "<kind>"}` so clients only ever deal
//! with one response shape.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// The short code does not exist (or has expired)
    #[error("Link `{0}` not found")]
    NotFound(String),

    /// A create request collided with an existing short code
    #[error("Short code `{0}` is already taken. Please choose another.")]
    Conflict(String),

    /// The link exists but belongs to another owner
    #[error("You are not authorized to access link `{0}`")]
    Forbidden(String),

    /// A request body or identity field failed validation
    #[error("{0}")]
    Validation(String),

    /// A stored record is missing a field or holds a value of the wrong type
    #[error("Corrupt record `{key}`: {reason}")]
    DataIntegrity { key: String, reason: String },

    /// Random code generation kept colliding
    #[error("Could not allocate a unique short code")]
    CodeExhausted,

    #[error("Storage error: {0}")]
    Storage(#[from] redb::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Machine-readable kind, returned as the `code` field of error bodies
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Forbidden(_) => "forbidden",
            AppError::Validation(_) => "validation",
            AppError::DataIntegrity { .. } => "data_integrity",
            AppError::CodeExhausted => "code_exhausted",
            AppError::Storage(_) => "storage",
            AppError::Serialization(_) => "serialization",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::DataIntegrity { .. }
            | AppError::CodeExhausted
            | AppError::Storage(_)
            | AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// redb splits its failures across several types; funnel them all through `redb::Error`
macro_rules! impl_from_redb {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for AppError {
                fn from(err: $ty) -> Self {
                    AppError::Storage(err.into())
                }
            }
        )*
    };
}

impl_from_redb!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

// Malformed or mistyped JSON bodies get the same error shape as field validation
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(code = self.code(), "{}", self);
        } else {
            tracing::debug!(code = self.code(), "{}", self);
        }

        (
            status,
            Json(json!({
                "error": self.to_string(),
                "code": self.code(),
            })),
        )
            .into_response()
    }
}
