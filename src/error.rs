use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{DbErr, RuntimeErr, SqlErr};
use thiserror::Error;

use crate::response::{ApiResponse, Meta};

const SQLSTATE_DEADLOCK: &str = "40P01";
const SQLSTATE_SERIALIZATION: &str = "40001";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Forbidden")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Insufficient stock for {product}")]
    InsufficientStock { product: String },

    #[error("Storage is busy, please retry")]
    StorageBusy,

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("ORM error")]
    OrmError(#[from] DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InsufficientStock { .. } => StatusCode::CONFLICT,
            AppError::StorageBusy => StatusCode::SERVICE_UNAVAILABLE,
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Deadlocks and serialization failures are safe for the client to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StorageBusy)
    }

    /// Translate storage errors that carry meaning for the caller: unique
    /// violations become `Conflict(conflict_message)`, lock contention becomes
    /// `StorageBusy`. Everything else passes through unchanged.
    pub fn classify(self, conflict_message: &str) -> Self {
        let (unique_violation, sqlstate) = match &self {
            AppError::OrmError(err) => (
                matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))),
                orm_sqlstate(err),
            ),
            AppError::DbError(err) => match err.as_database_error() {
                Some(db) => (db.is_unique_violation(), db.code().map(|c| c.into_owned())),
                None => (false, None),
            },
            _ => (false, None),
        };

        if unique_violation {
            AppError::Conflict(conflict_message.to_string())
        } else if sqlstate.as_deref().is_some_and(is_contention) {
            AppError::StorageBusy
        } else {
            self
        }
    }
}

fn is_contention(code: &str) -> bool {
    code == SQLSTATE_DEADLOCK || code == SQLSTATE_SERIALIZATION
}

fn orm_sqlstate(err: &DbErr) -> Option<String> {
    let runtime = match err {
        DbErr::Exec(runtime) | DbErr::Query(runtime) | DbErr::Conn(runtime) => runtime,
        _ => return None,
    };
    match runtime {
        RuntimeErr::SqlxError(sqlx_err) => sqlx_err
            .as_database_error()
            .and_then(|db| db.code())
            .map(|code| code.into_owned()),
        _ => None,
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match &rejection {
            JsonRejection::MissingJsonContentType(_) => {
                "Expected request with `Content-Type: application/json`".to_string()
            }
            JsonRejection::JsonSyntaxError(_) => "Request body is not valid JSON".to_string(),
            JsonRejection::JsonDataError(err) => format!("Invalid request body: {}", data_error_detail(err)),
            _ => "Could not read request body".to_string(),
        };
        tracing::debug!(error = %rejection.body_text(), "request body rejected");
        AppError::BadRequest(message)
    }
}

/// The serde message without axum's "Failed to deserialize..." preamble.
fn data_error_detail(err: &axum::extract::rejection::JsonDataError) -> String {
    let text = err.body_text();
    match text.split_once(": ") {
        Some((_, detail)) => detail.to_string(),
        None => text,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            match &self {
                AppError::DbError(err) => tracing::error!(error = %err, "database error"),
                AppError::OrmError(err) => tracing::error!(error = %err, "orm error"),
                AppError::Internal(err) => tracing::error!(error = %err, "internal error"),
                _ => {}
            }
        }

        let body: ApiResponse<()> = ApiResponse::error(self.to_string(), Some(Meta::empty()));
        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
