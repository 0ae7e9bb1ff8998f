//! Error type shared by every handler and middleware
//!
//! Handlers never format failures themselves. An `AppError` turns into a bare
//! status response carrying an [`ErrorReport`] extension; the error shaping
//! middleware then decides between JSON and an HTML page and how much detail
//! to disclose.

use std::error::Error as _;

use axum::{
    extract::rejection::{FormRejection, JsonRejection, QueryRejection},
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use serde_json::{Value, json};
use sqlx::postgres::PgDatabaseError;
use thiserror::Error;

use crate::config::Environment;

/// Custom error type for the tour service
#[derive(Error, Debug)]
pub enum AppError {
    /// Anticipated failure whose message is safe to show to clients
    #[error("{message}")]
    Operational { status: StatusCode, message: String },

    /// Record failed validation before persisting
    #[error("Invalid input data. {}", .0.join(". "))]
    Validation(Vec<String>),

    /// Database error
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// Token could not be decoded or verified
    #[error(transparent)]
    Token(#[from] jsonwebtoken::errors::Error),

    /// Template rendering failed
    #[error(transparent)]
    Template(#[from] tera::Error),

    /// Anything else
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Type alias for handler results
pub type ApiResult<T> = Result<T, AppError>;

impl AppError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        AppError::Operational {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::BAD_REQUEST)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::UNAUTHORIZED)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::FORBIDDEN)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::NOT_FOUND)
    }

    pub fn no_document() -> Self {
        Self::not_found("No document found with that ID")
    }

    pub fn validation(errors: Vec<String>) -> Self {
        AppError::Validation(errors)
    }

    /// Translate known database and token failures into operational errors
    pub fn normalize(self) -> Self {
        match self {
            AppError::Validation(errors) => AppError::new(
                format!("Invalid input data. {}", errors.join(". ")),
                StatusCode::BAD_REQUEST,
            ),
            AppError::Database(err) => match translate_database(&err) {
                Some((status, message)) => AppError::new(message, status),
                None => AppError::Database(err),
            },
            AppError::Token(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature => {
                    AppError::unauthorized("Your token has expired! Please log in again.")
                }
                _ => AppError::unauthorized("Invalid token. Please log in again!"),
            },
            other => other,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Operational { status, .. } => *status,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_operational(&self) -> bool {
        matches!(self, AppError::Operational { .. } | AppError::Validation(_))
    }
}

fn translate_database(err: &sqlx::Error) -> Option<(StatusCode, String)> {
    match err {
        sqlx::Error::RowNotFound => Some((
            StatusCode::NOT_FOUND,
            "No document found with that ID".to_string(),
        )),
        sqlx::Error::Database(db) => {
            let code = db.code()?;
            match code.as_ref() {
                // unique_violation
                "23505" => {
                    let value = db
                        .try_downcast_ref::<PgDatabaseError>()
                        .and_then(|pg| pg.detail())
                        .and_then(duplicate_value)
                        .or_else(|| db.constraint())
                        .unwrap_or("value")
                        .to_string();
                    Some((
                        StatusCode::BAD_REQUEST,
                        format!("Duplicate field value: \"{}\". Please use another value!", value),
                    ))
                }
                // invalid_text_representation, invalid_datetime_format, numeric_value_out_of_range
                "22P02" | "22007" | "22003" => Some((
                    StatusCode::BAD_REQUEST,
                    format!("Invalid value: {}", db.message()),
                )),
                // not_null_violation, foreign_key_violation, check_violation
                "23502" | "23503" | "23514" => Some((
                    StatusCode::BAD_REQUEST,
                    format!("Invalid input data. {}", db.message()),
                )),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Pull `x` out of a detail line such as `Key (email)=(x) already exists.`
fn duplicate_value(detail: &str) -> Option<&str> {
    let start = detail.find("=(")? + 2;
    let end = detail.rfind(')')?;
    (end > start).then(|| &detail[start..end])
}

/// Snapshot of a failure, travels in the response extensions
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub status: StatusCode,
    pub message: String,
    pub operational: bool,
    pub detail: String,
    pub chain: Vec<String>,
}

impl From<AppError> for ErrorReport {
    fn from(err: AppError) -> Self {
        let err = err.normalize();

        let mut chain = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }

        ErrorReport {
            status: err.status(),
            message: err.to_string(),
            operational: err.is_operational(),
            detail: format!("{:?}", err),
            chain,
        }
    }
}

impl ErrorReport {
    /// `fail` for client errors, `error` for everything else
    pub fn status_label(&self) -> &'static str {
        status_label(self.status)
    }

    /// JSON body for API requests
    pub fn json_body(&self, env: Environment) -> Value {
        match env {
            Environment::Development => json!({
                "status": self.status_label(),
                "error": {
                    "statusCode": self.status.as_u16(),
                    "isOperational": self.operational,
                    "detail": self.detail,
                },
                "message": self.message,
                "stack": self.chain,
            }),
            Environment::Production if self.operational => json!({
                "status": self.status_label(),
                "message": self.message,
            }),
            Environment::Production => json!({
                "status": "error",
                "message": "Something went wrong!",
            }),
        }
    }

    /// Status code sent to the client
    pub fn public_status(&self, env: Environment) -> StatusCode {
        if env.is_production() && !self.operational {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            self.status
        }
    }

    /// Message shown on the rendered error page
    pub fn page_message(&self, env: Environment) -> String {
        if env.is_production() && !self.operational {
            "Please try again later.".to_string()
        } else {
            self.message.clone()
        }
    }
}

pub fn status_label(status: StatusCode) -> &'static str {
    if status.is_client_error() {
        "fail"
    } else {
        "error"
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let report = ErrorReport::from(self);
        let mut response = report.status.into_response();
        response.extensions_mut().insert(report);
        response
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::new(rejection.body_text(), rejection.status())
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        AppError::new(rejection.body_text(), rejection.status())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::new(rejection.body_text(), rejection.status())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::new(rejection.body_text(), rejection.status())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::new(err.body_text(), err.status())
    }
}
