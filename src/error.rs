use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;
use tokio_postgres::error::SqlState;

/// Application error returned by services and handlers.
///
/// Client-facing variants carry a message that is safe to show; the
/// infrastructure variants are logged and masked behind a generic 500.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(Vec<String>),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Locked(String),

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("Database error: {0}")]
    Database(tokio_postgres::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("{0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this error is a server-side failure that should be audited.
    pub fn is_internal(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl From<tokio_postgres::Error> for AppError {
    fn from(err: tokio_postgres::Error) -> Self {
        let Some(db_err) = err.as_db_error() else {
            return AppError::Database(err);
        };

        let constraint = db_err.constraint().unwrap_or("").to_string();
        match *db_err.code() {
            SqlState::UNIQUE_VIOLATION => {
                AppError::Conflict(unique_violation_message(&constraint))
            }
            SqlState::FOREIGN_KEY_VIOLATION => {
                AppError::BadRequest(format!("Referenced record does not exist ({})", constraint))
            }
            SqlState::CHECK_VIOLATION => {
                AppError::BadRequest(format!("Value violates constraint {}", constraint))
            }
            _ => AppError::Database(err),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("Background task failed: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(flatten_validation_errors(&errors))
    }
}

fn unique_violation_message(constraint: &str) -> String {
    if constraint.contains("email") {
        "User with this email already exists".to_string()
    } else if constraint.contains("username") {
        "Username is already taken".to_string()
    } else if constraint == "idx_transport_one_open_per_transaction" {
        "An open transport request already exists for this transaction".to_string()
    } else if constraint.contains("name") {
        "A record with this name already exists".to_string()
    } else {
        "Record already exists".to_string()
    }
}

/// Turn validator output into flat, human readable messages.
pub fn flatten_validation_errors(errors: &validator::ValidationErrors) -> Vec<String> {
    let mut messages = Vec::new();
    for (field, field_errors) in errors.field_errors() {
        for e in field_errors.iter() {
            let message = match &e.message {
                Some(m) => m.to_string(),
                None => format!("{} {}", field, e.code),
            };
            messages.push(message);
        }
    }
    messages.sort();
    messages
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) | AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Locked(_) => StatusCode::LOCKED,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Hash(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::Validation(errors) => serde_json::json!({
                "success": false,
                "error": "Validation failed",
                "errors": errors,
            }),
            AppError::Token(_) => serde_json::json!({
                "success": false,
                "error": "Invalid or expired token",
            }),
            e if e.is_internal() => serde_json::json!({
                "success": false,
                "error": "An internal error occurred",
            }),
            e => serde_json::json!({
                "success": false,
                "error": e.to_string(),
            }),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}
