use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("User not found")]
    UserNotFound,
    #[error("Email already exists")]
    EmailAlreadyExists,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Missing authorization header")]
    MissingAuthHeader,
    #[error("Invalid authorization header format")]
    InvalidAuthHeaderFormat,
    #[error("Insufficient permissions")]
    InsufficientPermissions,
    #[error("Rate limit exceeded")]
    RateLimitExceeded,
    #[error("Password validation failed: {0}")]
    PasswordValidation(String),
    #[error("Request validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("Password hashing error: {0}")]
    PasswordHashing(#[from] crate::auth::password::PasswordError),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeaderFormat
            | AuthError::Jwt(_) => StatusCode::UNAUTHORIZED,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::EmailAlreadyExists => StatusCode::CONFLICT,
            AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AuthError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AuthError::PasswordValidation(_) | AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::PasswordHashing(crate::auth::password::PasswordError::HashingFailed)
            | AuthError::PasswordHashing(crate::auth::password::PasswordError::VerificationFailed)
            | AuthError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::PasswordHashing(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::EmailAlreadyExists => "EMAIL_ALREADY_EXISTS",
            AuthError::InvalidToken | AuthError::Jwt(_) => "INVALID_TOKEN",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::MissingAuthHeader => "MISSING_AUTH_HEADER",
            AuthError::InvalidAuthHeaderFormat => "INVALID_AUTH_HEADER",
            AuthError::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            AuthError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            AuthError::PasswordValidation(_) | AuthError::PasswordHashing(_) => "INVALID_PASSWORD",
            AuthError::Validation(_) => "VALIDATION_ERROR",
            AuthError::Database(_) => "DATABASE_ERROR",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Never leak driver details to the client
        let message = match &self {
            AuthError::Database(err) => {
                tracing::error!("Database error during authentication: {}", err);
                "Database error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error_code": self.error_code(),
            "message": message,
        }));

        (status, body).into_response()
    }
}
