use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Message safe to hand back to the client.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Internal(_) => "Something went wrong".to_string(),
            AppError::Generation(_) => "Could not generate a study set from this content".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(e: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("bcrypt: {}", e))
    }
}

impl From<actix_multipart::MultipartError> for AppError {
    fn from(e: actix_multipart::MultipartError) -> Self {
        AppError::MalformedUpload(e.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Generation(format!("HTTP: {}", e))
    }
}

// Application failures travel inside the envelope with HTTP 200; only the
// session gate and broken or oversized uploads use real status codes.
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::MalformedUpload(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::OK,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::Database(e) => log::error!("❌ Database failure: {}", e),
            AppError::Internal(msg) => log::error!("❌ Internal failure: {}", msg),
            AppError::Generation(msg) => log::error!("❌ Generation failure: {}", msg),
            _ => {}
        }

        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "status": 0,
            "error": self.public_message()
        }))
    }
}

const DUPLICATE_KEY: i32 = 11000;

/// True when a write failed on a unique index. Inserts report it as a write
/// error, findAndModify as a command error.
pub fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == DUPLICATE_KEY,
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_details_are_hidden() {
        let err = AppError::Internal("pool exhausted at 10.0.0.4".into());
        assert_eq!(err.public_message(), "Something went wrong");
        assert_eq!(err.status_code(), StatusCode::OK);
    }

    #[test]
    fn test_client_errors_keep_message() {
        let err = AppError::InvalidRequest("Score must be between 0 and 10".into());
        assert_eq!(err.public_message(), "Score must be between 0 and 10");
    }

    fn command_error(code: i32) -> mongodb::error::Error {
        let command: mongodb::error::CommandError = mongodb::bson::from_document(mongodb::bson::doc! {
            "code": code,
            "codeName": "DuplicateKey",
            "errmsg": "E11000 duplicate key error collection: studysets.users index: username_1",
        })
        .unwrap();
        mongodb::error::ErrorKind::Command(command).into()
    }

    #[test]
    fn test_duplicate_key_from_find_and_modify() {
        assert!(is_duplicate_key(&command_error(11000)));
        assert!(!is_duplicate_key(&command_error(112)));
        assert!(!is_duplicate_key(&mongodb::error::Error::custom("boom")));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::Unauthorized("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::PayloadTooLarge("x".into()).status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(AppError::MalformedUpload("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::OK);
    }
}
