//! Error types and API error codes

use crate::auth::AuthError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use syn_crypto::CryptoError;
use syn_store::StoreError;
use thiserror::Error;

/// Header carrying the request id on every response
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// API error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    MissingToken,
    InvalidToken,
    ExpiredToken,
    UnknownUser,
    InvalidCredentials,
    MissingField,
    InvalidRequest,
    InvalidReference,
    InvalidName,
    UserNotFound,
    UnsupportedAlgorithm,
    InvalidKey,
    InvalidIv,
    DecryptionFailed,
    UsernameTaken,
    AccessDenied,
    FileNotFound,
    AlreadyQuarantined,
    Conflict,
    PayloadTooLarge,
    SlowDown,
    StreamFailure,
    DirectoryCreateFailure,
    RenameFailure,
    InternalError,
}

impl ErrorCode {
    /// Get the error code string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingToken => "MissingToken",
            Self::InvalidToken => "InvalidToken",
            Self::ExpiredToken => "ExpiredToken",
            Self::UnknownUser => "UnknownUser",
            Self::InvalidCredentials => "InvalidCredentials",
            Self::MissingField => "MissingField",
            Self::InvalidRequest => "InvalidRequest",
            Self::InvalidReference => "InvalidReference",
            Self::InvalidName => "InvalidName",
            Self::UserNotFound => "UserNotFound",
            Self::UnsupportedAlgorithm => "UnsupportedAlgorithm",
            Self::InvalidKey => "InvalidKey",
            Self::InvalidIv => "InvalidIv",
            Self::DecryptionFailed => "DecryptionFailed",
            Self::UsernameTaken => "UsernameTaken",
            Self::AccessDenied => "AccessDenied",
            Self::FileNotFound => "FileNotFound",
            Self::AlreadyQuarantined => "AlreadyQuarantined",
            Self::Conflict => "Conflict",
            Self::PayloadTooLarge => "PayloadTooLarge",
            Self::SlowDown => "SlowDown",
            Self::StreamFailure => "StreamFailure",
            Self::DirectoryCreateFailure => "DirectoryCreateFailure",
            Self::RenameFailure => "RenameFailure",
            Self::InternalError => "InternalError",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingToken
            | Self::InvalidToken
            | Self::ExpiredToken
            | Self::UnknownUser
            | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::MissingField
            | Self::InvalidRequest
            | Self::InvalidReference
            | Self::InvalidName
            | Self::UserNotFound
            | Self::UnsupportedAlgorithm
            | Self::InvalidKey
            | Self::InvalidIv
            | Self::DecryptionFailed
            | Self::UsernameTaken => StatusCode::BAD_REQUEST,
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::FileNotFound => StatusCode::NOT_FOUND,
            Self::AlreadyQuarantined | Self::Conflict => StatusCode::CONFLICT,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::SlowDown => StatusCode::TOO_MANY_REQUESTS,
            Self::StreamFailure
            | Self::DirectoryCreateFailure
            | Self::RenameFailure
            | Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to clients for server-side failures, which never carry detail
    fn generic_message(&self) -> Option<&'static str> {
        match self {
            Self::StreamFailure => Some("Failed to process file"),
            Self::DirectoryCreateFailure | Self::RenameFailure => Some("Failed to store file"),
            Self::InternalError => Some("Internal server error"),
            _ => None,
        }
    }
}

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    Api { code: ErrorCode, message: String },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Create an error with an explicit code
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }

    /// Create an internal error; the detail is logged, not returned
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        Self::Internal(detail.to_string())
    }

    /// Get the error code
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Api { code, .. } => *code,
            Self::Auth(e) => match e {
                AuthError::MissingToken => ErrorCode::MissingToken,
                AuthError::InvalidToken(_) => ErrorCode::InvalidToken,
                AuthError::ExpiredToken => ErrorCode::ExpiredToken,
                AuthError::UnknownUser(_) => ErrorCode::UnknownUser,
            },
            Self::Store(e) => match e {
                StoreError::MissingField(_) => ErrorCode::MissingField,
                StoreError::InvalidName(_) => ErrorCode::InvalidName,
                StoreError::InvalidReference(_) => ErrorCode::InvalidReference,
                StoreError::UserNotFound(_) => ErrorCode::UserNotFound,
                StoreError::FileNotFound(_) => ErrorCode::FileNotFound,
                StoreError::AlreadyQuarantined(_) => ErrorCode::AlreadyQuarantined,
                StoreError::Conflict(_) => ErrorCode::Conflict,
                StoreError::UsernameTaken(_) => ErrorCode::UsernameTaken,
                StoreError::InvalidCredentials => ErrorCode::InvalidCredentials,
                StoreError::DirectoryCreateFailure { .. } => ErrorCode::DirectoryCreateFailure,
                StoreError::RenameFailure(_) => ErrorCode::RenameFailure,
                StoreError::Crypto(e) => crypto_code(e),
                StoreError::Io(_) => ErrorCode::InternalError,
            },
            Self::Crypto(e) => crypto_code(e),
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Message returned to the client
    pub fn public_message(&self) -> String {
        let code = self.error_code();
        match code.generic_message() {
            Some(message) => message.to_string(),
            None => self.to_string(),
        }
    }
}

fn crypto_code(e: &CryptoError) -> ErrorCode {
    match e {
        CryptoError::UnsupportedAlgorithm(_) => ErrorCode::UnsupportedAlgorithm,
        CryptoError::InvalidKey(_) => ErrorCode::InvalidKey,
        CryptoError::InvalidIv(_) => ErrorCode::InvalidIv,
        CryptoError::Decryption(_) => ErrorCode::DecryptionFailed,
        CryptoError::StreamFailure(_) => ErrorCode::StreamFailure,
    }
}

/// JSON error body
#[derive(Clone, Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub request_id: String,
}

impl ErrorBody {
    /// Render with a request id and the status matching `code`
    pub fn into_response_with(self, status: StatusCode) -> Response {
        let request_id = self.request_id.clone();
        let mut response = (status, Json(self)).into_response();
        if let Ok(value) = request_id.parse() {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.error_code();
        let status = code.status_code();

        if status.is_server_error() {
            tracing::error!(code = code.as_str(), error = ?self, "Request failed");
        } else {
            tracing::debug!(code = code.as_str(), error = %self, "Request rejected");
        }

        // The request id middleware replaces this id with the request's own
        let body = ErrorBody {
            code: code.as_str(),
            message: self.public_message(),
            request_id: uuid::Uuid::new_v4().to_string(),
        };
        let mut response = body.clone().into_response_with(status);
        response.extensions_mut().insert(body);
        response
    }
}
