//! API request handlers

pub mod cipher;
pub mod files;
pub mod report;
pub mod service;
pub mod users;

pub use cipher::*;
pub use files::*;
pub use report::*;
pub use service::*;
pub use users::*;

use crate::error::{ApiError, ErrorCode};
use axum::{extract::rejection::JsonRejection, Json};

/// Unwrap a JSON body, reporting malformed payloads in the API's error format
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::new(ErrorCode::InvalidRequest, e.body_text()))
}
