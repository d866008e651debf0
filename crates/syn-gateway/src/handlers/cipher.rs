//! Encrypt and decrypt handlers

use crate::error::{ApiError, ErrorCode};
use crate::state::UserSession;
use crate::AppState;
use axum::{
    extract::{multipart::MultipartError, Extension, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use syn_crypto::{CipherParams, CryptoError, Direction};
use syn_store::{StagedFile, StoreError};
use tracing::{debug, info};

/// Response for a stored cipher result
#[derive(Debug, Serialize)]
pub struct CipherResponse {
    pub message: &'static str,
    pub link: String,
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
}

#[derive(Default)]
struct CipherForm {
    algorithm: Option<String>,
    key: Option<String>,
    iv: Option<String>,
    upload: Option<(String, StagedFile)>,
}

fn multipart_rejection(e: &MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::new(ErrorCode::PayloadTooLarge, "Request body is too large")
    } else {
        ApiError::new(ErrorCode::InvalidRequest, e.body_text())
    }
}

/// A body error surfacing while the file is spooled is the client's, not ours
fn upload_error(e: StoreError) -> ApiError {
    if let StoreError::Crypto(CryptoError::StreamFailure(io)) = &e {
        if let Some(inner) = io.get_ref().and_then(|inner| inner.downcast_ref::<MultipartError>()) {
            return multipart_rejection(inner);
        }
    }
    e.into()
}

async fn read_form(state: &AppState, mut multipart: Multipart) -> Result<CipherForm, ApiError> {
    let mut form = CipherForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_rejection(&e))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                if form.upload.is_some() {
                    return Err(ApiError::new(
                        ErrorCode::InvalidRequest,
                        "Only one file may be uploaded per request",
                    ));
                }
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|n| !n.is_empty())
                    .ok_or(StoreError::MissingField("filename"))?;
                let staged = state.storage.stage_upload(field).await.map_err(upload_error)?;
                form.upload = Some((file_name, staged));
            }
            "algorithm" | "key" | "iv" => {
                let value = field.text().await.map_err(|e| multipart_rejection(&e))?;
                let slot = match name.as_str() {
                    "algorithm" => &mut form.algorithm,
                    "key" => &mut form.key,
                    _ => &mut form.iv,
                };
                *slot = Some(value);
            }
            other => debug!(field = %other, "Ignoring unknown form field"),
        }
    }

    Ok(form)
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ApiError::Store(StoreError::MissingField(field)))
}

async fn run_cipher(
    state: &AppState,
    session: &UserSession,
    direction: Direction,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = read_form(state, multipart).await?;
    let algorithm = required(form.algorithm, "algorithm")?;
    let key = required(form.key, "key")?;
    let (display_name, upload) = form
        .upload
        .ok_or(ApiError::Store(StoreError::MissingField("file")))?;

    let iv = match direction {
        Direction::Encrypt => None,
        Direction::Decrypt => form.iv.as_deref(),
    };
    let params = CipherParams::parse(&algorithm, &key, iv)?;

    let placement = syn_store::process(
        &state.storage,
        &session.user_id,
        &display_name,
        direction,
        &params,
        upload,
    )
    .await?;

    info!(
        user_id = %session.user_id,
        direction = %direction,
        algorithm = %params.algorithm,
        reference = %placement.reference,
        bytes = placement.output.bytes_out,
        "Artifact stored"
    );

    let (message, iv) = match direction {
        Direction::Encrypt => (
            "File encrypted and stored successfully",
            Some(placement.output.iv.to_hex()),
        ),
        Direction::Decrypt => ("File decrypted and stored successfully", None),
    };

    Ok((
        StatusCode::CREATED,
        Json(CipherResponse {
            message,
            link: placement.reference.link(&state.base_url),
            reference: placement.reference.path(),
            iv,
        }),
    )
        .into_response())
}

/// POST /encrypt - Encrypt an uploaded file into the caller's namespace
pub async fn encrypt(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<UserSession>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    run_cipher(&state, &session, Direction::Encrypt, multipart).await
}

/// POST /decrypt - Decrypt an uploaded file into the caller's namespace
pub async fn decrypt(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<UserSession>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    run_cipher(&state, &session, Direction::Decrypt, multipart).await
}
