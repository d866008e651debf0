//! Report handler

use crate::handlers::json_body;
use crate::state::UserSession;
use crate::{ApiError, AppState};
use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use syn_store::StoreError;

/// Report request body
#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    /// Link or path of the artifact being reported
    #[serde(default)]
    pub url: Option<String>,
}

/// Report response body
#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub message: &'static str,
    pub link: String,
    pub reference: String,
}

/// POST /report - Move an artifact into its owner's quarantine
pub async fn report(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<UserSession>,
    payload: Result<Json<ReportRequest>, JsonRejection>,
) -> Result<Json<ReportResponse>, ApiError> {
    let url = json_body(payload)?
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or(StoreError::MissingField("url"))?;

    let reference = state.quarantine.quarantine(&session.user_id, &url).await?;

    Ok(Json(ReportResponse {
        message: "File reported as dangerous",
        link: reference.link(&state.base_url),
        reference: reference.path(),
    }))
}
