//! Artifact retrieval and listing handlers

use crate::error::{ApiError, ErrorCode};
use crate::state::UserSession;
use crate::AppState;
use axum::{
    body::Body,
    extract::{Extension, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use syn_store::{namespace::QUARANTINE_DIR, Area, ArtifactListing, ArtifactRef};
use tokio_util::io::ReaderStream;

fn reference_from_path(user_id: String, name: String) -> ArtifactRef {
    match name.split_once('/') {
        Some((QUARANTINE_DIR, rest)) => ArtifactRef {
            user_id,
            area: Area::Quarantine,
            name: rest.to_string(),
        },
        _ => ArtifactRef::active(user_id, name),
    }
}

/// GET /files/{user_id}/{*name} - Stream an artifact
pub async fn retrieve(
    State(state): State<Arc<AppState>>,
    Path((user_id, name)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if state.config.require_auth_for_retrieve {
        let auth_header = headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());
        let session = UserSession::from(state.validator.validate(auth_header)?);
        if !session.owns(&user_id) {
            return Err(ApiError::new(
                ErrorCode::AccessDenied,
                "Artifacts can only be retrieved by their owner",
            ));
        }
    }

    let reference = reference_from_path(user_id, name);
    let (file, len) = state.storage.open(&reference).await?;
    tracing::debug!(reference = %reference, size = len, "Streaming artifact");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, len.to_string()),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

/// GET /files - List the caller's artifacts
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<UserSession>,
) -> Result<Json<ArtifactListing>, ApiError> {
    Ok(Json(state.storage.list(&session.user_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_from_path() {
        let r = reference_from_path("u1".into(), "a.enc".into());
        assert_eq!(r, ArtifactRef::active("u1", "a.enc"));

        let q = reference_from_path("u1".into(), "dangerous_files/a.enc".into());
        assert_eq!(q.area, Area::Quarantine);
        assert_eq!(q.name, "a.enc");

        // Left for the storage layer to reject
        let bad = reference_from_path("u1".into(), "../u2/a.enc".into());
        assert_eq!(bad.name, "../u2/a.enc");
    }
}
