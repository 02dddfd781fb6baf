//! Request handlers.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use cairn_tree::encode_hashes;
use cairn_types::{ChunkHash, MANIFEST_CONTENT_TYPE};
use tracing::debug;

use crate::AppState;
use crate::error::HttpError;

fn parse_hash(raw: &str) -> Result<ChunkHash, HttpError> {
    raw.parse().map_err(|e| HttpError::InvalidRequest {
        message: format!("bad hash {raw:?}: {e}"),
    })
}

// -----------------------------------------------------------------------
// POST /api/upload?hash=&level=
// -----------------------------------------------------------------------

/// Store one chunk and return the children of a manifest that are missing.
pub(crate) async fn upload(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
    body: Bytes,
) -> Result<Response, HttpError> {
    let hash = params
        .get("hash")
        .ok_or_else(|| HttpError::InvalidRequest {
            message: "missing query parameter: hash".into(),
        })
        .and_then(|raw| parse_hash(raw))?;

    let level = params
        .get("level")
        .ok_or_else(|| HttpError::InvalidRequest {
            message: "missing query parameter: level".into(),
        })?;
    let level: u32 = level.parse().map_err(|_| HttpError::InvalidRequest {
        message: format!("bad level {level:?}: expected a non-negative integer"),
    })?;

    let size = body.len();
    let needs = state.service.submit(hash, level, body).await?;
    debug!(%hash, level, size, needs = needs.len(), "upload handled");

    if needs.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, MANIFEST_CONTENT_TYPE)],
        encode_hashes(&needs),
    )
        .into_response())
}

// -----------------------------------------------------------------------
// HEAD/GET /api/chunks/{hash}
// -----------------------------------------------------------------------

/// Report whether a chunk is stored.
pub(crate) async fn head_chunk(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<StatusCode, HttpError> {
    let hash = parse_hash(&hash)?;
    if state.service.store().exists(hash).await? {
        Ok(StatusCode::OK)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

/// Read a stored chunk back with its content type.
pub(crate) async fn get_chunk(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Response, HttpError> {
    let hash = parse_hash(&hash)?;
    let blob = state
        .service
        .store()
        .get(hash)
        .await?
        .ok_or(HttpError::NotFound(hash))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, blob.kind.mime())],
        blob.data,
    )
        .into_response())
}
