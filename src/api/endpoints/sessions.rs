//! Session command endpoints: start, photo upload, skip, cancel.

use axum::extract::{Path, State};
use axum::Json;
use base64::Engine;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, PhotoUpload};
use crate::intake::{IntakeError, IntakeReply};
use crate::session::ClientId;

/// `POST /api/sessions/:id/start`
pub async fn start(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Json<IntakeReply> {
    Json(ctx.intake.start(&ClientId::from(id)))
}

/// `POST /api/sessions/:id/photos`
pub async fn upload_photo(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    Json(body): Json<PhotoUpload>,
) -> Result<Json<IntakeReply>, ApiError> {
    let bytes = photo_bytes(&body.data)?;
    let reply = ctx.intake.upload_photo(&ClientId::from(id), bytes).await?;
    Ok(Json(reply))
}

/// `POST /api/sessions/:id/skip`
pub async fn skip(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<IntakeReply>, ApiError> {
    let reply = ctx.intake.skip(&ClientId::from(id)).await?;
    Ok(Json(reply))
}

/// `POST /api/sessions/:id/cancel`
pub async fn cancel(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<IntakeReply>, ApiError> {
    let reply = ctx.intake.cancel(&ClientId::from(id))?;
    Ok(Json(reply))
}

/// Photo bytes from an upload body: bare base64 or a `data:image/...;base64,`
/// URL. A body with no image payload is an upload error, not a decode error.
fn photo_bytes(data: &str) -> Result<Vec<u8>, ApiError> {
    let payload = data.split_once(',').map_or(data, |(_, rest)| rest).trim();
    if payload.is_empty() {
        return Err(IntakeError::NoImage.into());
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| ApiError::BadRequest(format!("Photo is not valid base64: {e}")))
}
