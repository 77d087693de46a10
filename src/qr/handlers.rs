use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::{instrument, warn};

use crate::{
    qr::payload::ProfilePayload,
    response::{ApiError, ApiResponse},
    state::AppState,
    users::validation::parse_user_id,
};

#[derive(Debug, Deserialize)]
pub struct DecodeRequest {
    pub payload: String,
}

pub fn qr_routes() -> Router<AppState> {
    Router::new()
        .route("/users/:id/qr-payload", get(profile_payload))
        .route("/qr/decode", post(decode_payload))
}

/// Text to render into a QR image for the given user.
#[instrument(skip(state))]
pub async fn profile_payload(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    let id = parse_user_id(&id)?;
    let user = state.users.get_user_by_id(id).await?;
    let text = ProfilePayload::from_user(&user).encode().map_err(|e| {
        tracing::error!(error = %e, "encode profile payload failed");
        ApiError::Internal
    })?;
    Ok(Json(ApiResponse::success("QR payload generated", text)))
}

#[instrument(skip(body))]
pub async fn decode_payload(
    body: Result<Json<DecodeRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ProfilePayload>>, ApiError> {
    let Json(body) = body?;
    let payload = ProfilePayload::decode(&body.payload).map_err(|e| {
        warn!(error = %e, "rejected QR payload");
        ApiError::BadRequest(e.to_string())
    })?;
    Ok(Json(ApiResponse::success("QR payload decoded", payload)))
}
