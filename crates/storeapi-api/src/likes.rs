use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use storeapi_types::api::CreateLikeRequest;
use storeapi_types::models::Like;

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::{AppState, with_db};

/// POST /like — repeated likes by the same user all count.
pub async fn like_post(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    payload: Result<Json<CreateLikeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    info!("User {} liking post {}", user.id, req.post_id);

    let post_id = req.post_id;
    if with_db(&state, move |db| db.get_post(post_id)).await?.is_none() {
        return Err(ApiError::PostNotFound);
    }

    let user_id = user.id;
    let like = with_db(&state, move |db| db.insert_like(post_id, user_id)).await?;

    Ok((StatusCode::CREATED, Json(Like::from(like))))
}
