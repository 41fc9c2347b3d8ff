use axum::{
    Extension, Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use storeapi_types::api::CreateCommentRequest;
use storeapi_types::models::Comment;

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::{AppState, with_db};

/// POST /comment — the referenced post must exist; otherwise nothing is written.
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    payload: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    info!("Creating comment on post {}", req.post_id);

    let post_id = req.post_id;
    if with_db(&state, move |db| db.get_post(post_id)).await?.is_none() {
        return Err(ApiError::PostNotFound);
    }

    let body = req.body.clone();
    let user_id = user.id;
    let id = with_db(&state, move |db| db.insert_comment(&body, post_id, user_id)).await?;

    Ok((
        StatusCode::CREATED,
        Json(Comment {
            id,
            body: req.body,
            post_id,
            user_id,
        }),
    ))
}

/// GET /post/{post_id}/comment — empty for unknown posts.
pub async fn get_comments_on_post(
    State(state): State<AppState>,
    post_id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(post_id) = post_id?;

    let rows = with_db(&state, move |db| db.get_comments_for_post(post_id)).await?;
    let comments: Vec<Comment> = rows.into_iter().map(Into::into).collect();

    Ok(Json(comments))
}
