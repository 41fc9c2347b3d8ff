use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, info};

use storeapi_types::api::{CreatePostRequest, PostQuery, PostWithComments};
use storeapi_types::models::{Comment, Post, PostWithLikes};
use storeapi_worker::{EnrichmentRequest, Job};

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::{AppState, with_db};

/// POST /post — create a post. A non-blank `prompt` schedules image
/// enrichment; the response does not wait for it.
pub async fn create_post(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    info!("Creating post for user {}", user.id);

    let body = req.body.clone();
    let user_id = user.id;
    let post_id = with_db(&state, move |db| db.insert_post(&body, user_id)).await?;

    if let Some(prompt) = req.prompt.filter(|p| !p.trim().is_empty()) {
        let post_url = format!("{}/post/{}", state.base_url, post_id);
        debug!("Scheduling enrichment for post {}", post_id);
        state.queue.enqueue(Job::EnrichPost(EnrichmentRequest {
            prompt,
            post_id,
            post_url,
            email: user.email.clone(),
        }));
    }

    Ok((
        StatusCode::CREATED,
        Json(Post {
            id: post_id,
            body: req.body,
            user_id,
            image_url: None,
        }),
    ))
}

/// GET /post?sorting=new|old|most_likes
pub async fn list_posts(
    State(state): State<AppState>,
    query: Result<Query<PostQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    info!("Listing posts sorted by {:?}", query.sorting);

    let rows = with_db(&state, move |db| db.list_posts_with_likes(query.sorting)).await?;
    let posts: Vec<PostWithLikes> = rows.into_iter().map(Into::into).collect();

    Ok(Json(posts))
}

/// GET /post/{post_id} — a post, its like count and its comments.
pub async fn get_post_with_comments(
    State(state): State<AppState>,
    post_id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(post_id) = post_id?;

    let (post, comments) = with_db(&state, move |db| {
        let post = db.get_post_with_likes(post_id)?;
        let comments = match post {
            Some(_) => db.get_comments_for_post(post_id)?,
            None => Vec::new(),
        };
        Ok((post, comments))
    })
    .await?;

    let post = post.ok_or(ApiError::PostNotFound)?;

    Ok(Json(PostWithComments {
        post: post.into(),
        comments: comments.into_iter().map(Comment::from).collect(),
    }))
}
