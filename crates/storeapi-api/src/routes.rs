use axum::{
    Json, Router,
    middleware,
    routing::{get, post},
};
use serde_json::{Value, json};

use crate::middleware::require_auth;
use crate::{AppState, auth, comments, likes, posts};

/// Build the full HTTP surface. Writes to posts, comments and likes sit
/// behind [`require_auth`]; everything else is public.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/confirm/{token}", get(auth::confirm).post(auth::confirm))
        .route("/token", post(auth::token))
        .route("/post", get(posts::list_posts))
        .route("/post/{post_id}", get(posts::get_post_with_comments))
        .route("/post/{post_id}/comment", get(comments::get_comments_on_post))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/post", post(posts::create_post))
        .route("/comment", post(comments::create_comment))
        .route("/like", post(likes::like_post))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
