use serde::{Deserialize, Serialize};

use crate::models::{Comment, PostWithLikes, User};

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub detail: String,
    pub user: User,
    pub confirmation_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Plain `{"detail": ...}` body, used for acknowledgements and errors alike.
#[derive(Debug, Serialize, Deserialize)]
pub struct DetailResponse {
    pub detail: String,
}

// -- Posts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    pub body: String,
    /// Optional image-generation prompt. When present the post is enriched
    /// in the background.
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostSorting {
    #[default]
    New,
    Old,
    MostLikes,
}

#[derive(Debug, Default, Deserialize)]
pub struct PostQuery {
    #[serde(default)]
    pub sorting: PostSorting,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostWithComments {
    pub post: PostWithLikes,
    pub comments: Vec<Comment>,
}

// -- Comments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCommentRequest {
    pub body: String,
    pub post_id: i64,
}

// -- Likes --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateLikeRequest {
    pub post_id: i64,
}
