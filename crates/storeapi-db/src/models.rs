//! Database row types, mapped directly from SQLite rows.
//! Kept apart from the storeapi-types API models so the password hash never
//! leaves this layer.

use storeapi_types::models::{Comment, Like, Post, PostWithLikes, User};

pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub password: String,
    pub confirmed: bool,
}

pub struct PostRow {
    pub id: i64,
    pub body: String,
    pub user_id: i64,
    pub image_url: Option<String>,
}

pub struct PostWithLikesRow {
    pub id: i64,
    pub body: String,
    pub user_id: i64,
    pub image_url: Option<String>,
    pub likes: i64,
}

pub struct CommentRow {
    pub id: i64,
    pub body: String,
    pub post_id: i64,
    pub user_id: i64,
}

pub struct LikeRow {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            confirmed: row.confirmed,
        }
    }
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            body: row.body,
            user_id: row.user_id,
            image_url: row.image_url,
        }
    }
}

impl From<PostWithLikesRow> for PostWithLikes {
    fn from(row: PostWithLikesRow) -> Self {
        Self {
            id: row.id,
            body: row.body,
            user_id: row.user_id,
            image_url: row.image_url,
            likes: row.likes,
        }
    }
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            body: row.body,
            post_id: row.post_id,
            user_id: row.user_id,
        }
    }
}

impl From<LikeRow> for Like {
    fn from(row: LikeRow) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            user_id: row.user_id,
        }
    }
}
