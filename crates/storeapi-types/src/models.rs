use serde::{Deserialize, Serialize};

/// A registered account as exposed to handlers. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub confirmed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub body: String,
    pub user_id: i64,
    pub image_url: Option<String>,
}

/// A post together with its aggregated like count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostWithLikes {
    pub id: i64,
    pub body: String,
    pub user_id: i64,
    pub image_url: Option<String>,
    pub likes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub body: String,
    pub post_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Like {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
}
