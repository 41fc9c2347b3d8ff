use crate::Database;
use crate::models::{CommentRow, LikeRow, PostRow, PostWithLikesRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, Row};
use storeapi_types::api::PostSorting;

/// Posts joined with their like count. The outer join keeps posts nobody
/// has liked, with a count of zero.
const POSTS_WITH_LIKES: &str = "SELECT p.id, p.body, p.user_id, p.image_url, COUNT(l.id) AS likes
     FROM posts p
     LEFT OUTER JOIN likes l ON l.post_id = p.id";

impl Database {
    // -- Users --

    /// Inserts a new user. Returns `None` when the email is already taken,
    /// including when a concurrent registration won the race.
    pub fn create_user(&self, email: &str, password_hash: &str) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (email, password) VALUES (?1, ?2)
                 ON CONFLICT(email) DO NOTHING",
                (email, password_hash),
            )?;
            Ok((inserted > 0).then(|| conn.last_insert_rowid()))
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_email(conn, email))
    }

    /// Marks the user confirmed. Returns false when no such user exists;
    /// an already-confirmed user still counts as found.
    pub fn confirm_user(&self, email: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("UPDATE users SET confirmed = 1 WHERE email = ?1", [email])?;
            Ok(changed > 0)
        })
    }

    // -- Posts --

    pub fn insert_post(&self, body: &str, user_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (body, user_id) VALUES (?1, ?2)",
                rusqlite::params![body, user_id],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_post(&self, id: i64) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, body, user_id, image_url FROM posts WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(PostRow {
                            id: row.get(0)?,
                            body: row.get(1)?,
                            user_id: row.get(2)?,
                            image_url: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_post_with_likes(&self, id: i64) -> Result<Option<PostWithLikesRow>> {
        self.with_conn(|conn| {
            let sql = format!("{POSTS_WITH_LIKES} WHERE p.id = ?1 GROUP BY p.id");
            let row = conn.query_row(&sql, [id], post_with_likes).optional()?;
            Ok(row)
        })
    }

    pub fn list_posts_with_likes(&self, sorting: PostSorting) -> Result<Vec<PostWithLikesRow>> {
        self.with_conn(|conn| query_posts_with_likes(conn, sorting))
    }

    /// Returns false when the post no longer exists.
    pub fn set_post_image_url(&self, post_id: i64, image_url: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE posts SET image_url = ?1 WHERE id = ?2",
                rusqlite::params![image_url, post_id],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Comments --

    pub fn insert_comment(&self, body: &str, post_id: i64, user_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (body, post_id, user_id) VALUES (?1, ?2, ?3)",
                rusqlite::params![body, post_id, user_id],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_comments_for_post(&self, post_id: i64) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, body, post_id, user_id FROM comments WHERE post_id = ?1 ORDER BY id",
            )?;
            let rows = stmt
                .query_map([post_id], |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        body: row.get(1)?,
                        post_id: row.get(2)?,
                        user_id: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Likes --

    pub fn insert_like(&self, post_id: i64, user_id: i64) -> Result<LikeRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO likes (post_id, user_id) VALUES (?1, ?2)",
                rusqlite::params![post_id, user_id],
            )?;
            Ok(LikeRow {
                id: conn.last_insert_rowid(),
                post_id,
                user_id,
            })
        })
    }
}

fn query_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT id, email, password, confirmed FROM users WHERE email = ?1")?;

    let row = stmt
        .query_row([email], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                password: row.get(2)?,
                confirmed: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_posts_with_likes(conn: &Connection, sorting: PostSorting) -> Result<Vec<PostWithLikesRow>> {
    // Ties on like count fall back to id so the order is reproducible
    let order = match sorting {
        PostSorting::New => "p.id DESC",
        PostSorting::Old => "p.id ASC",
        PostSorting::MostLikes => "likes DESC, p.id ASC",
    };
    let sql = format!("{POSTS_WITH_LIKES} GROUP BY p.id ORDER BY {order}");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], post_with_likes)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn post_with_likes(row: &Row<'_>) -> rusqlite::Result<PostWithLikesRow> {
    Ok(PostWithLikesRow {
        id: row.get(0)?,
        body: row.get(1)?,
        user_id: row.get(2)?,
        image_url: row.get(3)?,
        likes: row.get(4)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
