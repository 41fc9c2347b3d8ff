use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            confirmed   INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS posts (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            body        TEXT NOT NULL,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            image_url   TEXT
        );

        CREATE TABLE IF NOT EXISTS comments (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            body        TEXT NOT NULL,
            post_id     INTEGER NOT NULL REFERENCES posts(id),
            user_id     INTEGER NOT NULL REFERENCES users(id)
        );

        CREATE INDEX IF NOT EXISTS idx_comments_post
            ON comments(post_id);

        -- No UNIQUE(post_id, user_id): repeated likes are allowed
        CREATE TABLE IF NOT EXISTS likes (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id     INTEGER NOT NULL REFERENCES posts(id),
            user_id     INTEGER NOT NULL REFERENCES users(id)
        );

        CREATE INDEX IF NOT EXISTS idx_likes_post
            ON likes(post_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
