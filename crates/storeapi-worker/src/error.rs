use thiserror::Error;

/// Failures inside background jobs. These never reach an HTTP caller; they
/// end the job and are reported to the user by email at most.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Malformed API response: {0}")]
    MalformedResponse(String),

    #[error("Post {0} no longer exists")]
    PostMissing(i64),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl From<reqwest::Error> for WorkerError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::ExternalApi(format!("request failed with status code {}", status)),
            None => Self::ExternalApi(format!("request failed: {}", e)),
        }
    }
}
