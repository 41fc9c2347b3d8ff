use std::fmt;

use tracing::{info, warn};

use crate::error::WorkerError;
use crate::mailer::{Email, obfuscate_email};
use crate::queue::WorkerContext;

/// Input for one enrichment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentRequest {
    pub prompt: String,
    pub post_id: i64,
    pub post_url: String,
    pub email: String,
}

/// Progress of a single attempt. Posts created without a prompt never get one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentState {
    Scheduled,
    Calling,
    Succeeded { image_url: String },
    Failed { reason: String },
}

impl fmt::Display for EnrichmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheduled => write!(f, "scheduled"),
            Self::Calling => write!(f, "calling"),
            Self::Succeeded { .. } => write!(f, "succeeded"),
            Self::Failed { .. } => write!(f, "failed"),
        }
    }
}

/// Run one enrichment attempt to completion and return its terminal state.
///
/// On success the post's `image_url` is written before the completion mail
/// goes out. On any failure the post is left untouched and the user gets a
/// failure mail instead. Mail delivery problems are logged and do not change
/// the outcome.
pub async fn run(ctx: &WorkerContext, req: EnrichmentRequest) -> EnrichmentState {
    let mut state = EnrichmentState::Scheduled;
    advance(&mut state, EnrichmentState::Calling, req.post_id);

    let outcome = match generate_and_attach(ctx, &req).await {
        Ok(image_url) => EnrichmentState::Succeeded { image_url },
        Err(e) => EnrichmentState::Failed {
            reason: e.to_string(),
        },
    };
    advance(&mut state, outcome, req.post_id);

    let email = match &state {
        EnrichmentState::Succeeded { .. } => Email::image_completed(&req.email, &req.post_url),
        _ => Email::image_failed(&req.email),
    };
    if let Err(e) = ctx.mailer.send(&email).await {
        warn!(
            "Post {}: could not notify {}: {}",
            req.post_id,
            obfuscate_email(&req.email),
            e
        );
    }

    state
}

async fn generate_and_attach(ctx: &WorkerContext, req: &EnrichmentRequest) -> Result<String, WorkerError> {
    let image_url = ctx.images.generate(&req.prompt).await?;

    let db = ctx.db.clone();
    let post_id = req.post_id;
    let url = image_url.clone();
    let updated = tokio::task::spawn_blocking(move || db.set_post_image_url(post_id, &url))
        .await
        .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))??;

    if !updated {
        return Err(WorkerError::PostMissing(post_id));
    }

    Ok(image_url)
}

fn advance(state: &mut EnrichmentState, next: EnrichmentState, post_id: i64) {
    match &next {
        EnrichmentState::Failed { reason } => {
            warn!("Post {} enrichment {} -> {}: {}", post_id, state, next, reason)
        }
        _ => info!("Post {} enrichment {} -> {}", post_id, state, next),
    }
    *state = next;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use storeapi_db::Database;

    use super::*;
    use crate::testing::{FakeImages, RecordingMailer};

    fn setup(images: FakeImages) -> (WorkerContext, Arc<RecordingMailer>, i64) {
        let db = Database::open_in_memory().unwrap();
        let user_id = db.create_user("author@example.com", "hash").unwrap().unwrap();
        let post_id = db.insert_post("hello", user_id).unwrap();
        let mailer = Arc::new(RecordingMailer::default());
        let ctx = WorkerContext {
            db: Arc::new(db),
            mailer: mailer.clone(),
            images: Arc::new(images),
        };
        (ctx, mailer, post_id)
    }

    fn request(post_id: i64) -> EnrichmentRequest {
        EnrichmentRequest {
            prompt: "a cat on a couch".into(),
            post_id,
            post_url: format!("http://localhost:8000/post/{post_id}"),
            email: "author@example.com".into(),
        }
    }

    #[tokio::test]
    async fn success_attaches_image_and_sends_completion() {
        let (ctx, mailer, post_id) = setup(FakeImages::returning(r#"{"output_url": "X"}"#));

        let state = run(&ctx, request(post_id)).await;

        assert_eq!(state, EnrichmentState::Succeeded { image_url: "X".into() });
        let post = ctx.db.get_post(post_id).unwrap().unwrap();
        assert_eq!(post.image_url.as_deref(), Some("X"));

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Image generation completed");
        assert!(sent[0].body.contains(&format!("/post/{post_id}")));
    }

    #[tokio::test]
    async fn provider_failure_leaves_post_and_sends_failure() {
        let (ctx, mailer, post_id) = setup(FakeImages::failing());

        let state = run(&ctx, request(post_id)).await;

        assert!(matches!(state, EnrichmentState::Failed { .. }));
        assert_eq!(ctx.db.get_post(post_id).unwrap().unwrap().image_url, None);

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Error generating image");
        assert_eq!(sent[0].to, "author@example.com");
    }

    #[tokio::test]
    async fn malformed_response_counts_as_failure() {
        let (ctx, mailer, post_id) = setup(FakeImages::returning(r#"{"status": "done"}"#));

        let state = run(&ctx, request(post_id)).await;

        match state {
            EnrichmentState::Failed { reason } => assert!(reason.contains("output_url")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(ctx.db.get_post(post_id).unwrap().unwrap().image_url, None);
        assert_eq!(mailer.sent()[0].subject, "Error generating image");
    }

    #[tokio::test]
    async fn missing_post_counts_as_failure() {
        let (ctx, mailer, post_id) = setup(FakeImages::returning(r#"{"output_url": "X"}"#));

        let state = run(&ctx, request(post_id + 1)).await;

        match state {
            EnrichmentState::Failed { reason } => {
                assert!(reason.contains("no longer exists"), "{reason}")
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(ctx.db.get_post(post_id).unwrap().unwrap().image_url, None);

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Error generating image");
    }

    #[tokio::test]
    async fn mail_failure_does_not_undo_success() {
        let (mut ctx, _, post_id) = setup(FakeImages::returning(r#"{"output_url": "X"}"#));
        ctx.mailer = Arc::new(RecordingMailer::broken());

        let state = run(&ctx, request(post_id)).await;

        assert_eq!(state, EnrichmentState::Succeeded { image_url: "X".into() });
        assert_eq!(ctx.db.get_post(post_id).unwrap().unwrap().image_url.as_deref(), Some("X"));
    }
}
