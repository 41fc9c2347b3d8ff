use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use storeapi_db::Database;

use crate::enrichment::{self, EnrichmentRequest};
use crate::image::ImageGenerator;
use crate::mailer::{Email, Mailer, obfuscate_email};

/// A unit of fire-and-forget work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    SendEmail(Email),
    EnrichPost(EnrichmentRequest),
}

/// Producer half of the job channel, handed to request handlers.
///
/// Unbounded: enqueueing never waits, so a slow provider can never add
/// latency to the request that scheduled the job.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl TaskQueue {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Job>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns false if the workers are gone and the job was dropped.
    pub fn enqueue(&self, job: Job) -> bool {
        match self.tx.send(job) {
            Ok(()) => true,
            Err(mpsc::error::SendError(job)) => {
                warn!("Job queue closed, dropping {:?}", job_kind(&job));
                false
            }
        }
    }
}

/// Everything a worker needs to run jobs.
#[derive(Clone)]
pub struct WorkerContext {
    pub db: Arc<Database>,
    pub mailer: Arc<dyn Mailer>,
    pub images: Arc<dyn ImageGenerator>,
}

pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers sharing one receiver. Workers exit once every
    /// [`TaskQueue`] clone has been dropped and the channel is drained.
    pub fn spawn(ctx: WorkerContext, rx: mpsc::UnboundedReceiver<Job>, size: usize) -> Self {
        let rx = Arc::new(Mutex::new(rx));
        let handles = (0..size.max(1))
            .map(|worker_id| {
                let ctx = ctx.clone();
                let rx = rx.clone();
                tokio::spawn(async move {
                    loop {
                        let next = rx.lock().await.recv().await;
                        let Some(job) = next else { break };
                        debug!("Worker {} picked up {}", worker_id, job_kind(&job));
                        run_job(&ctx, job).await;
                    }
                    debug!("Worker {} stopped", worker_id);
                })
            })
            .collect::<Vec<_>>();

        info!("Started {} background workers", handles.len());
        Self { handles }
    }

    /// Wait for every worker to finish its remaining jobs.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!("Worker task ended abnormally: {}", e);
            }
        }
    }
}

pub async fn run_job(ctx: &WorkerContext, job: Job) {
    match job {
        Job::SendEmail(email) => {
            if let Err(e) = ctx.mailer.send(&email).await {
                warn!("Failed to send email to {}: {}", obfuscate_email(&email.to), e);
            }
        }
        Job::EnrichPost(req) => {
            enrichment::run(ctx, req).await;
        }
    }
}

fn job_kind(job: &Job) -> &'static str {
    match job {
        Job::SendEmail(_) => "send_email",
        Job::EnrichPost(_) => "enrich_post",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeImages, RecordingMailer};

    #[tokio::test]
    async fn pool_drains_queue_and_stops() {
        let mailer = Arc::new(RecordingMailer::default());
        let ctx = WorkerContext {
            db: Arc::new(Database::open_in_memory().unwrap()),
            mailer: mailer.clone(),
            images: Arc::new(FakeImages::failing()),
        };

        let (queue, rx) = TaskQueue::channel();
        let pool = WorkerPool::spawn(ctx, rx, 3);

        for i in 0..5 {
            assert!(queue.enqueue(Job::SendEmail(Email::image_failed(&format!("u{i}@example.com")))));
        }
        drop(queue);
        pool.join().await;

        assert_eq!(mailer.sent().len(), 5);
    }

    #[test]
    fn enqueue_after_close_reports_drop() {
        let (queue, rx) = TaskQueue::channel();
        drop(rx);
        assert!(!queue.enqueue(Job::SendEmail(Email::image_failed("a@example.com"))));
    }
}
