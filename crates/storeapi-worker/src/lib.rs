//! Background work for storeapi.
//!
//! Request handlers push [`queue::Job`]s onto an in-process channel and return
//! immediately. A fixed pool of tokio tasks drains the channel: sending mail
//! and running the post image enrichment workflow. Nothing is retried and
//! nothing about a job is persisted, so a job still running when the process
//! exits is lost.

pub mod enrichment;
pub mod error;
pub mod image;
pub mod mailer;
pub mod queue;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use enrichment::{EnrichmentRequest, EnrichmentState};
pub use error::WorkerError;
pub use image::{DeepAiClient, ImageGenerator};
pub use mailer::{Email, MailgunMailer, Mailer, obfuscate_email};
pub use queue::{Job, TaskQueue, WorkerContext, WorkerPool};
