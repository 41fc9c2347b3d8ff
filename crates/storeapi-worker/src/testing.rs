//! Fakes for the external providers.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::WorkerError;
use crate::image::{ImageGenerator, parse_output_url};
use crate::mailer::{Email, Mailer};

/// Image generator that answers every prompt with a canned response body,
/// or with a provider error.
pub struct FakeImages {
    response: Option<String>,
}

impl FakeImages {
    pub fn returning(body: &str) -> Self {
        Self {
            response: Some(body.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self { response: None }
    }
}

#[async_trait]
impl ImageGenerator for FakeImages {
    async fn generate(&self, _prompt: &str) -> Result<String, WorkerError> {
        match &self.response {
            Some(body) => parse_output_url(body),
            None => Err(WorkerError::ExternalApi(
                "request failed with status code 500 Internal Server Error".into(),
            )),
        }
    }
}

/// Mailer that keeps every message it is asked to send.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
    broken: bool,
}

impl RecordingMailer {
    /// A mailer whose every send fails.
    pub fn broken() -> Self {
        Self {
            sent: Mutex::default(),
            broken: true,
        }
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<(), WorkerError> {
        if self.broken {
            return Err(WorkerError::ExternalApi("mail provider unavailable".into()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }
        Ok(())
    }
}
