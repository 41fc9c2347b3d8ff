use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::WorkerError;

const DEEPAI_ENDPOINT: &str = "https://api.deepai.org/api/cute-creature-generator";

/// Upper bound on a single generation call.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate an image for `prompt` and return its URL.
    async fn generate(&self, prompt: &str) -> Result<String, WorkerError>;
}

pub struct DeepAiClient {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
    timeout: Duration,
}

impl DeepAiClient {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self::with_endpoint(client, api_key, DEEPAI_ENDPOINT)
    }

    /// Client posting to `endpoint` instead of the public DeepAI generator.
    pub fn with_endpoint(client: reqwest::Client, api_key: Option<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            api_key,
            endpoint: endpoint.into(),
            timeout: GENERATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ImageGenerator for DeepAiClient {
    async fn generate(&self, prompt: &str) -> Result<String, WorkerError> {
        let Some(api_key) = &self.api_key else {
            return Err(WorkerError::ExternalApi("DeepAI is not configured".into()));
        };

        debug!(
            "Generating image with prompt {:?}",
            prompt.chars().take(20).collect::<String>()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("api-key", api_key)
            .form(&[("text", prompt)])
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        parse_output_url(&body)
    }
}

#[derive(Deserialize)]
struct GenerationResponse {
    output_url: Option<String>,
}

/// Pull `output_url` out of a generation response body.
pub fn parse_output_url(body: &str) -> Result<String, WorkerError> {
    let parsed: GenerationResponse = serde_json::from_str(body)
        .map_err(|e| WorkerError::MalformedResponse(format!("not valid JSON: {}", e)))?;

    parsed
        .output_url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| WorkerError::MalformedResponse("missing output_url".into()))
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn extracts_output_url() {
        let url = parse_output_url(r#"{"id": "abc", "output_url": "https://img/cat.png"}"#).unwrap();
        assert_eq!(url, "https://img/cat.png");
    }

    #[test]
    fn missing_field_is_malformed() {
        assert!(matches!(
            parse_output_url(r#"{"id": "abc"}"#),
            Err(WorkerError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_output_url(r#"{"output_url": ""}"#),
            Err(WorkerError::MalformedResponse(_))
        ));
    }

    #[test]
    fn non_json_is_malformed() {
        assert!(matches!(
            parse_output_url("<html>502 Bad Gateway</html>"),
            Err(WorkerError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn unconfigured_client_fails_fast() {
        let client = DeepAiClient::new(reqwest::Client::new(), None);
        assert!(matches!(client.generate("a cat").await, Err(WorkerError::ExternalApi(_))));
    }

    // -- Against a live HTTP server --

    const GENERATOR_PATH: &str = "/api/cute-creature-generator";

    fn client_for(server: &MockServer) -> DeepAiClient {
        DeepAiClient::with_endpoint(
            reqwest::Client::new(),
            Some("deepai-test-key".into()),
            format!("{}{}", server.uri(), GENERATOR_PATH),
        )
    }

    #[tokio::test]
    async fn sends_key_header_and_prompt_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATOR_PATH))
            .and(header("api-key", "deepai-test-key"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("text=a+cat"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"id": "1", "output_url": "https://img/cat.png"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let url = client_for(&server).generate("a cat").await.unwrap();
        assert_eq!(url, "https://img/cat.png");
    }

    #[tokio::test]
    async fn server_error_is_external_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATOR_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string(r#"{"output_url": "ignored"}"#))
            .mount(&server)
            .await;

        match client_for(&server).generate("a cat").await {
            Err(WorkerError::ExternalApi(reason)) => assert!(reason.contains("500"), "{reason}"),
            other => panic!("expected external api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ok_without_output_url_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATOR_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id": "1", "status": "queued"}"#))
            .mount(&server)
            .await;

        assert!(matches!(
            client_for(&server).generate("a cat").await,
            Err(WorkerError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATOR_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"output_url": "https://img/late.png"}"#)
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).with_timeout(Duration::from_millis(100));
        assert!(matches!(client.generate("a cat").await, Err(WorkerError::ExternalApi(_))));
    }
}
