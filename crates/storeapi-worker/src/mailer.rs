use async_trait::async_trait;
use tracing::debug;

use crate::error::WorkerError;

const MAILGUN_API: &str = "https://api.mailgun.net/v3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Email {
    pub fn registration(email: &str, confirmation_url: &str) -> Self {
        Self {
            to: email.to_string(),
            subject: "Successfully signed up".into(),
            body: format!(
                "Hi {email}! You have successfully signed up to the Stores REST API. \
                 Please confirm your email by clicking on the following link: {confirmation_url}"
            ),
        }
    }

    pub fn image_completed(email: &str, post_url: &str) -> Self {
        Self {
            to: email.to_string(),
            subject: "Image generation completed".into(),
            body: format!(
                "Hi {email}! Your image has been generated and added to your post. \
                 Please click on the following link to view it: {post_url}"
            ),
        }
    }

    pub fn image_failed(email: &str) -> Self {
        Self {
            to: email.to_string(),
            subject: "Error generating image".into(),
            body: format!(
                "Hi {email}! Unfortunately there was an error generating an image for your post."
            ),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), WorkerError>;
}

/// Sends plain-text mail through the Mailgun HTTP API.
pub struct MailgunMailer {
    client: reqwest::Client,
    base_url: String,
    domain: Option<String>,
    api_key: Option<String>,
}

impl MailgunMailer {
    pub fn new(client: reqwest::Client, domain: Option<String>, api_key: Option<String>) -> Self {
        Self::with_base_url(client, MAILGUN_API, domain, api_key)
    }

    /// Mailer talking to a Mailgun-compatible API rooted at `base_url`.
    pub fn with_base_url(
        client: reqwest::Client,
        base_url: impl Into<String>,
        domain: Option<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            domain,
            api_key,
        }
    }
}

#[async_trait]
impl Mailer for MailgunMailer {
    async fn send(&self, email: &Email) -> Result<(), WorkerError> {
        let (Some(domain), Some(api_key)) = (&self.domain, &self.api_key) else {
            return Err(WorkerError::ExternalApi("Mailgun is not configured".into()));
        };

        debug!(
            "Sending email to {} with subject {:?}",
            obfuscate_email(&email.to),
            email.subject.chars().take(20).collect::<String>()
        );

        let from = format!("Store API <mailgun@{}>", domain);
        let response = self
            .client
            .post(format!("{}/{}/messages", self.base_url, domain))
            .basic_auth("api", Some(api_key))
            .form(&[
                ("from", from.as_str()),
                ("to", email.to.as_str()),
                ("subject", email.subject.as_str()),
                ("text", email.body.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        debug!("Mailgun responded {}", response.status());
        Ok(())
    }
}

/// Mask the local part of an address for log output, keeping two characters.
pub fn obfuscate_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let kept: String = local.chars().take(2).collect();
            let masked = local.chars().count().saturating_sub(2);
            format!("{}{}@{}", kept, "*".repeat(masked), domain)
        }
        None => "*".repeat(email.chars().count()),
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn obfuscates_local_part() {
        assert_eq!(obfuscate_email("alice@example.com"), "al***@example.com");
        assert_eq!(obfuscate_email("ab@example.com"), "ab@example.com");
        assert_eq!(obfuscate_email("a@example.com"), "a@example.com");
        assert_eq!(obfuscate_email("nope"), "****");
    }

    #[test]
    fn completion_mail_links_the_post() {
        let mail = Email::image_completed("a@example.com", "http://localhost:8000/post/7");
        assert_eq!(mail.to, "a@example.com");
        assert!(mail.body.contains("http://localhost:8000/post/7"));
    }

    #[test]
    fn registration_mail_carries_confirmation_url() {
        let mail = Email::registration("a@example.com", "http://localhost:8000/confirm/abc");
        assert!(mail.body.contains("http://localhost:8000/confirm/abc"));
    }

    #[tokio::test]
    async fn unconfigured_mailgun_fails_fast() {
        let mailer = MailgunMailer::new(reqwest::Client::new(), None, None);
        let result = mailer.send(&Email::image_failed("a@example.com")).await;
        assert!(matches!(result, Err(WorkerError::ExternalApi(_))));
    }

    fn mailer_for(server: &MockServer) -> MailgunMailer {
        MailgunMailer::with_base_url(
            reqwest::Client::new(),
            format!("{}/v3", server.uri()),
            Some("mg.example.com".into()),
            Some("key-test".into()),
        )
    }

    #[tokio::test]
    async fn posts_message_with_basic_auth_and_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/mg.example.com/messages"))
            // base64("api:key-test")
            .and(header("authorization", "Basic YXBpOmtleS10ZXN0"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("from=Store+API+%3Cmailgun%40mg.example.com%3E"))
            .and(body_string_contains("to=a%40example.com"))
            .and(body_string_contains("subject=Error+generating+image"))
            .and(body_string_contains("text=Hi+a%40example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"message": "Queued. Thank you."}"#))
            .expect(1)
            .mount(&server)
            .await;

        mailer_for(&server)
            .send(&Email::image_failed("a@example.com"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejected_send_is_external_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/mg.example.com/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Forbidden"))
            .mount(&server)
            .await;

        match mailer_for(&server).send(&Email::image_failed("a@example.com")).await {
            Err(WorkerError::ExternalApi(reason)) => assert!(reason.contains("401"), "{reason}"),
            other => panic!("expected external api error, got {other:?}"),
        }
    }
}
