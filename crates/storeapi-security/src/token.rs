use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Lifetime of an access token.
pub const ACCESS_TOKEN_TTL_MINUTES: i64 = 30;
/// Lifetime of an email-confirmation token.
pub const CONFIRMATION_TOKEN_TTL_MINUTES: i64 = 1440;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Access,
    Confirmation,
}

impl TokenPurpose {
    pub fn default_ttl(self) -> Duration {
        match self {
            Self::Access => Duration::minutes(ACCESS_TOKEN_TTL_MINUTES),
            Self::Confirmation => Duration::minutes(CONFIRMATION_TOKEN_TTL_MINUTES),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Confirmation => "confirmation",
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token signing key is not configured")]
    MissingSecret,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Token has expired")]
    Expired,

    #[error("Token encoding failed: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(rename = "type")]
    purpose: TokenPurpose,
    iat: i64,
    exp: i64,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Issues and verifies purpose-bound bearer tokens.
///
/// Built from an optional secret so a missing key surfaces on first use as
/// [`TokenError::MissingSecret`] instead of at construction time.
#[derive(Clone)]
pub struct TokenService {
    keys: Option<std::sync::Arc<Keys>>,
}

impl TokenService {
    pub fn new(secret: Option<&str>) -> Self {
        let keys = secret.filter(|s| !s.is_empty()).map(|s| {
            std::sync::Arc::new(Keys {
                encoding: EncodingKey::from_secret(s.as_bytes()),
                decoding: DecodingKey::from_secret(s.as_bytes()),
            })
        });
        Self { keys }
    }

    pub fn is_configured(&self) -> bool {
        self.keys.is_some()
    }

    /// Issue a token valid for the purpose's default lifetime.
    pub fn issue(&self, subject: &str, purpose: TokenPurpose) -> Result<String, TokenError> {
        self.issue_at(subject, purpose, purpose.default_ttl(), Utc::now())
    }

    pub fn issue_at(
        &self,
        subject: &str,
        purpose: TokenPurpose,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let keys = self.keys.as_ref().ok_or(TokenError::MissingSecret)?;

        let claims = Claims {
            sub: subject.to_string(),
            purpose,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)?;
        Ok(token)
    }

    /// Verify a token and return its subject.
    pub fn verify(&self, token: &str, expected: TokenPurpose) -> Result<String, TokenError> {
        self.verify_at(token, expected, Utc::now())
    }

    pub fn verify_at(
        &self,
        token: &str,
        expected: TokenPurpose,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let keys = self.keys.as_ref().ok_or(TokenError::MissingSecret)?;

        // Expiry is checked below against the supplied clock, with no leeway
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = decode::<Claims>(token, &keys.decoding, &validation).map_err(|e| {
            debug!("Token rejected: {}", e);
            TokenError::Invalid("signature or format".into())
        })?;
        let claims = data.claims;

        if now.timestamp() > claims.exp {
            return Err(TokenError::Expired);
        }

        if claims.purpose != expected {
            return Err(TokenError::Invalid(format!(
                "incorrect type, expected '{}'",
                expected.as_str()
            )));
        }

        if claims.sub.is_empty() {
            return Err(TokenError::Invalid("missing subject".into()));
        }

        Ok(claims.sub)
    }
}
