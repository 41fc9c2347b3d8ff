use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use storeapi_security::TokenError;
use storeapi_types::api::DetailResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("A user with that email already exists")]
    DuplicateUser,

    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("User has not confirmed email")]
    UserNotConfirmed,

    #[error("Could not validate credentials")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    // Same message as InvalidToken: callers learn nothing about which check failed
    #[error("Could not validate credentials")]
    UserNotFound,

    #[error("Post not found")]
    PostNotFound,

    #[error("{0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::DuplicateUser => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials
            | Self::UserNotConfirmed
            | Self::InvalidToken
            | Self::ExpiredToken
            | Self::UserNotFound => StatusCode::UNAUTHORIZED,
            Self::PostNotFound => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self {
            Self::Internal(e) => {
                error!("Internal error: {:#}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut response = (status, Json(DetailResponse { detail })).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => Self::ExpiredToken,
            TokenError::Invalid(_) => Self::InvalidToken,
            TokenError::MissingSecret | TokenError::Encoding(_) => Self::Internal(e.into()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}
