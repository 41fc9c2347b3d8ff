use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection, rejection::PathRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, info};

use storeapi_security::{TokenPurpose, hash_password, verify_password};
use storeapi_types::api::{
    DetailResponse, RegisterRequest, RegisterResponse, TokenRequest, TokenResponse,
};
use storeapi_types::models::User;
use storeapi_worker::{Email, Job, obfuscate_email};

use crate::error::ApiError;
use crate::{AppState, with_db};

/// POST /register — create an unconfirmed account and mail out a
/// confirmation link.
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    if req.email.trim().is_empty() {
        return Err(ApiError::Validation("email must not be empty".into()));
    }
    if req.password.is_empty() {
        return Err(ApiError::Validation("password must not be empty".into()));
    }

    let email = req.email.clone();
    if with_db(&state, move |db| db.get_user_by_email(&email)).await?.is_some() {
        return Err(ApiError::DuplicateUser);
    }

    // No row is written unless a confirmation token can be issued
    let token = state.tokens.issue(&req.email, TokenPurpose::Confirmation)?;
    let confirmation_url = format!("{}/confirm/{}", state.base_url, token);

    let password_hash = hash_password(&req.password)?;

    let email = req.email.clone();
    let user_id = with_db(&state, move |db| db.create_user(&email, &password_hash))
        .await?
        .ok_or(ApiError::DuplicateUser)?;
    info!("Registered user {} ({})", user_id, obfuscate_email(&req.email));

    state
        .queue
        .enqueue(Job::SendEmail(Email::registration(&req.email, &confirmation_url)));

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            detail: "User created. Please confirm your email.".into(),
            user: User {
                id: user_id,
                email: req.email,
                confirmed: false,
            },
            confirmation_url,
        }),
    ))
}

/// GET|POST /confirm/{token} — redeem a confirmation token. Confirming twice
/// is not an error.
pub async fn confirm(
    State(state): State<AppState>,
    token: Result<Path<String>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(token) = token?;

    let email = state.tokens.verify(&token, TokenPurpose::Confirmation)?;

    let lookup = email.clone();
    let found = with_db(&state, move |db| db.confirm_user(&lookup)).await?;
    if !found {
        return Err(ApiError::UserNotFound);
    }

    info!("Confirmed user {}", obfuscate_email(&email));
    Ok(Json(DetailResponse {
        detail: "User confirmed".into(),
    }))
}

/// POST /token — exchange credentials of a confirmed user for an access token.
pub async fn token(
    State(state): State<AppState>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    let user = authenticate(&state, &req.email, &req.password).await?;
    let access_token = state.tokens.issue(&user.email, TokenPurpose::Access)?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".into(),
    }))
}

pub async fn authenticate(state: &AppState, email: &str, password: &str) -> Result<User, ApiError> {
    debug!("Authenticating {}", obfuscate_email(email));

    let lookup = email.to_string();
    let row = with_db(state, move |db| db.get_user_by_email(&lookup))
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !verify_password(password, &row.password) {
        return Err(ApiError::InvalidCredentials);
    }

    if !row.confirmed {
        return Err(ApiError::UserNotConfirmed);
    }

    Ok(row.into())
}
