use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
    typed_header::TypedHeaderRejection,
};
use tracing::debug;

use storeapi_security::TokenPurpose;
use storeapi_types::models::User;
use storeapi_worker::obfuscate_email;

use crate::AppState;
use crate::error::ApiError;
use crate::with_db;

/// The authenticated caller, placed in request extensions by [`require_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Resolve the bearer token to a stored user and hand it to the handler.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(auth) = bearer.map_err(|e| {
        debug!("Missing or malformed Authorization header: {}", e);
        ApiError::InvalidToken
    })?;

    let user = resolve_user(&state, auth.token()).await?;

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

pub async fn resolve_user(state: &AppState, token: &str) -> Result<User, ApiError> {
    let email = state.tokens.verify(token, TokenPurpose::Access)?;

    let lookup = email.clone();
    let row = with_db(state, move |db| db.get_user_by_email(&lookup))
        .await?
        .ok_or_else(|| {
            debug!("Token subject {} has no account", obfuscate_email(&email));
            ApiError::UserNotFound
        })?;

    Ok(row.into())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        Extension, Router,
        body::Body,
        http::{Request, StatusCode, header::AUTHORIZATION},
        middleware::from_fn_with_state,
        routing::get,
    };
    use chrono::{Duration, Utc};
    use storeapi_db::Database;
    use storeapi_security::TokenService;
    use storeapi_worker::TaskQueue;
    use tower::ServiceExt;

    use super::*;
    use crate::AppStateInner;

    async fn whoami(Extension(CurrentUser(user)): Extension<CurrentUser>) -> String {
        user.email
    }

    fn app() -> (Router, AppState) {
        let db = Database::open_in_memory().unwrap();
        db.create_user("a@example.com", "hash").unwrap();
        let (queue, _rx) = TaskQueue::channel();
        let state: AppState = Arc::new(AppStateInner {
            db: Arc::new(db),
            tokens: TokenService::new(Some("middleware-secret")),
            queue,
            base_url: "http://localhost:8000".into(),
        });
        let router = Router::new()
            .route("/me", get(whoami))
            .layer(from_fn_with_state(state.clone(), require_auth))
            .with_state(state.clone());
        (router, state)
    }

    fn request(auth: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/me");
        if let Some(value) = auth {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn valid_access_token_passes() {
        let (app, state) = app();
        let token = state.tokens.issue("a@example.com", TokenPurpose::Access).unwrap();

        let response = app.oneshot(request(Some(&format!("Bearer {token}")))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "a@example.com");
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let (app, _) = app();
        let response = app.oneshot(request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_rejected() {
        let (app, _) = app();
        let response = app.oneshot(request(Some("Basic YTpi"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn expired_token_says_so() {
        let (app, state) = app();
        let token = state
            .tokens
            .issue_at("a@example.com", TokenPurpose::Access, Duration::minutes(-1), Utc::now())
            .unwrap();

        let response = app.oneshot(request(Some(&format!("Bearer {token}")))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_text(response).await.contains("Token has expired"));
    }

    #[tokio::test]
    async fn confirmation_token_is_not_an_access_token() {
        let (app, state) = app();
        let token = state.tokens.issue("a@example.com", TokenPurpose::Confirmation).unwrap();

        let response = app.oneshot(request(Some(&format!("Bearer {token}")))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_text(response).await.contains("Could not validate credentials"));
    }

    #[tokio::test]
    async fn unknown_subject_is_generic_failure() {
        let (app, state) = app();
        let token = state.tokens.issue("ghost@example.com", TokenPurpose::Access).unwrap();

        let response = app.oneshot(request(Some(&format!("Bearer {token}")))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_text(response).await.contains("Could not validate credentials"));
    }
}
