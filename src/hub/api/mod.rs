//! JSON API for the hub.
//!
//! | Module        | Routes                                             |
//! |---------------|----------------------------------------------------|
//! | `accounts`    | `/api/auth/*`, `/api/user`, `/api/user/search`     |
//! | `pods`        | `/api/pods/*`                                      |
//! | `blocks`      | `/api/blocks/*`                                    |
//! | `chat`        | `/api/chat/*`, `/api/notifications/unread`         |
//! | `content`     | `/api/documents/*`, `/api/calendar/*`, `/api/goals/*` |
//! | `uploads`     | `/api/upload`, `/api/upload/{id}`                  |
//! | `explore`     | `/api/explore/*`                                   |

mod accounts;
mod blocks;
mod chat;
mod content;
mod explore;
mod pods;
mod uploads;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::FromRequestParts,
    http::{HeaderMap, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use tokio::sync::broadcast;
use tracing::error;

use super::auth;
use super::db::DbHandle;
use super::models::User;
use super::ws::Envelope;
use crate::config::HubConfig;
use crate::errors::HubError;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub ws_tx: broadcast::Sender<Envelope>,
    pub config: HubConfig,
}

pub type SharedState = Arc<AppState>;

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    fn unauthorized() -> Self {
        Self::Unauthorized("Unauthorized".into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        let msg = err.to_string();
        match err {
            HubError::NotFound(_) => ApiError::NotFound(msg),
            HubError::Forbidden(_) => ApiError::Forbidden(msg),
            HubError::Unauthorized(_) => ApiError::Unauthorized(msg),
            HubError::Invalid(_) | HubError::Conflict(_) | HubError::PayloadTooLarge { .. } => {
                ApiError::BadRequest(msg)
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<HubError>() {
            Ok(hub) => hub.into(),
            Err(other) => {
                error!(error = format!("{other:#}"), "request failed");
                ApiError::Internal("Internal server error".into())
            }
        }
    }
}

// ── Authentication extractors ─────────────────────────────────────────

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Look up the live session for a raw bearer token.
pub(crate) async fn session_user(state: &AppState, token: &str) -> Result<Option<User>, ApiError> {
    let digest = auth::token_digest(token);
    Ok(state.db.call(move |db| db.get_session_user(&digest)).await?)
}

/// The caller, resolved from `Authorization: Bearer <token>`. Rejects with 401.
pub struct AuthUser {
    pub user: User,
    pub token_digest: String,
}

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(ApiError::unauthorized)?;
        let user = session_user(state, &token)
            .await?
            .ok_or_else(ApiError::unauthorized)?;
        Ok(AuthUser {
            user,
            token_digest: auth::token_digest(&token),
        })
    }
}

/// The caller if a valid bearer token was sent; never rejects.
pub struct MaybeUser(pub Option<User>);

impl FromRequestParts<SharedState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        match bearer_token(&parts.headers) {
            Some(token) => Ok(MaybeUser(session_user(state, &token).await?)),
            None => Ok(MaybeUser(None)),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/auth/signup", post(accounts::signup))
        .route("/api/auth/signin", post(accounts::signin))
        .route("/api/auth/signout", post(accounts::signout))
        .route("/api/user", get(accounts::current_user))
        .route("/api/user/search", get(accounts::search_users))
        .route("/api/pods", get(pods::list_pods).post(pods::create_pod))
        .route("/api/pods/{id}", get(pods::get_pod))
        .route("/api/pods/{id}/invite", post(pods::invite_member))
        .route("/api/pods/{id}/members", post(pods::add_member))
        .route("/api/blocks", get(blocks::list_blocks).post(blocks::create_block))
        .route(
            "/api/blocks/{id}",
            axum::routing::patch(blocks::update_block).delete(blocks::delete_block),
        )
        .route(
            "/api/blocks/{id}/members",
            get(blocks::list_members).post(blocks::add_member),
        )
        .route(
            "/api/blocks/{id}/unread",
            get(blocks::unread_count).post(blocks::mark_read),
        )
        .route(
            "/api/chat/{block_id}/messages",
            get(chat::list_messages).post(chat::post_message),
        )
        .route(
            "/api/chat/{block_id}/messages/{message_id}",
            delete(chat::delete_message),
        )
        .route("/api/notifications/unread", get(chat::unread_notifications))
        .route(
            "/api/documents",
            get(content::list_documents).post(content::upload_document),
        )
        .route("/api/documents/{id}", delete(content::delete_document))
        .route("/api/documents/{id}/download", get(content::download_document))
        .route(
            "/api/calendar/events",
            get(content::list_events).post(content::create_event),
        )
        .route(
            "/api/calendar/events/{id}",
            put(content::update_event).delete(content::delete_event),
        )
        .route("/api/goals", get(content::list_goals).post(content::create_goal))
        .route(
            "/api/goals/{id}",
            put(content::update_goal).delete(content::delete_goal),
        )
        .route("/api/upload", post(uploads::upload_image))
        .route("/api/upload/{id}", get(uploads::serve_image))
        .route(
            "/api/explore",
            get(explore::list_profiles).post(explore::create_profile),
        )
        .route("/api/explore/seed", post(explore::seed_profiles))
        .route(
            "/api/explore/{id}",
            get(explore::get_profile).delete(explore::delete_profile),
        )
        .route("/api/explore/{id}/like", post(explore::toggle_like))
        .route("/health", get(health_check))
}

async fn health_check() -> &'static str {
    "ok"
}

// ── Test support ──────────────────────────────────────────────────────


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_check() {
        let app = test_app();
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let app = test_app();
        let (status, body) = send(&app, "GET", "/api/pods", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");

        let (status, _) = send(&app, "GET", "/api/pods", Some("bogus"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, "Bearer  ".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, "Bearer tok123".parse().unwrap());
        assert_eq!(bearer_token(&headers).as_deref(), Some("tok123"));
    }

    #[test]
    fn test_hub_error_status_mapping() {
        let cases = [
            (HubError::NotFound("Pod"), StatusCode::NOT_FOUND),
            (HubError::forbidden("no"), StatusCode::FORBIDDEN),
            (HubError::Unauthorized("no".into()), StatusCode::UNAUTHORIZED),
            (HubError::invalid("bad"), StatusCode::BAD_REQUEST),
            (HubError::Conflict("taken".into()), StatusCode::BAD_REQUEST),
            (HubError::payload_too_large(1024 * 1024), StatusCode::BAD_REQUEST),
        ];
        for (err, expected) in cases {
            let api: ApiError = anyhow::Error::from(err).into();
            assert_eq!(api.into_response().status(), expected);
        }
    }

    #[test]
    fn test_other_errors_are_internal() {
        let api: ApiError = anyhow::anyhow!("disk on fire").into();
        match api {
            ApiError::Internal(msg) => assert_eq!(msg, "Internal server error"),
            other => panic!("expected Internal, got {other:?}"),
        }
    }
}
