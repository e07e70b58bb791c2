use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

use super::{ApiError, AuthUser, SharedState};
use crate::errors::HubError;
use crate::hub::auth;
use crate::hub::models::MemberView;

const SEARCH_LIMIT: usize = 10;

#[derive(Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Deserialize)]
pub struct SigninRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

pub(super) async fn signup(
    State(state): State<SharedState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (email, name) = auth::validate_signup(&req.email, &req.password, &req.name, &state.config.auth)?;
    let password = req.password;
    // Key stretching runs on the blocking pool with the insert.
    let user = state
        .db
        .call(move |db| db.create_user(&email, &name, &auth::hash_password(&password)))
        .await?;
    info!(user_id = user.id, "user signed up");
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "User created successfully",
            "user": {"id": user.id, "email": user.email, "name": user.name},
        })),
    ))
}

pub(super) async fn signin(
    State(state): State<SharedState>,
    Json(req): Json<SigninRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }
    let (email, password) = (req.email, req.password);
    let user = state
        .db
        .call(move |db| match db.get_credentials(&email)? {
            Some((user, hash)) if auth::verify_password(&password, &hash) => Ok(user),
            _ => Err(HubError::Unauthorized("Invalid email or password".into()).into()),
        })
        .await?;

    let token = auth::new_session_token();
    let digest = auth::token_digest(&token);
    let ttl = state.config.auth.session_ttl_hours;
    let user_id = user.id;
    state
        .db
        .call(move |db| db.create_session(user_id, &digest, ttl))
        .await?;
    info!(user_id, "user signed in");
    Ok(Json(serde_json::json!({"token": token, "user": user})))
}

pub(super) async fn signout(
    State(state): State<SharedState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let digest = auth.token_digest;
    state.db.call(move |db| db.delete_session(&digest)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn current_user(auth: AuthUser) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(serde_json::json!({"user": auth.user})))
}

pub(super) async fn search_users(
    State(state): State<SharedState>,
    auth: AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let q = query.q.unwrap_or_default().trim().to_string();
    if q.chars().count() < 2 {
        return Ok(Json(serde_json::json!({"users": []})));
    }
    let caller = auth.user.id;
    let users = state
        .db
        .call(move |db| db.search_users(&q, caller, SEARCH_LIMIT))
        .await?;
    let users: Vec<MemberView> = users.iter().map(MemberView::from).collect();
    Ok(Json(serde_json::json!({"users": users})))
}
