use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

use super::{ApiError, AuthUser, SharedState};
use crate::errors::HubError;
use crate::hub::auth;
use crate::hub::models::{MemberView, PodDetail};
use crate::hub::ws::{HubEvent, broadcast_event};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePodRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tagline: String,
    pub logo_url: Option<String>,
}

#[derive(Deserialize)]
pub struct InviteRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub user_id: i64,
}

pub(super) async fn list_pods(
    State(state): State<SharedState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.user.id;
    let pods = state.db.call(move |db| db.list_pods_for_user(user_id)).await?;
    Ok(Json(serde_json::json!({"pods": pods})))
}

pub(super) async fn create_pod(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(req): Json<CreatePodRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::bad_request("Pod name is required"));
    }
    let tagline = req.tagline.trim().to_string();
    let logo_url = req.logo_url.filter(|u| !u.trim().is_empty());
    let user_id = auth.user.id;
    let pod = state
        .db
        .call(move |db| db.create_pod(user_id, &name, &tagline, logo_url.as_deref()))
        .await?;
    info!(pod_id = pod.id, user_id, "pod created");
    broadcast_event(&state.ws_tx, pod.id, &HubEvent::PodCreated { pod: pod.clone() });
    Ok((StatusCode::CREATED, Json(serde_json::json!({"pod": pod}))))
}

pub(super) async fn get_pod(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.user.id;
    let detail = state
        .db
        .call(move |db| {
            let pod = db.require_pod_access(id, user_id)?;
            let members = db.pod_members(id)?;
            Ok(PodDetail {
                pod,
                members: members.iter().map(MemberView::from).collect(),
            })
        })
        .await?;
    Ok(Json(serde_json::json!({"pod": detail})))
}

/// Add an existing user to the pod by email. No email is sent.
pub(super) async fn invite_member(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<InviteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();
    if !auth::looks_like_email(&email) {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    let user_id = auth.user.id;
    let member = state
        .db
        .call(move |db| {
            db.require_pod_creator(id, user_id)?;
            let Some(invitee) = db.get_user_by_email(&email)? else {
                return Ok(None);
            };
            if !db.add_pod_member(id, invitee.id)? {
                return Err(HubError::invalid("User is already a member of this pod").into());
            }
            Ok(Some(MemberView::from(&invitee)))
        })
        .await?
        .ok_or_else(|| ApiError::NotFound("User does not exist. They must sign up first.".into()))?;

    info!(pod_id = id, member_id = member.id, "pod member invited");
    broadcast_event(
        &state.ws_tx,
        id,
        &HubEvent::PodMemberAdded {
            pod_id: id,
            member: member.clone(),
        },
    );
    Ok(Json(serde_json::json!({"message": "User added to pod", "member": member})))
}

pub(super) async fn add_member(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<AddMemberRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.user.id;
    let target_id = req.user_id;
    let member = state
        .db
        .call(move |db| {
            db.require_pod_creator(id, user_id)?;
            let target = db.get_user(target_id)?.ok_or(HubError::NotFound("User"))?;
            if !db.add_pod_member(id, target.id)? {
                return Err(HubError::invalid("User is already a member of this pod").into());
            }
            Ok(MemberView::from(&target))
        })
        .await?;

    broadcast_event(
        &state.ws_tx,
        id,
        &HubEvent::PodMemberAdded {
            pod_id: id,
            member: member.clone(),
        },
    );
    Ok(Json(serde_json::json!({"member": member})))
}
