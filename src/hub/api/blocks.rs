use std::str::FromStr;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use podspace_common::{BlockKind, LayoutConfig, Position, next_position};
use serde::Deserialize;
use tracing::info;

use super::{ApiError, AuthUser, SharedState};
use crate::errors::HubError;
use crate::hub::db::BlockUpdate;
use crate::hub::models::MemberView;
use crate::hub::ws::{HubEvent, broadcast_block_event, broadcast_event};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodQuery {
    pub pod_id: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBlockRequest {
    pub pod_id: Option<i64>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

#[derive(Deserialize)]
pub struct UpdateBlockRequest {
    pub label: Option<String>,
    pub description: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddBlockMemberRequest {
    pub user_id: i64,
}

pub(super) async fn list_blocks(
    State(state): State<SharedState>,
    auth: AuthUser,
    Query(query): Query<PodQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let pod_id = query
        .pod_id
        .ok_or_else(|| ApiError::bad_request("podId is required"))?;
    let user_id = auth.user.id;
    let blocks = state
        .db
        .call(move |db| {
            db.require_pod_access(pod_id, user_id)?;
            db.list_blocks(pod_id)
        })
        .await?;
    Ok(Json(serde_json::json!({"blocks": blocks})))
}

/// Create a block. A missing coordinate places it in the next free slot
/// after the pod's existing blocks of the same type.
pub(super) async fn create_block(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(req): Json<CreateBlockRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let pod_id = req
        .pod_id
        .ok_or_else(|| ApiError::bad_request("podId is required"))?;
    let kind = BlockKind::from_str(req.kind.trim()).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let label = req.label.trim().to_string();
    if label.is_empty() {
        return Err(ApiError::bad_request("Label is required"));
    }
    let description = req.description.trim().to_string();
    let requested = match (req.x, req.y) {
        (Some(x), Some(y)) => Some(Position::new(x, y)),
        _ => None,
    };
    let user_id = auth.user.id;

    let block = state
        .db
        .call(move |db| {
            db.require_pod_access(pod_id, user_id)?;
            let position = match requested {
                Some(position) => position,
                None => next_position(&db.block_positions(pod_id, kind)?, &LayoutConfig::default()),
            };
            db.create_block(pod_id, kind, &label, &description, position, user_id)
        })
        .await?;

    info!(block_id = block.id, pod_id, kind = %block.kind, "block created");
    broadcast_event(&state.ws_tx, pod_id, &HubEvent::BlockCreated { block: block.clone() });
    Ok((StatusCode::CREATED, Json(serde_json::json!({"block": block}))))
}

pub(super) async fn update_block(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateBlockRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let label = req.label.map(|l| l.trim().to_string());
    if label.as_deref() == Some("") {
        return Err(ApiError::bad_request("Label cannot be empty"));
    }
    let update = BlockUpdate {
        label,
        description: req.description.map(|d| d.trim().to_string()),
        x: req.x,
        y: req.y,
    };
    let user_id = auth.user.id;
    let block = state
        .db
        .call(move |db| {
            db.require_block_manager(id, user_id)?;
            db.update_block(id, &update)
        })
        .await?;
    broadcast_event(&state.ws_tx, block.pod_id, &HubEvent::BlockUpdated { block: block.clone() });
    Ok(Json(serde_json::json!({"block": block})))
}

pub(super) async fn delete_block(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.user.id;
    let pod_id = state
        .db
        .call(move |db| {
            let access = db.require_block_manager(id, user_id)?;
            db.delete_block(id)?;
            Ok(access.block.pod_id)
        })
        .await?;
    info!(block_id = id, pod_id, "block deleted");
    broadcast_event(&state.ws_tx, pod_id, &HubEvent::BlockDeleted { block_id: id });
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn list_members(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.user.id;
    let members = state
        .db
        .call(move |db| {
            db.block_access(id, user_id)?;
            db.block_members(id)
        })
        .await?;
    let members: Vec<MemberView> = members.iter().map(MemberView::from).collect();
    Ok(Json(serde_json::json!({"members": members})))
}

pub(super) async fn add_member(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<AddBlockMemberRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.user.id;
    let target_id = req.user_id;
    let (audience, member) = state
        .db
        .call(move |db| {
            let access = db.require_block_manager(id, user_id)?;
            let target = db.get_user(target_id)?.ok_or(HubError::NotFound("User"))?;
            if !db.is_pod_member(access.block.pod_id, target.id)? {
                return Err(HubError::invalid("User must be a member of the pod first").into());
            }
            if !db.add_block_member(id, target.id)? {
                return Err(HubError::invalid("User is already a member of this block").into());
            }
            Ok((db.block_audience(&access)?, MemberView::from(&target)))
        })
        .await?;
    broadcast_block_event(
        &state.ws_tx,
        audience,
        &HubEvent::BlockMemberAdded {
            block_id: id,
            member: member.clone(),
        },
    );
    Ok(Json(serde_json::json!({"member": member})))
}

pub(super) async fn unread_count(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.user.id;
    let count = state
        .db
        .call(move |db| {
            db.block_access(id, user_id)?;
            db.unread_count(id, user_id)
        })
        .await?;
    Ok(Json(serde_json::json!({"unreadCount": count})))
}

pub(super) async fn mark_read(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.user.id;
    state
        .db
        .call(move |db| {
            db.block_access(id, user_id)?;
            db.mark_read(id, user_id)
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
