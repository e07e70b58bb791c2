use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use podspace_common::{BlockKind, Member, mentions};
use serde::Deserialize;

use super::{ApiError, AuthUser, SharedState};
use crate::errors::HubError;
use crate::hub::db::HubDb;
use crate::hub::models::{BlockAccess, MAX_MESSAGE_LEN};
use crate::hub::ws::{HubEvent, broadcast_block_event};

#[derive(Deserialize)]
pub struct PostMessageRequest {
    #[serde(default)]
    pub message: String,
}

/// Block access for a chat block; other kinds are rejected.
fn chat_access(db: &HubDb, block_id: i64, user_id: i64) -> anyhow::Result<BlockAccess> {
    let access = db.block_access(block_id, user_id)?;
    if access.block.kind != BlockKind::Chat {
        return Err(HubError::invalid("Block is not a chat block").into());
    }
    Ok(access)
}

pub(super) async fn list_messages(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(block_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.user.id;
    let messages = state
        .db
        .call(move |db| {
            chat_access(db, block_id, user_id)?;
            db.list_messages(block_id)
        })
        .await?;
    Ok(Json(serde_json::json!({"messages": messages})))
}

/// Post a message. `@name` tokens are resolved against the block's members.
pub(super) async fn post_message(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(block_id): Path<i64>,
    Json(req): Json<PostMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let text = req.message.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::bad_request("Message cannot be empty"));
    }
    if text.chars().count() > MAX_MESSAGE_LEN {
        return Err(ApiError::bad_request(format!(
            "Message cannot exceed {MAX_MESSAGE_LEN} characters"
        )));
    }
    let user_id = auth.user.id;
    let (audience, message) = state
        .db
        .call(move |db| {
            let access = chat_access(db, block_id, user_id)?;
            let roster: Vec<Member> = db
                .block_members(block_id)?
                .into_iter()
                .map(|u| Member {
                    id: u.id,
                    name: u.name,
                    email: u.email,
                })
                .collect();
            let mentioned = mentions::mentioned_members(&text, &roster);
            let message = db.post_message(block_id, user_id, &text, &mentioned)?;
            Ok((db.block_audience(&access)?, message))
        })
        .await?;
    broadcast_block_event(
        &state.ws_tx,
        audience,
        &HubEvent::MessagePosted {
            message: message.clone(),
        },
    );
    Ok((StatusCode::CREATED, Json(serde_json::json!({"message": message}))))
}

/// Messages are never edited; the author or a block manager may delete one.
pub(super) async fn delete_message(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path((block_id, message_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.user.id;
    let audience = state
        .db
        .call(move |db| {
            let access = chat_access(db, block_id, user_id)?;
            let message = db
                .get_message(message_id)?
                .filter(|m| m.block_id == block_id)
                .ok_or(HubError::NotFound("Message"))?;
            if message.author_id != user_id && !access.can_manage(user_id) {
                return Err(HubError::forbidden("You can only delete your own messages").into());
            }
            db.delete_message(message_id)?;
            db.block_audience(&access)
        })
        .await?;
    broadcast_block_event(
        &state.ws_tx,
        audience,
        &HubEvent::MessageDeleted {
            block_id,
            message_id,
        },
    );
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn unread_notifications(
    State(state): State<SharedState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.user.id;
    let notifications = state
        .db
        .call(move |db| db.unread_notifications(user_id))
        .await?;
    Ok(Json(serde_json::json!({"notifications": notifications})))
}
