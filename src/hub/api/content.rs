//! Handlers for docs, calendar and goals blocks.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::{NaiveDate, NaiveTime};
use podspace_common::BlockKind;
use serde::Deserialize;
use tracing::info;

use super::uploads::read_multipart;
use super::{ApiError, AuthUser, SharedState};
use crate::errors::HubError;
use crate::hub::db::{EventInput, GoalUpdate, HubDb, parse_goal_status};
use crate::hub::models::{BlockAccess, GoalStatus};
use crate::hub::ws::{HubEvent, broadcast_block_event};

const PDF: &str = "application/pdf";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockQuery {
    pub block_id: Option<i64>,
}

impl BlockQuery {
    fn require(&self) -> Result<i64, ApiError> {
        self.block_id
            .ok_or_else(|| ApiError::bad_request("blockId is required"))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRequest {
    pub block_id: Option<i64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub date: String,
    pub time: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGoalRequest {
    pub block_id: Option<i64>,
    #[serde(default)]
    pub title: String,
    pub due_date: Option<String>,
    pub status: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGoalRequest {
    pub title: Option<String>,
    pub due_date: Option<String>,
    pub status: Option<String>,
}

/// Block access for a block of `kind`; other kinds are rejected.
fn typed_access(db: &HubDb, block_id: i64, user_id: i64, kind: BlockKind) -> anyhow::Result<BlockAccess> {
    let access = db.block_access(block_id, user_id)?;
    if access.block.kind != kind {
        return Err(HubError::invalid(format!("Block is not a {kind} block")).into());
    }
    Ok(access)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn validate_date(date: &str) -> Result<(), HubError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| HubError::invalid("Date must be in YYYY-MM-DD format"))
}

fn validate_event(req: EventRequest) -> Result<EventInput, HubError> {
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(HubError::invalid("Title is required"));
    }
    let date = req.date.trim().to_string();
    validate_date(&date)?;
    let time = non_blank(req.time);
    if let Some(t) = &time {
        NaiveTime::parse_from_str(t, "%H:%M")
            .map_err(|_| HubError::invalid("Time must be in HH:MM format"))?;
    }
    Ok(EventInput {
        title,
        date,
        time,
        description: non_blank(req.description),
    })
}

/// `Content-Disposition` value with quotes and control characters stripped
/// from the file name.
fn attachment_header(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .filter(|c| *c != '"' && *c != '\\' && !c.is_control())
        .collect();
    format!("attachment; filename=\"{safe}\"")
}

// ── Documents ─────────────────────────────────────────────────────────

pub(super) async fn list_documents(
    State(state): State<SharedState>,
    auth: AuthUser,
    Query(query): Query<BlockQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let block_id = query.require()?;
    let user_id = auth.user.id;
    let documents = state
        .db
        .call(move |db| {
            typed_access(db, block_id, user_id, BlockKind::Docs)?;
            db.list_documents(block_id)
        })
        .await?;
    Ok(Json(serde_json::json!({"documents": documents})))
}

/// Multipart upload with a PDF `file` part and a `blockId` field.
pub(super) async fn upload_document(
    State(state): State<SharedState>,
    auth: AuthUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let (file, fields) = read_multipart(multipart).await?;
    let file = file.ok_or_else(|| ApiError::bad_request("No file provided"))?;
    let block_id: i64 = fields
        .get("blockId")
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| ApiError::bad_request("blockId is required"))?;
    if file.content_type != PDF {
        return Err(ApiError::bad_request("Only PDF files are allowed"));
    }
    let limit = state.config.uploads.max_document_bytes;
    if file.bytes.len() > limit {
        return Err(HubError::payload_too_large(limit).into());
    }

    let user_id = auth.user.id;
    let (audience, document) = state
        .db
        .call(move |db| {
            let access = typed_access(db, block_id, user_id, BlockKind::Docs)?;
            let document = db.create_document(
                block_id,
                user_id,
                &file.file_name,
                &file.content_type,
                &file.bytes,
            )?;
            Ok((db.block_audience(&access)?, document))
        })
        .await?;
    info!(document_id = document.id, block_id, size = document.size, "document uploaded");
    broadcast_block_event(
        &state.ws_tx,
        audience,
        &HubEvent::DocumentUploaded {
            document: document.clone(),
        },
    );
    Ok((StatusCode::CREATED, Json(serde_json::json!({"document": document}))))
}

pub(super) async fn download_document(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.user.id;
    let (document, bytes) = state
        .db
        .call(move |db| {
            let document = db.get_document(id)?.ok_or(HubError::NotFound("Document"))?;
            db.block_access(document.block_id, user_id)?;
            let bytes = db
                .document_bytes(id)?
                .ok_or(HubError::NotFound("Document"))?;
            Ok((document, bytes))
        })
        .await?;
    Ok((
        [
            (header::CONTENT_TYPE, document.content_type.clone()),
            (header::CONTENT_DISPOSITION, attachment_header(&document.file_name)),
        ],
        bytes,
    ))
}

pub(super) async fn delete_document(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.user.id;
    let (audience, block_id) = state
        .db
        .call(move |db| {
            let document = db.get_document(id)?.ok_or(HubError::NotFound("Document"))?;
            let access = db.block_access(document.block_id, user_id)?;
            if document.uploader_id != user_id && !access.can_manage(user_id) {
                return Err(HubError::forbidden(
                    "Only the uploader or block creator can delete this document",
                )
                .into());
            }
            db.delete_document(id)?;
            Ok((db.block_audience(&access)?, document.block_id))
        })
        .await?;
    broadcast_block_event(
        &state.ws_tx,
        audience,
        &HubEvent::DocumentDeleted {
            block_id,
            document_id: id,
        },
    );
    Ok(StatusCode::NO_CONTENT)
}

// ── Calendar ──────────────────────────────────────────────────────────

pub(super) async fn list_events(
    State(state): State<SharedState>,
    auth: AuthUser,
    Query(query): Query<BlockQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let block_id = query.require()?;
    let user_id = auth.user.id;
    let events = state
        .db
        .call(move |db| {
            typed_access(db, block_id, user_id, BlockKind::Calendar)?;
            db.list_events(block_id)
        })
        .await?;
    Ok(Json(serde_json::json!({"events": events})))
}

pub(super) async fn create_event(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(req): Json<EventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let block_id = req
        .block_id
        .ok_or_else(|| ApiError::bad_request("blockId is required"))?;
    let input = validate_event(req)?;
    let user_id = auth.user.id;
    let (audience, event) = state
        .db
        .call(move |db| {
            let access = typed_access(db, block_id, user_id, BlockKind::Calendar)?;
            Ok((db.block_audience(&access)?, db.create_event(block_id, user_id, &input)?))
        })
        .await?;
    broadcast_block_event(&state.ws_tx, audience, &HubEvent::EventCreated { event: event.clone() });
    Ok((StatusCode::CREATED, Json(serde_json::json!({"event": event}))))
}

/// Replace an event's fields. Same validation as creation.
pub(super) async fn update_event(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<EventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = validate_event(req)?;
    let user_id = auth.user.id;
    let (audience, event) = state
        .db
        .call(move |db| {
            let existing = db.get_event(id)?.ok_or(HubError::NotFound("Event"))?;
            let access = db.block_access(existing.block_id, user_id)?;
            if existing.creator_id != user_id && !access.can_manage(user_id) {
                return Err(HubError::forbidden(
                    "Only the event creator or block creator can edit this event",
                )
                .into());
            }
            Ok((db.block_audience(&access)?, db.update_event(id, &input)?))
        })
        .await?;
    broadcast_block_event(&state.ws_tx, audience, &HubEvent::EventUpdated { event: event.clone() });
    Ok(Json(serde_json::json!({"event": event})))
}

pub(super) async fn delete_event(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.user.id;
    let (audience, block_id) = state
        .db
        .call(move |db| {
            let event = db.get_event(id)?.ok_or(HubError::NotFound("Event"))?;
            let access = db.block_access(event.block_id, user_id)?;
            if event.creator_id != user_id && !access.can_manage(user_id) {
                return Err(HubError::forbidden(
                    "Only the event creator or block creator can delete this event",
                )
                .into());
            }
            db.delete_event(id)?;
            Ok((db.block_audience(&access)?, event.block_id))
        })
        .await?;
    broadcast_block_event(
        &state.ws_tx,
        audience,
        &HubEvent::EventDeleted {
            block_id,
            event_id: id,
        },
    );
    Ok(StatusCode::NO_CONTENT)
}

// ── Goals ─────────────────────────────────────────────────────────────

pub(super) async fn list_goals(
    State(state): State<SharedState>,
    auth: AuthUser,
    Query(query): Query<BlockQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let block_id = query.require()?;
    let user_id = auth.user.id;
    let goals = state
        .db
        .call(move |db| {
            typed_access(db, block_id, user_id, BlockKind::Goals)?;
            db.list_goals(block_id)
        })
        .await?;
    Ok(Json(serde_json::json!({"goals": goals})))
}

pub(super) async fn create_goal(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(req): Json<CreateGoalRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let block_id = req
        .block_id
        .ok_or_else(|| ApiError::bad_request("blockId is required"))?;
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::bad_request("Title is required"));
    }
    let due_date = non_blank(req.due_date);
    if let Some(d) = &due_date {
        validate_date(d)?;
    }
    let status = match non_blank(req.status) {
        Some(s) => parse_goal_status(&s)?,
        None => GoalStatus::default(),
    };

    let user_id = auth.user.id;
    let (audience, goal) = state
        .db
        .call(move |db| {
            let access = typed_access(db, block_id, user_id, BlockKind::Goals)?;
            let goal = db.create_goal(block_id, user_id, &title, due_date.as_deref(), status)?;
            Ok((db.block_audience(&access)?, goal))
        })
        .await?;
    broadcast_block_event(&state.ws_tx, audience, &HubEvent::GoalCreated { goal: goal.clone() });
    Ok((StatusCode::CREATED, Json(serde_json::json!({"goal": goal}))))
}

/// Partial update. Anyone with access to the block may move a goal along.
pub(super) async fn update_goal(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateGoalRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = req.title.map(|t| t.trim().to_string());
    if title.as_deref() == Some("") {
        return Err(ApiError::bad_request("Title cannot be empty"));
    }
    // An explicit empty string clears the due date.
    let due_date = req.due_date.map(|d| non_blank(Some(d)));
    if let Some(Some(d)) = &due_date {
        validate_date(d)?;
    }
    let status = non_blank(req.status)
        .map(|s| parse_goal_status(&s))
        .transpose()?;
    let update = GoalUpdate {
        title,
        due_date,
        status,
    };

    let user_id = auth.user.id;
    let (audience, goal) = state
        .db
        .call(move |db| {
            let existing = db.get_goal(id)?.ok_or(HubError::NotFound("Goal"))?;
            let access = db.block_access(existing.block_id, user_id)?;
            Ok((db.block_audience(&access)?, db.update_goal(id, &update)?))
        })
        .await?;
    broadcast_block_event(&state.ws_tx, audience, &HubEvent::GoalUpdated { goal: goal.clone() });
    Ok(Json(serde_json::json!({"goal": goal})))
}

pub(super) async fn delete_goal(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.user.id;
    let (audience, block_id) = state
        .db
        .call(move |db| {
            let goal = db.get_goal(id)?.ok_or(HubError::NotFound("Goal"))?;
            let access = db.block_access(goal.block_id, user_id)?;
            if goal.creator_id != user_id && !access.can_manage(user_id) {
                return Err(HubError::forbidden(
                    "Only the goal creator or block creator can delete this goal",
                )
                .into());
            }
            db.delete_goal(id)?;
            Ok((db.block_audience(&access)?, goal.block_id))
        })
        .await?;
    broadcast_block_event(
        &state.ws_tx,
        audience,
        &HubEvent::GoalDeleted {
            block_id,
            goal_id: id,
        },
    );
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::config::HubConfig;

    #[test]
    fn test_attachment_header_strips_quotes() {
        assert_eq!(
            attachment_header("q\"3\nplan.pdf"),
            "attachment; filename=\"q3plan.pdf\""
        );
    }

    #[tokio::test]
    async fn test_document_lifecycle() {
        let app = test_app();
        let (owner, owner_id) = login(&app, "owner@gmail.com", "Owner").await;
        let pod_id = create_pod(&app, &owner, "Pod").await;
        let block_id = create_block(&app, &owner, pod_id, "docs").await;
        let block_field = block_id.to_string();

        let (status, body) = send_multipart(
            &app,
            "/api/documents",
            Some(&owner),
            &[
                ("blockId", None, None, block_field.as_bytes()),
                ("file", Some("plan.pdf"), Some("application/pdf"), b"%PDF-1.4".as_slice()),
            ],
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["document"]["fileName"], "plan.pdf");
        assert_eq!(body["document"]["size"], 8);
        assert_eq!(body["document"]["uploaderId"], owner_id);
        let doc_id = body["document"]["id"].as_i64().unwrap();

        let (_, body) = send(&app, "GET", &format!("/api/documents?blockId={block_id}"), Some(&owner), None).await;
        assert_eq!(body["documents"].as_array().unwrap().len(), 1);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/documents/{doc_id}/download"))
                    .header("authorization", format!("Bearer {owner}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "application/pdf");
        assert_eq!(
            response.headers()["content-disposition"],
            "attachment; filename=\"plan.pdf\""
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"%PDF-1.4");

        let (status, _) = send(&app, "DELETE", &format!("/api/documents/{doc_id}"), Some(&owner), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "GET", &format!("/api/documents/{doc_id}/download"), Some(&owner), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_document_rejections() {
        let mut config = HubConfig::default();
        config.uploads.max_document_bytes = 4;
        let app = test_app_with(config);
        let (owner, _) = login(&app, "owner@gmail.com", "Owner").await;
        let pod_id = create_pod(&app, &owner, "Pod").await;
        let docs = create_block(&app, &owner, pod_id, "docs").await.to_string();
        let chat = create_block(&app, &owner, pod_id, "chat").await.to_string();

        let (status, body) = send_multipart(
            &app,
            "/api/documents",
            Some(&owner),
            &[
                ("blockId", None, None, docs.as_bytes()),
                ("file", Some("a.png"), Some("image/png"), b"png".as_slice()),
            ],
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Only PDF files are allowed");

        let (status, body) = send_multipart(
            &app,
            "/api/documents",
            Some(&owner),
            &[
                ("blockId", None, None, docs.as_bytes()),
                ("file", Some("big.pdf"), Some("application/pdf"), b"%PDF-1.4".as_slice()),
            ],
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("File size too large"));

        let (status, body) = send_multipart(
            &app,
            "/api/documents",
            Some(&owner),
            &[
                ("blockId", None, None, chat.as_bytes()),
                ("file", Some("a.pdf"), Some("application/pdf"), b"%P".as_slice()),
            ],
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Block is not a docs block");

        let (status, body) = send_multipart(
            &app,
            "/api/documents",
            Some(&owner),
            &[("file", Some("a.pdf"), Some("application/pdf"), b"%P".as_slice())],
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "blockId is required");
    }

    #[tokio::test]
    async fn test_calendar_events() {
        let app = test_app();
        let (owner, _) = login(&app, "owner@gmail.com", "Owner").await;
        let pod_id = create_pod(&app, &owner, "Pod").await;
        let block_id = create_block(&app, &owner, pod_id, "calendar").await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/calendar/events",
            Some(&owner),
            Some(json!({"blockId": block_id, "title": "Demo", "date": "2024-13-01"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Date must be in YYYY-MM-DD format");

        let (status, body) = send(
            &app,
            "POST",
            "/api/calendar/events",
            Some(&owner),
            Some(json!({"blockId": block_id, "title": "", "date": "2024-05-01"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Title is required");

        for (title, date, time) in [
            ("Launch", "2024-06-01", Some("09:30")),
            ("Kickoff", "2024-05-01", None),
            ("Standup", "2024-06-01", Some("08:00")),
        ] {
            let (status, _) = send(
                &app,
                "POST",
                "/api/calendar/events",
                Some(&owner),
                Some(json!({"blockId": block_id, "title": title, "date": date, "time": time})),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, body) = send(
            &app,
            "GET",
            &format!("/api/calendar/events?blockId={block_id}"),
            Some(&owner),
            None,
        )
        .await;
        let titles: Vec<&str> = body["events"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["Kickoff", "Standup", "Launch"]);
        let first_id = body["events"][0]["id"].as_i64().unwrap();

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/calendar/events/{first_id}"),
            Some(&owner),
            Some(json!({"title": "Kickoff v2", "date": "2024-05-02", "time": "25:00"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Time must be in HH:MM format");

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/calendar/events/{first_id}"),
            Some(&owner),
            Some(json!({"title": "Kickoff v2", "date": "2024-05-02", "description": "Room 4"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["event"]["title"], "Kickoff v2");
        assert_eq!(body["event"]["description"], "Room 4");

        let (status, _) = send(
            &app,
            "DELETE",
            &format!("/api/calendar/events/{first_id}"),
            Some(&owner),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_goals() {
        let app = test_app();
        let (owner, _) = login(&app, "owner@gmail.com", "Owner").await;
        let (member, member_id) = login(&app, "member@gmail.com", "Member").await;
        let pod_id = create_pod(&app, &owner, "Pod").await;
        send(
            &app,
            "POST",
            &format!("/api/pods/{pod_id}/members"),
            Some(&owner),
            Some(json!({"userId": member_id})),
        )
        .await;
        let block_id = create_block(&app, &owner, pod_id, "goals").await;
        send(
            &app,
            "POST",
            &format!("/api/blocks/{block_id}/members"),
            Some(&owner),
            Some(json!({"userId": member_id})),
        )
        .await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/goals",
            Some(&owner),
            Some(json!({"blockId": block_id, "title": "Ship v1", "status": "done"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid goal status: done");

        let (status, body) = send(
            &app,
            "POST",
            "/api/goals",
            Some(&owner),
            Some(json!({"blockId": block_id, "title": "Ship v1", "dueDate": "2024-09-30"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["goal"]["status"], "not_started");
        let goal_id = body["goal"]["id"].as_i64().unwrap();
        let uri = format!("/api/goals/{goal_id}");

        // Members may progress a goal but not delete someone else's.
        let (status, body) = send(&app, "PUT", &uri, Some(&member), Some(json!({"status": "in_progress"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["goal"]["status"], "in_progress");
        assert_eq!(body["goal"]["title"], "Ship v1");
        assert_eq!(body["goal"]["dueDate"], "2024-09-30");

        let (status, body) = send(&app, "PUT", &uri, Some(&member), Some(json!({"dueDate": "30/09"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Date must be in YYYY-MM-DD format");

        let (status, body) = send(&app, "PUT", &uri, Some(&member), Some(json!({"dueDate": ""}))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["goal"]["dueDate"].is_null());
        assert_eq!(body["goal"]["status"], "in_progress");

        let (status, _) = send(&app, "DELETE", &uri, Some(&member), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, body) = send(&app, "GET", &format!("/api/goals?blockId={block_id}"), Some(&member), None).await;
        assert_eq!(body["goals"].as_array().unwrap().len(), 1);

        let (status, _) = send(&app, "DELETE", &uri, Some(&owner), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
