use std::str::FromStr;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

use super::{ApiError, AuthUser, MaybeUser, SharedState};
use crate::errors::HubError;
use crate::hub::db::NewProfile;
use crate::hub::models::{ExploreProfile, ProfileFields, ProfileKind};
use crate::hub::seed::{self, SeedOutcome};

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub featured: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProfileRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub pod_id: Option<i64>,
    pub is_published: Option<bool>,
    #[serde(flatten)]
    pub fields: ProfileFields,
}

fn parse_kind(kind: &str) -> Result<ProfileKind, ApiError> {
    ProfileKind::from_str(kind.trim()).map_err(ApiError::BadRequest)
}

pub(super) async fn list_profiles(
    State(state): State<SharedState>,
    MaybeUser(viewer): MaybeUser,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = match query.kind.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(k) => Some(parse_kind(k)?),
    };
    let featured = query.featured;
    let viewer_id = viewer.map(|u| u.id);
    let profiles = state
        .db
        .call(move |db| db.list_profiles(kind, featured, viewer_id))
        .await?;
    Ok(Json(serde_json::json!({"profiles": profiles})))
}

/// Fetch a profile and count the view. Drafts are visible to their owner only.
pub(super) async fn get_profile(
    State(state): State<SharedState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer_id = viewer.map(|u| u.id);
    let profile = state
        .db
        .call(move |db| {
            let profile = db
                .get_profile(id, viewer_id)?
                .filter(|p| p.is_published || Some(p.owner_id) == viewer_id)
                .ok_or(HubError::NotFound("Profile"))?;
            db.increment_profile_views(id)?;
            Ok(ExploreProfile {
                view_count: profile.view_count + 1,
                ..profile
            })
        })
        .await?;
    Ok(Json(serde_json::json!({"profile": profile})))
}

pub(super) async fn create_profile(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(req): Json<CreateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = match req.kind.as_deref().map(str::trim) {
        None | Some("") => return Err(ApiError::bad_request("Profile type is required")),
        Some(k) => parse_kind(k)?,
    };
    let fields = req.fields.normalized();
    if fields.name.is_empty() {
        return Err(ApiError::bad_request("Name is required"));
    }
    let mut new = NewProfile::published(kind, fields);
    new.pod_id = req.pod_id;
    new.is_published = req.is_published.unwrap_or(true);

    let user_id = auth.user.id;
    let profile = state
        .db
        .call(move |db| {
            if let Some(pod_id) = new.pod_id {
                db.require_pod_access(pod_id, user_id)?;
            }
            db.create_profile(user_id, &new)
        })
        .await?;
    info!(profile_id = profile.id, kind = profile.kind.as_str(), "explore profile created");
    Ok((StatusCode::CREATED, Json(serde_json::json!({"profile": profile}))))
}

pub(super) async fn toggle_like(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.user.id;
    let (liked, count) = state
        .db
        .call(move |db| db.toggle_like(id, user_id))
        .await?;
    Ok(Json(serde_json::json!({"liked": liked, "likesCount": count})))
}

pub(super) async fn delete_profile(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.user.id;
    state
        .db
        .call(move |db| {
            let profile = db
                .get_profile(id, Some(user_id))?
                .ok_or(HubError::NotFound("Profile"))?;
            if profile.owner_id != user_id {
                return Err(HubError::forbidden("Only the owner can delete this profile").into());
            }
            db.delete_profile(id)?;
            Ok(())
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn seed_profiles(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.db.call(seed::seed_explore).await?;
    let response = match outcome {
        SeedOutcome::AlreadySeeded { count } => (
            StatusCode::OK,
            Json(serde_json::json!({"message": "Profiles already seeded", "count": count})),
        ),
        SeedOutcome::Created { names } => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "message": "Successfully seeded startup profiles",
                "count": names.len(),
                "profiles": names,
            })),
        ),
    };
    Ok(response)
}
