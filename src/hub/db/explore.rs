use std::str::FromStr;

use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, params};

use super::{HubDb, from_json_text, to_json_text};
use crate::errors::HubError;
use crate::hub::models::{ExploreProfile, ProfileFields, ProfileKind};

/// A profile to insert.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub pod_id: Option<i64>,
    pub kind: ProfileKind,
    pub fields: ProfileFields,
    pub is_published: bool,
    pub is_featured: bool,
    pub view_count: i64,
}

impl NewProfile {
    /// A published, unfeatured profile with no views.
    pub fn published(kind: ProfileKind, fields: ProfileFields) -> Self {
        Self {
            pod_id: None,
            kind,
            fields,
            is_published: true,
            is_featured: false,
            view_count: 0,
        }
    }
}

/// `?1` is the viewing user, or NULL for anonymous requests.
const PROFILE_SELECT: &str = "SELECT e.id, e.owner_id, e.pod_id, e.kind, e.fields, e.is_published,
        e.is_featured, e.view_count, e.created_at,
        (SELECT COUNT(*) FROM profile_likes l WHERE l.profile_id = e.id),
        EXISTS (SELECT 1 FROM profile_likes l WHERE l.profile_id = e.id AND l.user_id = ?1)
     FROM explore_profiles e";

struct ProfileRow {
    id: i64,
    owner_id: i64,
    pod_id: Option<i64>,
    kind: String,
    fields: String,
    is_published: bool,
    is_featured: bool,
    view_count: i64,
    created_at: String,
    likes_count: i64,
    liked: bool,
}

impl ProfileRow {
    fn into_profile(self, viewer: Option<i64>) -> Result<ExploreProfile> {
        let kind = ProfileKind::from_str(&self.kind).map_err(|e| anyhow::anyhow!(e))?;
        Ok(ExploreProfile {
            id: self.id,
            owner_id: self.owner_id,
            pod_id: self.pod_id,
            kind,
            fields: from_json_text(&self.fields)?,
            is_published: self.is_published,
            is_featured: self.is_featured,
            view_count: self.view_count,
            likes_count: self.likes_count,
            is_liked: viewer.map(|_| self.liked),
            created_at: self.created_at,
        })
    }
}

fn profile_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProfileRow> {
    Ok(ProfileRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        pod_id: row.get(2)?,
        kind: row.get(3)?,
        fields: row.get(4)?,
        is_published: row.get(5)?,
        is_featured: row.get(6)?,
        view_count: row.get(7)?,
        created_at: row.get(8)?,
        likes_count: row.get(9)?,
        liked: row.get(10)?,
    })
}

impl HubDb {
    // ── Explore profiles ──────────────────────────────────────────────

    pub fn create_profile(&self, owner_id: i64, profile: &NewProfile) -> Result<ExploreProfile> {
        self.conn
            .execute(
                "INSERT INTO explore_profiles
                    (owner_id, pod_id, kind, fields, name, is_published, is_featured, view_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    owner_id,
                    profile.pod_id,
                    profile.kind.as_str(),
                    to_json_text(&profile.fields)?,
                    profile.fields.name,
                    profile.is_published,
                    profile.is_featured,
                    profile.view_count,
                ],
            )
            .context("Failed to insert explore profile")?;
        let id = self.conn.last_insert_rowid();
        self.get_profile(id, Some(owner_id))?
            .context("Profile not found after insert")
    }

    pub fn get_profile(&self, id: i64, viewer: Option<i64>) -> Result<Option<ExploreProfile>> {
        let row = self
            .conn
            .query_row(
                &format!("{PROFILE_SELECT} WHERE e.id = ?2"),
                params![viewer, id],
                profile_row,
            )
            .optional()
            .context("Failed to query explore profile")?;
        row.map(|r| r.into_profile(viewer)).transpose()
    }

    /// Published profiles, featured first, then by view count.
    pub fn list_profiles(
        &self,
        kind: Option<ProfileKind>,
        featured: Option<bool>,
        viewer: Option<i64>,
    ) -> Result<Vec<ExploreProfile>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "{PROFILE_SELECT}
                 WHERE e.is_published = 1
                   AND (?2 IS NULL OR e.kind = ?2)
                   AND (?3 IS NULL OR e.is_featured = ?3)
                 ORDER BY e.is_featured DESC, e.view_count DESC, e.id"
            ))
            .context("Failed to prepare list_profiles")?;
        let rows = stmt
            .query_map(
                params![viewer, kind.map(|k| k.as_str()), featured],
                profile_row,
            )
            .context("Failed to query explore profiles")?;
        let mut profiles = Vec::new();
        for row in rows {
            profiles.push(row.context("Failed to read profile row")?.into_profile(viewer)?);
        }
        Ok(profiles)
    }

    pub fn increment_profile_views(&self, id: i64) -> Result<bool> {
        let n = self
            .conn
            .execute(
                "UPDATE explore_profiles SET view_count = view_count + 1 WHERE id = ?1",
                params![id],
            )
            .context("Failed to increment profile views")?;
        Ok(n > 0)
    }

    /// Like or unlike; returns whether the user now likes it and the new total.
    /// Like or unlike a profile. Drafts can only be liked by their owner.
    pub fn toggle_like(&self, profile_id: i64, user_id: i64) -> Result<(bool, i64)> {
        let exists: bool = self
            .conn
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM explore_profiles
                                WHERE id = ?1 AND (is_published = 1 OR owner_id = ?2))",
                params![profile_id, user_id],
                |row| row.get(0),
            )
            .context("Failed to check profile")?;
        if !exists {
            return Err(HubError::NotFound("Profile").into());
        }
        let removed = self
            .conn
            .execute(
                "DELETE FROM profile_likes WHERE profile_id = ?1 AND user_id = ?2",
                params![profile_id, user_id],
            )
            .context("Failed to remove like")?;
        if removed == 0 {
            self.conn
                .execute(
                    "INSERT INTO profile_likes (profile_id, user_id) VALUES (?1, ?2)",
                    params![profile_id, user_id],
                )
                .context("Failed to insert like")?;
        }
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM profile_likes WHERE profile_id = ?1",
                params![profile_id],
                |row| row.get(0),
            )
            .context("Failed to count likes")?;
        Ok((removed == 0, count))
    }

    pub fn delete_profile(&self, id: i64) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM explore_profiles WHERE id = ?1", params![id])
            .context("Failed to delete explore profile")?;
        Ok(n > 0)
    }

    pub fn count_profiles_by_owner(&self, owner_id: i64) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM explore_profiles WHERE owner_id = ?1",
                params![owner_id],
                |row| row.get(0),
            )
            .context("Failed to count explore profiles")
    }
}
