use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, Row, params};

use super::HubDb;
use crate::errors::HubError;
use crate::hub::models::{Pod, User};

const POD_COLUMNS: &str = "p.id, p.name, p.tagline, p.logo_url, p.creator_id, p.created_at";

fn pod_from_row(row: &Row<'_>) -> rusqlite::Result<Pod> {
    Ok(Pod {
        id: row.get(0)?,
        name: row.get(1)?,
        tagline: row.get(2)?,
        logo_url: row.get(3)?,
        creator_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl HubDb {
    // ── Pods ──────────────────────────────────────────────────────────

    /// Create a pod; the creator is recorded as its first member.
    pub fn create_pod(
        &self,
        creator_id: i64,
        name: &str,
        tagline: &str,
        logo_url: Option<&str>,
    ) -> Result<Pod> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin create_pod")?;
        tx.execute(
            "INSERT INTO pods (name, tagline, logo_url, creator_id) VALUES (?1, ?2, ?3, ?4)",
            params![name, tagline, logo_url, creator_id],
        )
        .context("Failed to insert pod")?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO pod_members (pod_id, user_id) VALUES (?1, ?2)",
            params![id, creator_id],
        )
        .context("Failed to insert pod creator membership")?;
        tx.commit().context("Failed to commit create_pod")?;
        self.get_pod(id)?.context("Pod not found after insert")
    }

    pub fn get_pod(&self, id: i64) -> Result<Option<Pod>> {
        self.conn
            .query_row(
                &format!("SELECT {POD_COLUMNS} FROM pods p WHERE p.id = ?1"),
                params![id],
                pod_from_row,
            )
            .optional()
            .context("Failed to query pod")
    }

    /// Pods the user created or belongs to, oldest first.
    pub fn list_pods_for_user(&self, user_id: i64) -> Result<Vec<Pod>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {POD_COLUMNS} FROM pods p
                 WHERE p.creator_id = ?1
                    OR EXISTS (SELECT 1 FROM pod_members m WHERE m.pod_id = p.id AND m.user_id = ?1)
                 ORDER BY p.id"
            ))
            .context("Failed to prepare list_pods_for_user")?;
        let rows = stmt
            .query_map(params![user_id], pod_from_row)
            .context("Failed to query pods")?;
        let mut pods = Vec::new();
        for row in rows {
            pods.push(row.context("Failed to read pod row")?);
        }
        Ok(pods)
    }

    /// Members of a pod, creator first, then in join order.
    pub fn pod_members(&self, pod_id: i64) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT u.id, u.email, u.name, u.created_at
                 FROM pod_members m
                 JOIN users u ON u.id = m.user_id
                 JOIN pods p ON p.id = m.pod_id
                 WHERE m.pod_id = ?1
                 ORDER BY (u.id = p.creator_id) DESC, m.joined_at, u.id",
            )
            .context("Failed to prepare pod_members")?;
        let rows = stmt
            .query_map(params![pod_id], |row| {
                Ok(User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    name: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })
            .context("Failed to query pod members")?;
        let mut members = Vec::new();
        for row in rows {
            members.push(row.context("Failed to read member row")?);
        }
        Ok(members)
    }

    /// Returns `false` when the user was already a member.
    pub fn add_pod_member(&self, pod_id: i64, user_id: i64) -> Result<bool> {
        let n = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO pod_members (pod_id, user_id) VALUES (?1, ?2)",
                params![pod_id, user_id],
            )
            .context("Failed to insert pod member")?;
        Ok(n > 0)
    }

    pub fn is_pod_member(&self, pod_id: i64, user_id: i64) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT EXISTS (
                    SELECT 1 FROM pods WHERE id = ?1 AND creator_id = ?2
                    UNION ALL
                    SELECT 1 FROM pod_members WHERE pod_id = ?1 AND user_id = ?2
                 )",
                params![pod_id, user_id],
                |row| row.get(0),
            )
            .context("Failed to check pod membership")
    }

    // ── Access checks ─────────────────────────────────────────────────

    /// The pod, if `user_id` is its creator or a member.
    pub fn require_pod_access(&self, pod_id: i64, user_id: i64) -> Result<Pod> {
        let pod = self.get_pod(pod_id)?.ok_or(HubError::NotFound("Pod"))?;
        if !self.is_pod_member(pod_id, user_id)? {
            return Err(HubError::forbidden("You do not have access to this pod").into());
        }
        Ok(pod)
    }

    /// The pod, if `user_id` created it.
    pub fn require_pod_creator(&self, pod_id: i64, user_id: i64) -> Result<Pod> {
        let pod = self.get_pod(pod_id)?.ok_or(HubError::NotFound("Pod"))?;
        if pod.creator_id != user_id {
            return Err(HubError::forbidden("Only the pod creator can manage members").into());
        }
        Ok(pod)
    }
}
