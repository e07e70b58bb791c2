use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, Row, params};

use super::HubDb;
use crate::errors::HubError;
use crate::hub::models::User;

const USER_COLUMNS: &str = "id, email, name, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Escape LIKE wildcards so user input only matches literally.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl HubDb {
    // ── Users ─────────────────────────────────────────────────────────

    /// Insert a user. Emails are stored lowercase; a duplicate is a conflict.
    pub fn create_user(&self, email: &str, name: &str, password_hash: &str) -> Result<User> {
        let email = email.trim().to_lowercase();
        if self.get_user_by_email(&email)?.is_some() {
            return Err(HubError::Conflict("User with this email already exists".into()).into());
        }
        self.conn
            .execute(
                "INSERT INTO users (email, name, password_hash) VALUES (?1, ?2, ?3)",
                params![email, name.trim(), password_hash],
            )
            .context("Failed to insert user")?;
        let id = self.conn.last_insert_rowid();
        self.get_user(id)?.context("User not found after insert")
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        self.conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()
            .context("Failed to query user")
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email.trim().to_lowercase()],
                user_from_row,
            )
            .optional()
            .context("Failed to query user by email")
    }

    /// The user and stored password hash for a sign-in attempt.
    pub fn get_credentials(&self, email: &str) -> Result<Option<(User, String)>> {
        self.conn
            .query_row(
                &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?1"),
                params![email.trim().to_lowercase()],
                |row| Ok((user_from_row(row)?, row.get(4)?)),
            )
            .optional()
            .context("Failed to query credentials")
    }

    /// Return the user with `email`, creating it when missing.
    pub fn ensure_user(&self, email: &str, name: &str, password_hash: &str) -> Result<User> {
        match self.get_user_by_email(email)? {
            Some(user) => Ok(user),
            None => self.create_user(email, name, password_hash),
        }
    }

    /// Case-insensitive match on name or email, excluding `exclude_id`.
    pub fn search_users(&self, query: &str, exclude_id: i64, limit: usize) -> Result<Vec<User>> {
        let pattern = format!("%{}%", escape_like(&query.trim().to_lowercase()));
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE id != ?1 AND (lower(name) LIKE ?2 ESCAPE '\\' OR email LIKE ?2 ESCAPE '\\')
                 ORDER BY name LIMIT ?3"
            ))
            .context("Failed to prepare search_users")?;
        let rows = stmt
            .query_map(params![exclude_id, pattern, limit as i64], user_from_row)
            .context("Failed to search users")?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row.context("Failed to read user row")?);
        }
        Ok(users)
    }

    // ── Sessions ──────────────────────────────────────────────────────

    pub fn create_session(&self, user_id: i64, token_hash: &str, ttl_hours: i64) -> Result<()> {
        let expires_at = (chrono::Utc::now() + chrono::Duration::hours(ttl_hours))
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        self.conn
            .execute(
                "INSERT INTO sessions (token_hash, user_id, expires_at) VALUES (?1, ?2, ?3)",
                params![token_hash, user_id, expires_at],
            )
            .context("Failed to insert session")?;
        Ok(())
    }

    /// The user behind an unexpired session.
    pub fn get_session_user(&self, token_hash: &str) -> Result<Option<User>> {
        self.conn
            .query_row(
                "SELECT u.id, u.email, u.name, u.created_at
                 FROM sessions s JOIN users u ON u.id = s.user_id
                 WHERE s.token_hash = ?1 AND s.expires_at > datetime('now')",
                params![token_hash],
                user_from_row,
            )
            .optional()
            .context("Failed to query session")
    }

    pub fn delete_session(&self, token_hash: &str) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM sessions WHERE token_hash = ?1", params![token_hash])
            .context("Failed to delete session")?;
        Ok(n > 0)
    }

    pub fn purge_expired_sessions(&self) -> Result<usize> {
        self.conn
            .execute("DELETE FROM sessions WHERE expires_at <= datetime('now')", [])
            .context("Failed to purge sessions")
    }
}
