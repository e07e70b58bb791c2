use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, params};

use super::{HubDb, from_json_text, to_json_text};
use crate::hub::models::{ChatMessage, UnreadNotification};

/// Raw row from chat_messages joined with the author, before decoding mentions.
struct MessageRow {
    id: i64,
    block_id: i64,
    author_id: i64,
    author_name: String,
    message: String,
    mentions: String,
    created_at: String,
}

impl MessageRow {
    fn into_message(self) -> Result<ChatMessage> {
        Ok(ChatMessage {
            id: self.id,
            block_id: self.block_id,
            author_id: self.author_id,
            author_name: self.author_name,
            message: self.message,
            mentions: from_json_text(&self.mentions)?,
            created_at: self.created_at,
        })
    }
}

const MESSAGE_SELECT: &str = "SELECT m.id, m.block_id, m.author_id, u.name, m.message, m.mentions, m.created_at
     FROM chat_messages m JOIN users u ON u.id = m.author_id";

fn message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        block_id: row.get(1)?,
        author_id: row.get(2)?,
        author_name: row.get(3)?,
        message: row.get(4)?,
        mentions: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl HubDb {
    // ── Chat messages ─────────────────────────────────────────────────

    /// Store a message and mark the block read for its author.
    pub fn post_message(
        &self,
        block_id: i64,
        author_id: i64,
        message: &str,
        mentions: &[i64],
    ) -> Result<ChatMessage> {
        self.conn
            .execute(
                "INSERT INTO chat_messages (block_id, author_id, message, mentions) VALUES (?1, ?2, ?3, ?4)",
                params![block_id, author_id, message, to_json_text(&mentions)?],
            )
            .context("Failed to insert chat message")?;
        let id = self.conn.last_insert_rowid();
        self.mark_read(block_id, author_id)?;
        self.get_message(id)?.context("Message not found after insert")
    }

    pub fn get_message(&self, id: i64) -> Result<Option<ChatMessage>> {
        let row = self
            .conn
            .query_row(
                &format!("{MESSAGE_SELECT} WHERE m.id = ?1"),
                params![id],
                message_row,
            )
            .optional()
            .context("Failed to query chat message")?;
        row.map(MessageRow::into_message).transpose()
    }

    /// Messages of a block, oldest first.
    pub fn list_messages(&self, block_id: i64) -> Result<Vec<ChatMessage>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{MESSAGE_SELECT} WHERE m.block_id = ?1 ORDER BY m.id"))
            .context("Failed to prepare list_messages")?;
        let rows = stmt
            .query_map(params![block_id], message_row)
            .context("Failed to query chat messages")?;
        let mut messages = Vec::new();
        for row in rows {
            messages.push(row.context("Failed to read chat message row")?.into_message()?);
        }
        Ok(messages)
    }

    pub fn delete_message(&self, id: i64) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM chat_messages WHERE id = ?1", params![id])
            .context("Failed to delete chat message")?;
        Ok(n > 0)
    }

    // ── Read markers ──────────────────────────────────────────────────

    /// Mark every current message in the block as read by `user_id`.
    pub fn mark_read(&self, block_id: i64, user_id: i64) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO chat_read_markers (block_id, user_id, last_read_id)
                 VALUES (?1, ?2, (SELECT COALESCE(MAX(id), 0) FROM chat_messages WHERE block_id = ?1))
                 ON CONFLICT (block_id, user_id) DO UPDATE SET last_read_id = excluded.last_read_id",
                params![block_id, user_id],
            )
            .context("Failed to update read marker")?;
        Ok(())
    }

    /// Messages from other users posted after the caller's read marker.
    pub fn unread_count(&self, block_id: i64, user_id: i64) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM chat_messages m
                 WHERE m.block_id = ?1 AND m.author_id != ?2
                   AND m.id > COALESCE(
                       (SELECT last_read_id FROM chat_read_markers WHERE block_id = ?1 AND user_id = ?2), 0)",
                params![block_id, user_id],
                |row| row.get(0),
            )
            .context("Failed to count unread messages")?;
        Ok(count as u64)
    }

    /// Chat blocks visible to the user with at least one unread message,
    /// across every pod, ordered by pod then block.
    pub fn unread_notifications(&self, user_id: i64) -> Result<Vec<UnreadNotification>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT block_id, block_name, pod_id, pod_name, unread FROM (
                    SELECT b.id AS block_id, b.label AS block_name, p.id AS pod_id, p.name AS pod_name,
                        (SELECT COUNT(*) FROM chat_messages m
                         WHERE m.block_id = b.id AND m.author_id != ?1
                           AND m.id > COALESCE(
                               (SELECT r.last_read_id FROM chat_read_markers r
                                WHERE r.block_id = b.id AND r.user_id = ?1), 0)) AS unread
                    FROM blocks b JOIN pods p ON p.id = b.pod_id
                    WHERE b.kind = 'chat'
                      AND (b.creator_id = ?1 OR p.creator_id = ?1
                           OR EXISTS (SELECT 1 FROM block_members bm
                                      WHERE bm.block_id = b.id AND bm.user_id = ?1))
                 )
                 WHERE unread > 0
                 ORDER BY pod_id, block_id",
            )
            .context("Failed to prepare unread_notifications")?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok(UnreadNotification {
                    block_id: row.get(0)?,
                    block_name: row.get(1)?,
                    pod_id: row.get(2)?,
                    pod_name: row.get(3)?,
                    unread_count: row.get::<_, i64>(4)? as u64,
                })
            })
            .context("Failed to query unread notifications")?;
        let mut notifications = Vec::new();
        for row in rows {
            notifications.push(row.context("Failed to read notification row")?);
        }
        Ok(notifications)
    }
}
