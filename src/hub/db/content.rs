//! Contents of docs, calendar and goals blocks.

use std::str::FromStr;

use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, params};

use super::HubDb;
use crate::errors::HubError;
use crate::hub::models::{CalendarEvent, Document, Goal, GoalRow, GoalStatus};

/// Fields of a calendar event as submitted by a client, already validated.
#[derive(Debug, Clone)]
pub struct EventInput {
    pub title: String,
    pub date: String,
    pub time: Option<String>,
    pub description: Option<String>,
}

/// Partial update for a goal; `None` fields are left unchanged.
/// `due_date: Some(None)` clears the due date.
#[derive(Debug, Clone, Default)]
pub struct GoalUpdate {
    pub title: Option<String>,
    pub due_date: Option<Option<String>>,
    pub status: Option<GoalStatus>,
}

const DOCUMENT_COLUMNS: &str =
    "id, block_id, uploader_id, file_name, content_type, size, created_at";

fn document_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        block_id: row.get(1)?,
        uploader_id: row.get(2)?,
        file_name: row.get(3)?,
        content_type: row.get(4)?,
        size: row.get(5)?,
        created_at: row.get(6)?,
    })
}

const EVENT_COLUMNS: &str = "id, block_id, title, date, time, description, creator_id, created_at";

fn event_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CalendarEvent> {
    Ok(CalendarEvent {
        id: row.get(0)?,
        block_id: row.get(1)?,
        title: row.get(2)?,
        date: row.get(3)?,
        time: row.get(4)?,
        description: row.get(5)?,
        creator_id: row.get(6)?,
        created_at: row.get(7)?,
    })
}

const GOAL_COLUMNS: &str =
    "id, block_id, title, due_date, status, creator_id, created_at, updated_at";

fn goal_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GoalRow> {
    Ok(GoalRow {
        id: row.get(0)?,
        block_id: row.get(1)?,
        title: row.get(2)?,
        due_date: row.get(3)?,
        status: row.get(4)?,
        creator_id: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl HubDb {
    // ── Documents ─────────────────────────────────────────────────────

    pub fn create_document(
        &self,
        block_id: i64,
        uploader_id: i64,
        file_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<Document> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin create_document")?;
        let file_id = self.store_file("document", file_name, content_type, bytes, uploader_id)?;
        tx.execute(
            "INSERT INTO documents (block_id, uploader_id, file_id, file_name, content_type, size)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![block_id, uploader_id, file_id, file_name, content_type, bytes.len() as i64],
        )
        .context("Failed to insert document")?;
        let id = tx.last_insert_rowid();
        tx.commit().context("Failed to commit create_document")?;
        self.get_document(id)?.context("Document not found after insert")
    }

    pub fn get_document(&self, id: i64) -> Result<Option<Document>> {
        self.conn
            .query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
                params![id],
                document_from_row,
            )
            .optional()
            .context("Failed to query document")
    }

    /// Metadata of a block's documents, newest first.
    pub fn list_documents(&self, block_id: i64) -> Result<Vec<Document>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE block_id = ?1 ORDER BY id DESC"
            ))
            .context("Failed to prepare list_documents")?;
        let rows = stmt
            .query_map(params![block_id], document_from_row)
            .context("Failed to query documents")?;
        let mut documents = Vec::new();
        for row in rows {
            documents.push(row.context("Failed to read document row")?);
        }
        Ok(documents)
    }

    /// The stored bytes behind a document.
    pub fn document_bytes(&self, id: i64) -> Result<Option<Vec<u8>>> {
        self.conn
            .query_row(
                "SELECT f.bytes FROM documents d JOIN stored_files f ON f.id = d.file_id WHERE d.id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query document bytes")
    }

    pub fn delete_document(&self, id: i64) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin delete_document")?;
        let file_id: i64 = tx
            .query_row(
                "SELECT file_id FROM documents WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query document")?
            .ok_or(HubError::NotFound("Document"))?;
        tx.execute("DELETE FROM documents WHERE id = ?1", params![id])
            .context("Failed to delete document")?;
        tx.execute("DELETE FROM stored_files WHERE id = ?1", params![file_id])
            .context("Failed to delete document file")?;
        tx.commit().context("Failed to commit delete_document")?;
        Ok(())
    }

    // ── Calendar events ───────────────────────────────────────────────

    pub fn create_event(&self, block_id: i64, creator_id: i64, input: &EventInput) -> Result<CalendarEvent> {
        self.conn
            .execute(
                "INSERT INTO calendar_events (block_id, title, date, time, description, creator_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![block_id, input.title, input.date, input.time, input.description, creator_id],
            )
            .context("Failed to insert calendar event")?;
        let id = self.conn.last_insert_rowid();
        self.get_event(id)?.context("Event not found after insert")
    }

    pub fn get_event(&self, id: i64) -> Result<Option<CalendarEvent>> {
        self.conn
            .query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM calendar_events WHERE id = ?1"),
                params![id],
                event_from_row,
            )
            .optional()
            .context("Failed to query calendar event")
    }

    /// Events of a block in date order; untimed events sort first within a day.
    pub fn list_events(&self, block_id: i64) -> Result<Vec<CalendarEvent>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM calendar_events WHERE block_id = ?1
                 ORDER BY date, COALESCE(time, ''), id"
            ))
            .context("Failed to prepare list_events")?;
        let rows = stmt
            .query_map(params![block_id], event_from_row)
            .context("Failed to query calendar events")?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row.context("Failed to read calendar event row")?);
        }
        Ok(events)
    }

    pub fn update_event(&self, id: i64, input: &EventInput) -> Result<CalendarEvent> {
        let n = self
            .conn
            .execute(
                "UPDATE calendar_events SET title = ?1, date = ?2, time = ?3, description = ?4 WHERE id = ?5",
                params![input.title, input.date, input.time, input.description, id],
            )
            .context("Failed to update calendar event")?;
        if n == 0 {
            return Err(HubError::NotFound("Event").into());
        }
        self.get_event(id)?.context("Event not found after update")
    }

    pub fn delete_event(&self, id: i64) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM calendar_events WHERE id = ?1", params![id])
            .context("Failed to delete calendar event")?;
        Ok(n > 0)
    }

    // ── Goals ─────────────────────────────────────────────────────────

    pub fn create_goal(
        &self,
        block_id: i64,
        creator_id: i64,
        title: &str,
        due_date: Option<&str>,
        status: GoalStatus,
    ) -> Result<Goal> {
        self.conn
            .execute(
                "INSERT INTO goals (block_id, title, due_date, status, creator_id) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![block_id, title, due_date, status.as_str(), creator_id],
            )
            .context("Failed to insert goal")?;
        let id = self.conn.last_insert_rowid();
        self.get_goal(id)?.context("Goal not found after insert")
    }

    pub fn get_goal(&self, id: i64) -> Result<Option<Goal>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {GOAL_COLUMNS} FROM goals WHERE id = ?1"),
                params![id],
                goal_row,
            )
            .optional()
            .context("Failed to query goal")?;
        row.map(GoalRow::into_goal).transpose()
    }

    pub fn list_goals(&self, block_id: i64) -> Result<Vec<Goal>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {GOAL_COLUMNS} FROM goals WHERE block_id = ?1 ORDER BY id"
            ))
            .context("Failed to prepare list_goals")?;
        let rows = stmt
            .query_map(params![block_id], goal_row)
            .context("Failed to query goals")?;
        let mut goals = Vec::new();
        for row in rows {
            goals.push(row.context("Failed to read goal row")?.into_goal()?);
        }
        Ok(goals)
    }

    pub fn update_goal(&self, id: i64, update: &GoalUpdate) -> Result<Goal> {
        let current = self.get_goal(id)?.ok_or(HubError::NotFound("Goal"))?;
        let title = update.title.as_deref().unwrap_or(&current.title);
        let due_date = match &update.due_date {
            Some(due) => due.as_deref(),
            None => current.due_date.as_deref(),
        };
        let status = update.status.unwrap_or(current.status);
        self.conn
            .execute(
                "UPDATE goals SET title = ?1, due_date = ?2, status = ?3, updated_at = datetime('now')
                 WHERE id = ?4",
                params![title, due_date, status.as_str(), id],
            )
            .context("Failed to update goal")?;
        self.get_goal(id)?.context("Goal not found after update")
    }

    pub fn delete_goal(&self, id: i64) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM goals WHERE id = ?1", params![id])
            .context("Failed to delete goal")?;
        Ok(n > 0)
    }
}

/// Goal status from request text.
pub fn parse_goal_status(s: &str) -> Result<GoalStatus> {
    GoalStatus::from_str(s).map_err(|e| HubError::Invalid(e).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use podspace_common::{BlockKind, Position};

    fn setup(kind: BlockKind) -> Result<(HubDb, i64, i64)> {
        let db = HubDb::new_in_memory()?;
        let user = db.create_user("ada@gmail.com", "Ada", "h")?;
        let pod = db.create_pod(user.id, "Pod", "", None)?;
        let block = db.create_block(pod.id, kind, "Block", "", Position::default(), user.id)?;
        Ok((db, user.id, block.id))
    }

    fn event(title: &str, date: &str, time: Option<&str>) -> EventInput {
        EventInput {
            title: title.into(),
            date: date.into(),
            time: time.map(String::from),
            description: None,
        }
    }

    #[test]
    fn test_document_lifecycle() -> Result<()> {
        let (db, user_id, block_id) = setup(BlockKind::Docs)?;
        let doc = db.create_document(block_id, user_id, "plan.pdf", "application/pdf", b"%PDF-1.4")?;
        assert_eq!(doc.size, 8);
        assert_eq!(doc.file_name, "plan.pdf");
        assert_eq!(db.list_documents(block_id)?.len(), 1);
        assert_eq!(db.document_bytes(doc.id)?.unwrap(), b"%PDF-1.4".to_vec());

        db.delete_document(doc.id)?;
        assert!(db.get_document(doc.id)?.is_none());
        assert!(db.document_bytes(doc.id)?.is_none());
        assert!(db.delete_document(doc.id).is_err());
        Ok(())
    }

    #[test]
    fn test_delete_block_removes_document_bytes() -> Result<()> {
        let (db, user_id, block_id) = setup(BlockKind::Docs)?;
        let doc = db.create_document(block_id, user_id, "a.pdf", "application/pdf", b"x")?;
        db.delete_block(block_id)?;
        assert!(db.get_document(doc.id)?.is_none());
        let files: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM stored_files", [], |row| row.get(0))?;
        assert_eq!(files, 0);
        Ok(())
    }

    #[test]
    fn test_events_sorted_by_date_then_time() -> Result<()> {
        let (db, user_id, block_id) = setup(BlockKind::Calendar)?;
        db.create_event(block_id, user_id, &event("late", "2024-05-02", Some("15:00")))?;
        db.create_event(block_id, user_id, &event("early", "2024-05-02", Some("09:00")))?;
        db.create_event(block_id, user_id, &event("first", "2024-05-01", None))?;
        let titles: Vec<String> = db.list_events(block_id)?.into_iter().map(|e| e.title).collect();
        assert_eq!(titles, vec!["first", "early", "late"]);
        Ok(())
    }

    #[test]
    fn test_update_and_delete_event() -> Result<()> {
        let (db, user_id, block_id) = setup(BlockKind::Calendar)?;
        let created = db.create_event(block_id, user_id, &event("Standup", "2024-05-01", None))?;
        let updated = db.update_event(created.id, &event("Retro", "2024-05-03", Some("10:00")))?;
        assert_eq!(updated.title, "Retro");
        assert_eq!(updated.time.as_deref(), Some("10:00"));
        assert!(db.update_event(999, &event("x", "2024-01-01", None)).is_err());
        assert!(db.delete_event(created.id)?);
        assert!(!db.delete_event(created.id)?);
        Ok(())
    }

    #[test]
    fn test_goal_defaults_and_partial_update() -> Result<()> {
        let (db, user_id, block_id) = setup(BlockKind::Goals)?;
        let goal = db.create_goal(block_id, user_id, "Launch", Some("2024-12-01"), GoalStatus::default())?;
        assert_eq!(goal.status, GoalStatus::NotStarted);

        let updated = db.update_goal(
            goal.id,
            &GoalUpdate {
                status: Some(GoalStatus::InProgress),
                ..Default::default()
            },
        )?;
        assert_eq!(updated.status, GoalStatus::InProgress);
        assert_eq!(updated.title, "Launch");
        assert_eq!(updated.due_date.as_deref(), Some("2024-12-01"));

        let cleared = db.update_goal(
            goal.id,
            &GoalUpdate {
                due_date: Some(None),
                ..Default::default()
            },
        )?;
        assert_eq!(cleared.due_date, None);
        assert_eq!(cleared.status, GoalStatus::InProgress);
        assert_eq!(db.list_goals(block_id)?.len(), 1);
        assert!(db.delete_goal(goal.id)?);
        Ok(())
    }

    #[test]
    fn test_parse_goal_status_is_invalid_error() {
        let err = parse_goal_status("finished").unwrap_err();
        assert!(matches!(err.downcast_ref::<HubError>(), Some(HubError::Invalid(_))));
    }
}
