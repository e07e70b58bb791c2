use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, params};

use super::HubDb;
use crate::hub::models::StoredFile;

impl HubDb {
    // ── Stored files ──────────────────────────────────────────────────

    pub fn store_file(
        &self,
        kind: &str,
        file_name: &str,
        content_type: &str,
        bytes: &[u8],
        uploader_id: i64,
    ) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO stored_files (kind, file_name, content_type, bytes, uploader_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![kind, file_name, content_type, bytes, uploader_id],
            )
            .context("Failed to insert stored file")?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_file(&self, id: i64) -> Result<Option<StoredFile>> {
        self.conn
            .query_row(
                "SELECT id, kind, file_name, content_type, bytes, uploader_id, created_at
                 FROM stored_files WHERE id = ?1",
                params![id],
                |row| {
                    Ok(StoredFile {
                        id: row.get(0)?,
                        kind: row.get(1)?,
                        file_name: row.get(2)?,
                        content_type: row.get(3)?,
                        bytes: row.get(4)?,
                        uploader_id: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                },
            )
            .optional()
            .context("Failed to query stored file")
    }
}
