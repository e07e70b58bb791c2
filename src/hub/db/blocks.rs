use std::collections::HashSet;
use std::str::FromStr;

use anyhow::{Context, Result};
use podspace_common::{BlockKind, Position};
use rusqlite::{OptionalExtension, params};

use super::HubDb;
use crate::errors::HubError;
use crate::hub::models::{Block, BlockAccess, BlockAudience, User};

/// Partial update for a block; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct BlockUpdate {
    pub label: Option<String>,
    pub description: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

/// Raw row from the blocks table, before kind parsing.
struct BlockRow {
    id: i64,
    pod_id: i64,
    kind: String,
    label: String,
    description: String,
    x: f64,
    y: f64,
    creator_id: i64,
    created_at: String,
}

impl BlockRow {
    fn into_block(self) -> Result<Block> {
        let kind = BlockKind::from_str(&self.kind).context("Corrupt block kind")?;
        Ok(Block {
            id: self.id,
            pod_id: self.pod_id,
            kind,
            label: self.label,
            description: self.description,
            x: self.x,
            y: self.y,
            creator_id: self.creator_id,
            created_at: self.created_at,
        })
    }
}

const BLOCK_COLUMNS: &str = "id, pod_id, kind, label, description, x, y, creator_id, created_at";

fn block_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BlockRow> {
    Ok(BlockRow {
        id: row.get(0)?,
        pod_id: row.get(1)?,
        kind: row.get(2)?,
        label: row.get(3)?,
        description: row.get(4)?,
        x: row.get(5)?,
        y: row.get(6)?,
        creator_id: row.get(7)?,
        created_at: row.get(8)?,
    })
}

impl HubDb {
    // ── Blocks ────────────────────────────────────────────────────────

    /// Insert a block at `position`; its creator becomes the first block member.
    pub fn create_block(
        &self,
        pod_id: i64,
        kind: BlockKind,
        label: &str,
        description: &str,
        position: Position,
        creator_id: i64,
    ) -> Result<Block> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin create_block")?;
        tx.execute(
            "INSERT INTO blocks (pod_id, kind, label, description, x, y, creator_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![pod_id, kind.as_str(), label, description, position.x, position.y, creator_id],
        )
        .context("Failed to insert block")?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO block_members (block_id, user_id) VALUES (?1, ?2)",
            params![id, creator_id],
        )
        .context("Failed to insert block creator membership")?;
        tx.commit().context("Failed to commit create_block")?;
        self.get_block(id)?.context("Block not found after insert")
    }

    pub fn get_block(&self, id: i64) -> Result<Option<Block>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE id = ?1"),
                params![id],
                block_row,
            )
            .optional()
            .context("Failed to query block")?;
        row.map(BlockRow::into_block).transpose()
    }

    pub fn list_blocks(&self, pod_id: i64) -> Result<Vec<Block>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {BLOCK_COLUMNS} FROM blocks WHERE pod_id = ?1 ORDER BY id"
            ))
            .context("Failed to prepare list_blocks")?;
        let rows = stmt
            .query_map(params![pod_id], block_row)
            .context("Failed to query blocks")?;
        let mut blocks = Vec::new();
        for row in rows {
            blocks.push(row.context("Failed to read block row")?.into_block()?);
        }
        Ok(blocks)
    }

    /// Positions of a pod's blocks of one kind, for the layout planner.
    pub fn block_positions(&self, pod_id: i64, kind: BlockKind) -> Result<Vec<Position>> {
        let mut stmt = self
            .conn
            .prepare("SELECT x, y FROM blocks WHERE pod_id = ?1 AND kind = ?2 ORDER BY id")
            .context("Failed to prepare block_positions")?;
        let rows = stmt
            .query_map(params![pod_id, kind.as_str()], |row| {
                Ok(Position::new(row.get(0)?, row.get(1)?))
            })
            .context("Failed to query block positions")?;
        let mut positions = Vec::new();
        for row in rows {
            positions.push(row.context("Failed to read position row")?);
        }
        Ok(positions)
    }

    pub fn update_block(&self, id: i64, update: &BlockUpdate) -> Result<Block> {
        let current = self.get_block(id)?.ok_or(HubError::NotFound("Block"))?;
        let label = update.label.as_deref().unwrap_or(&current.label);
        let description = update.description.as_deref().unwrap_or(&current.description);
        let x = update.x.unwrap_or(current.x);
        let y = update.y.unwrap_or(current.y);
        self.conn
            .execute(
                "UPDATE blocks SET label = ?1, description = ?2, x = ?3, y = ?4 WHERE id = ?5",
                params![label, description, x, y, id],
            )
            .context("Failed to update block")?;
        self.get_block(id)?.context("Block not found after update")
    }

    pub fn delete_block(&self, id: i64) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin delete_block")?;
        // Document bytes live in stored_files, which the cascade does not reach.
        let file_ids: Vec<i64> = {
            let mut stmt = tx
                .prepare("SELECT file_id FROM documents WHERE block_id = ?1")
                .context("Failed to prepare block document lookup")?;
            let rows = stmt
                .query_map(params![id], |row| row.get(0))
                .context("Failed to query block documents")?;
            rows.collect::<rusqlite::Result<_>>()
                .context("Failed to read document file id")?
        };
        let n = tx
            .execute("DELETE FROM blocks WHERE id = ?1", params![id])
            .context("Failed to delete block")?;
        if n == 0 {
            return Err(HubError::NotFound("Block").into());
        }
        for file_id in file_ids {
            tx.execute("DELETE FROM stored_files WHERE id = ?1", params![file_id])
                .context("Failed to delete document file")?;
        }
        tx.commit().context("Failed to commit delete_block")?;
        Ok(())
    }

    // ── Block members ─────────────────────────────────────────────────

    /// Block members, creator first.
    pub fn block_members(&self, block_id: i64) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT u.id, u.email, u.name, u.created_at
                 FROM block_members m
                 JOIN users u ON u.id = m.user_id
                 JOIN blocks b ON b.id = m.block_id
                 WHERE m.block_id = ?1
                 ORDER BY (u.id = b.creator_id) DESC, m.added_at, u.id",
            )
            .context("Failed to prepare block_members")?;
        let rows = stmt
            .query_map(params![block_id], |row| {
                Ok(User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    name: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })
            .context("Failed to query block members")?;
        let mut members = Vec::new();
        for row in rows {
            members.push(row.context("Failed to read block member row")?);
        }
        Ok(members)
    }

    /// Returns `false` when the user was already a member.
    pub fn add_block_member(&self, block_id: i64, user_id: i64) -> Result<bool> {
        let n = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO block_members (block_id, user_id) VALUES (?1, ?2)",
                params![block_id, user_id],
            )
            .context("Failed to insert block member")?;
        Ok(n > 0)
    }

    /// The block, if `user_id` is its creator, the pod creator, or a block member.
    pub fn block_access(&self, block_id: i64, user_id: i64) -> Result<BlockAccess> {
        let block = self.get_block(block_id)?.ok_or(HubError::NotFound("Block"))?;
        let (pod_creator_id, is_member): (i64, bool) = self
            .conn
            .query_row(
                "SELECT p.creator_id,
                        EXISTS (SELECT 1 FROM block_members WHERE block_id = ?1 AND user_id = ?2)
                 FROM pods p WHERE p.id = ?3",
                params![block_id, user_id, block.pod_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .context("Failed to check block access")?;
        let access = BlockAccess {
            block,
            pod_creator_id,
        };
        if !(is_member || access.can_manage(user_id)) {
            return Err(HubError::forbidden("You do not have access to this block").into());
        }
        Ok(access)
    }

    /// Users who may currently see the contents of the block in `access`.
    pub fn block_audience(&self, access: &BlockAccess) -> Result<BlockAudience> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_id FROM block_members WHERE block_id = ?1")
            .context("Failed to prepare block_audience")?;
        let rows = stmt
            .query_map(params![access.block.id], |row| row.get::<_, i64>(0))
            .context("Failed to query block audience")?;
        let mut user_ids = HashSet::from([access.block.creator_id, access.pod_creator_id]);
        for row in rows {
            user_ids.insert(row.context("Failed to read block audience row")?);
        }
        Ok(BlockAudience {
            pod_id: access.block.pod_id,
            user_ids,
        })
    }

    /// Like `block_access`, but also requires block creator or pod creator.
    pub fn require_block_manager(&self, block_id: i64, user_id: i64) -> Result<BlockAccess> {
        let access = self.block_access(block_id, user_id)?;
        if !access.can_manage(user_id) {
            return Err(HubError::forbidden(
                "Only the block creator or pod creator can do that",
            )
            .into());
        }
        Ok(access)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        db: HubDb,
        owner: User,
        member: User,
        outsider: User,
        pod_id: i64,
    }

    fn setup() -> Result<Fixture> {
        let db = HubDb::new_in_memory()?;
        let owner = db.create_user("owner@gmail.com", "Owner", "h")?;
        let member = db.create_user("member@gmail.com", "Member", "h")?;
        let outsider = db.create_user("outsider@gmail.com", "Outsider", "h")?;
        let pod = db.create_pod(owner.id, "Pod", "", None)?;
        db.add_pod_member(pod.id, member.id)?;
        Ok(Fixture {
            db,
            owner,
            member,
            outsider,
            pod_id: pod.id,
        })
    }

    #[test]
    fn test_create_block_records_creator_membership() -> Result<()> {
        let f = setup()?;
        let block = f.db.create_block(
            f.pod_id,
            BlockKind::Chat,
            "General",
            "",
            Position::new(100.0, 100.0),
            f.member.id,
        )?;
        assert_eq!(block.kind, BlockKind::Chat);
        assert_eq!(block.x, 100.0);
        let members = f.db.block_members(block.id)?;
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, f.member.id);
        Ok(())
    }

    #[test]
    fn test_block_positions_filter_by_kind() -> Result<()> {
        let f = setup()?;
        f.db.create_block(f.pod_id, BlockKind::Chat, "a", "", Position::new(100.0, 100.0), f.owner.id)?;
        f.db.create_block(f.pod_id, BlockKind::Docs, "b", "", Position::new(100.0, 100.0), f.owner.id)?;
        f.db.create_block(f.pod_id, BlockKind::Chat, "c", "", Position::new(320.0, 100.0), f.owner.id)?;
        let positions = f.db.block_positions(f.pod_id, BlockKind::Chat)?;
        assert_eq!(positions, vec![Position::new(100.0, 100.0), Position::new(320.0, 100.0)]);
        assert_eq!(f.db.list_blocks(f.pod_id)?.len(), 3);
        Ok(())
    }

    #[test]
    fn test_update_block_partial() -> Result<()> {
        let f = setup()?;
        let block = f.db.create_block(f.pod_id, BlockKind::Goals, "Q1", "d", Position::new(1.0, 2.0), f.owner.id)?;
        let updated = f.db.update_block(
            block.id,
            &BlockUpdate {
                x: Some(50.0),
                y: Some(60.0),
                ..Default::default()
            },
        )?;
        assert_eq!((updated.x, updated.y), (50.0, 60.0));
        assert_eq!(updated.label, "Q1");
        assert_eq!(updated.description, "d");

        let err = f.db.update_block(999, &BlockUpdate::default()).unwrap_err();
        assert!(matches!(err.downcast_ref::<HubError>(), Some(HubError::NotFound(_))));
        Ok(())
    }

    #[test]
    fn test_delete_block_cascades() -> Result<()> {
        let f = setup()?;
        let block = f.db.create_block(f.pod_id, BlockKind::Chat, "x", "", Position::default(), f.owner.id)?;
        f.db.post_message(block.id, f.owner.id, "hi", &[])?;
        f.db.delete_block(block.id)?;
        assert!(f.db.get_block(block.id)?.is_none());
        assert!(f.db.list_messages(block.id)?.is_empty());
        assert!(f.db.delete_block(block.id).is_err());
        Ok(())
    }

    #[test]
    fn test_block_access_rules() -> Result<()> {
        let f = setup()?;
        let block = f.db.create_block(f.pod_id, BlockKind::Chat, "x", "", Position::default(), f.member.id)?;

        // Block creator and pod creator can see and manage it.
        assert!(f.db.require_block_manager(block.id, f.member.id).is_ok());
        assert!(f.db.require_block_manager(block.id, f.owner.id).is_ok());

        // A pod member who is not on the block is refused.
        let third = f.db.create_user("third@gmail.com", "Third", "h")?;
        f.db.add_pod_member(f.pod_id, third.id)?;
        let err = f.db.block_access(block.id, third.id).unwrap_err();
        assert!(matches!(err.downcast_ref::<HubError>(), Some(HubError::Forbidden(_))));

        // Once added they can see it but not manage it.
        f.db.add_block_member(block.id, third.id)?;
        assert!(f.db.block_access(block.id, third.id).is_ok());
        assert!(f.db.require_block_manager(block.id, third.id).is_err());

        assert!(f.db.block_access(block.id, f.outsider.id).is_err());
        Ok(())
    }

    #[test]
    fn test_block_audience_excludes_pod_members_off_the_block() -> Result<()> {
        let f = setup()?;
        let block = f.db.create_block(f.pod_id, BlockKind::Chat, "x", "", Position::default(), f.member.id)?;
        let third = f.db.create_user("third@gmail.com", "Third", "h")?;
        f.db.add_pod_member(f.pod_id, third.id)?;

        let access = f.db.block_access(block.id, f.member.id)?;
        let audience = f.db.block_audience(&access)?;
        assert_eq!(audience.pod_id, f.pod_id);
        assert!(audience.includes(f.member.id));
        assert!(audience.includes(f.owner.id));
        assert!(!audience.includes(third.id));
        assert!(!audience.includes(f.outsider.id));

        f.db.add_block_member(block.id, third.id)?;
        assert!(f.db.block_audience(&access)?.includes(third.id));
        Ok(())
    }
}
