use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::canvas::{LayoutConfig, Position, next_position};
use crate::pointer::PointerAction;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid block type: {0}")]
pub struct InvalidKind(pub String);

/// The four kinds of collaboration block a pod can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Chat,
    Docs,
    Calendar,
    Goals,
}

impl BlockKind {
    pub const ALL: [BlockKind; 4] = [Self::Chat, Self::Docs, Self::Calendar, Self::Goals];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Docs => "docs",
            Self::Calendar => "calendar",
            Self::Goals => "goals",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockKind {
    type Err = InvalidKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(Self::Chat),
            "docs" => Ok(Self::Docs),
            "calendar" => Ok(Self::Calendar),
            "goals" => Ok(Self::Goals),
            _ => Err(InvalidKind(s.to_string())),
        }
    }
}

/// The part of a block a canvas needs to draw it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSummary {
    pub id: i64,
    pub pod_id: i64,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub creator_id: i64,
}

impl BlockSummary {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

/// Client-side copy of a pod's blocks, grouped by kind.
#[derive(Debug, Clone, Default)]
pub struct BlockBoard {
    sections: BTreeMap<BlockKind, Vec<BlockSummary>>,
    layout: LayoutConfig,
}

impl BlockBoard {
    pub fn from_blocks(blocks: impl IntoIterator<Item = BlockSummary>) -> Self {
        let mut board = Self::default();
        for block in blocks {
            board.insert(block);
        }
        board
    }

    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    pub fn insert(&mut self, block: BlockSummary) {
        let section = self.sections.entry(block.kind).or_default();
        match section.iter_mut().find(|b| b.id == block.id) {
            Some(existing) => *existing = block,
            None => section.push(block),
        }
    }

    pub fn remove(&mut self, block_id: i64) -> Option<BlockSummary> {
        for section in self.sections.values_mut() {
            if let Some(idx) = section.iter().position(|b| b.id == block_id) {
                return Some(section.remove(idx));
            }
        }
        None
    }

    pub fn blocks(&self, kind: BlockKind) -> &[BlockSummary] {
        self.sections.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, block_id: i64) -> Option<&BlockSummary> {
        self.sections.values().flatten().find(|b| b.id == block_id)
    }

    pub fn len(&self) -> usize {
        self.sections.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn chat_block_ids(&self) -> Vec<i64> {
        self.blocks(BlockKind::Chat).iter().map(|b| b.id).collect()
    }

    /// Apply a pointer action. Returns `true` when a block moved.
    pub fn apply(&mut self, action: &PointerAction) -> bool {
        let PointerAction::MoveBlock { block_id, position } = action else {
            return false;
        };
        for block in self.sections.values_mut().flatten() {
            if block.id == *block_id {
                block.x = position.x;
                block.y = position.y;
                return true;
            }
        }
        false
    }

    /// Where a new block of `kind` would be placed.
    pub fn next_position(&self, kind: BlockKind) -> Position {
        let existing: Vec<Position> = self.blocks(kind).iter().map(BlockSummary::position).collect();
        next_position(&existing, &self.layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(id: i64, kind: BlockKind, x: f64, y: f64) -> BlockSummary {
        BlockSummary {
            id,
            pod_id: 1,
            kind,
            label: format!("block-{}", id),
            x,
            y,
            creator_id: 1,
        }
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in BlockKind::ALL {
            assert_eq!(kind.as_str().parse::<BlockKind>().unwrap(), kind);
        }
        assert_eq!(
            "meetings".parse::<BlockKind>(),
            Err(InvalidKind("meetings".into()))
        );
    }

    #[test]
    fn test_board_groups_by_kind() {
        let board = BlockBoard::from_blocks(vec![
            block(1, BlockKind::Chat, 100.0, 100.0),
            block(2, BlockKind::Goals, 100.0, 100.0),
            block(3, BlockKind::Chat, 320.0, 100.0),
        ]);
        assert_eq!(board.len(), 3);
        assert_eq!(board.chat_block_ids(), vec![1, 3]);
        assert_eq!(board.blocks(BlockKind::Docs).len(), 0);
        assert_eq!(board.get(2).map(|b| b.kind), Some(BlockKind::Goals));
    }

    #[test]
    fn test_next_position_only_considers_same_kind() {
        let board = BlockBoard::from_blocks(vec![
            block(1, BlockKind::Chat, 100.0, 100.0),
            block(2, BlockKind::Chat, 320.0, 100.0),
            block(3, BlockKind::Docs, 100.0, 100.0),
        ]);
        assert_eq!(board.next_position(BlockKind::Chat), Position::new(540.0, 100.0));
        assert_eq!(board.next_position(BlockKind::Docs), Position::new(320.0, 100.0));
        assert_eq!(board.next_position(BlockKind::Calendar), Position::new(100.0, 100.0));
    }

    #[test]
    fn test_apply_move_action() {
        let mut board = BlockBoard::from_blocks(vec![block(5, BlockKind::Docs, 0.0, 0.0)]);
        let moved = board.apply(&PointerAction::MoveBlock {
            block_id: 5,
            position: Position::new(42.0, 24.0),
        });
        assert!(moved);
        assert_eq!(board.get(5).unwrap().position(), Position::new(42.0, 24.0));

        assert!(!board.apply(&PointerAction::Pan {
            offset: Position::new(1.0, 1.0)
        }));
        assert!(!board.apply(&PointerAction::MoveBlock {
            block_id: 99,
            position: Position::default()
        }));
    }

    #[test]
    fn test_insert_replaces_and_remove() {
        let mut board = BlockBoard::from_blocks(vec![block(1, BlockKind::Chat, 0.0, 0.0)]);
        board.insert(block(1, BlockKind::Chat, 10.0, 10.0));
        assert_eq!(board.len(), 1);
        assert_eq!(board.get(1).unwrap().x, 10.0);
        assert!(board.remove(1).is_some());
        assert!(board.is_empty());
        assert!(board.remove(1).is_none());
    }

    #[test]
    fn test_summary_serializes_type_field() {
        let json = serde_json::to_value(block(1, BlockKind::Calendar, 1.0, 2.0)).unwrap();
        assert_eq!(json["type"], "calendar");
        assert_eq!(json["podId"], 1);
        assert_eq!(json["creatorId"], 1);
    }
}
