//! Canvas coordinates and the layout planner for newly created blocks.
//!
//! New blocks are packed left to right along the bottom-most row of the
//! existing layout and wrap onto a fresh row once the canvas width would be
//! exceeded.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Geometry used by [`next_position`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Rendered width of a block card.
    pub block_width: f64,
    /// Distance between the left edges of neighbouring blocks in a row.
    pub spacing_x: f64,
    /// Distance between the anchors of consecutive rows.
    pub spacing_y: f64,
    /// Where the first block goes, and the x every wrapped row starts at.
    pub start: Position,
    /// Blocks whose y is within this distance of a row anchor join that row.
    pub row_tolerance: f64,
    /// Right edge that a new block may not cross.
    pub canvas_width: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            block_width: 192.0,
            spacing_x: 220.0,
            spacing_y: 120.0,
            start: Position::new(100.0, 100.0),
            row_tolerance: 50.0,
            canvas_width: 1200.0,
        }
    }
}

struct Row {
    anchor_y: f64,
    rightmost_x: f64,
}

/// Compute where the next block should be placed given the positions of the
/// blocks already on the canvas.
pub fn next_position(existing: &[Position], config: &LayoutConfig) -> Position {
    let mut rows: Vec<Row> = Vec::new();

    for pos in existing {
        match rows
            .iter_mut()
            .find(|row| (row.anchor_y - pos.y).abs() < config.row_tolerance)
        {
            Some(row) => row.rightmost_x = row.rightmost_x.max(pos.x),
            None => rows.push(Row {
                anchor_y: pos.y,
                rightmost_x: pos.x,
            }),
        }
    }

    let Some(bottom) = rows
        .iter()
        .max_by(|a, b| a.anchor_y.total_cmp(&b.anchor_y))
    else {
        return config.start;
    };

    let next_x = bottom.rightmost_x + config.spacing_x;
    if next_x + config.block_width > config.canvas_width {
        Position::new(config.start.x, bottom.anchor_y + config.spacing_y)
    } else {
        Position::new(next_x, bottom.anchor_y)
    }
}
