//! Pointer input classification for the pod canvas.
//!
//! A press on a block stays *pending* until the pointer travels more than
//! [`DRAG_THRESHOLD`] pixels on either axis; releasing before that is a
//! click. A press on empty canvas pans the whole view.

use crate::canvas::Position;

/// Pixels the pointer must move (exclusive) before a press becomes a drag.
pub const DRAG_THRESHOLD: f64 = 5.0;

/// A continuous effect of pointer motion that the caller should render.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerAction {
    MoveBlock { block_id: i64, position: Position },
    Pan { offset: Position },
}

/// What a completed press/release gesture amounted to.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerOutcome {
    Click { block_id: i64 },
    DragEnd { block_id: i64, position: Position },
    PanEnd { offset: Position },
}

#[derive(Debug, Clone, PartialEq)]
enum State {
    Idle,
    Pending {
        block_id: i64,
        origin: Position,
        block_start: Position,
    },
    Dragging {
        block_id: i64,
        pointer_start: Position,
        block_start: Position,
        current: Position,
    },
    Panning {
        pan_start: Position,
    },
}

#[derive(Debug, Clone)]
pub struct PointerTracker {
    state: State,
    offset: Position,
    threshold: f64,
}

impl Default for PointerTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::with_threshold(DRAG_THRESHOLD)
    }

    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            state: State::Idle,
            offset: Position::default(),
            threshold,
        }
    }

    /// Current canvas pan offset.
    pub fn offset(&self) -> Position {
        self.offset
    }

    /// Id of the block being dragged, if a drag is in progress.
    pub fn dragging(&self) -> Option<i64> {
        match self.state {
            State::Dragging { block_id, .. } => Some(block_id),
            _ => None,
        }
    }

    pub fn is_panning(&self) -> bool {
        matches!(self.state, State::Panning { .. })
    }

    pub fn press_block(&mut self, block_id: i64, at: Position, block_position: Position) {
        self.state = State::Pending {
            block_id,
            origin: at,
            block_start: block_position,
        };
    }

    pub fn press_canvas(&mut self, at: Position) {
        self.state = State::Panning {
            pan_start: at - self.offset,
        };
    }

    pub fn motion(&mut self, at: Position) -> Option<PointerAction> {
        match self.state.clone() {
            State::Idle => None,
            State::Pending {
                block_id,
                origin,
                block_start,
            } => {
                let moved = (at.x - origin.x).abs() > self.threshold
                    || (at.y - origin.y).abs() > self.threshold;
                if moved {
                    // The drag is anchored where the threshold was crossed so
                    // the block does not jump under the pointer.
                    self.state = State::Dragging {
                        block_id,
                        pointer_start: at,
                        block_start,
                        current: block_start,
                    };
                }
                None
            }
            State::Dragging {
                block_id,
                pointer_start,
                block_start,
                ..
            } => {
                let position = block_start + (at - pointer_start);
                self.state = State::Dragging {
                    block_id,
                    pointer_start,
                    block_start,
                    current: position,
                };
                Some(PointerAction::MoveBlock { block_id, position })
            }
            State::Panning { pan_start } => {
                self.offset = at - pan_start;
                Some(PointerAction::Pan {
                    offset: self.offset,
                })
            }
        }
    }

    pub fn release(&mut self) -> Option<PointerOutcome> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Idle => None,
            State::Pending { block_id, .. } => Some(PointerOutcome::Click { block_id }),
            State::Dragging {
                block_id, current, ..
            } => Some(PointerOutcome::DragEnd {
                block_id,
                position: current,
            }),
            State::Panning { .. } => Some(PointerOutcome::PanEnd {
                offset: self.offset,
            }),
        }
    }
}
