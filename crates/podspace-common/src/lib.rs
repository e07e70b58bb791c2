//! Shared domain types for podspace.
//!
//! Everything in this crate is pure: no I/O, no async. The hub uses it to
//! place new blocks and resolve chat mentions; clients use it to keep a
//! local copy of a pod's canvas in sync with pointer input.
//!
//! | Module     | Purpose                                                |
//! |------------|--------------------------------------------------------|
//! | [`canvas`] | `Position` and the row-packing layout planner          |
//! | [`pointer`]| Click / drag / pan classification of pointer input     |
//! | [`board`]  | `BlockKind`, `BlockSummary` and the client `BlockBoard` |
//! | [`mentions`] | `@name` autocomplete and render-time segmentation    |
//! | [`roster`] | Member identity, initials and avatar colors            |

pub mod board;
pub mod canvas;
pub mod mentions;
pub mod pointer;
pub mod roster;

pub use board::{BlockBoard, BlockKind, BlockSummary, InvalidKind};
pub use canvas::{LayoutConfig, Position, next_position};
pub use mentions::{MentionQuery, Segment};
pub use pointer::{PointerAction, PointerOutcome, PointerTracker};
pub use roster::Member;
