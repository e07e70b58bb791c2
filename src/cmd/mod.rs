//! CLI command implementations.
//!
//! | Module    | Commands handled |
//! |-----------|------------------|
//! | `serve`   | `Serve`          |
//! | `db`      | `InitDb`, `Seed` |
//! | `watch`   | `Watch`          |

pub mod db;
pub mod serve;
pub mod watch;

pub use db::{cmd_init_db, cmd_seed};
pub use serve::cmd_serve;
pub use watch::{WatchArgs, cmd_watch};
