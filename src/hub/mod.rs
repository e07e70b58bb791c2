//! The podspace hub: HTTP API, push channel and SQLite storage.
//!
//! ```text
//!   browser / watch client
//!          │  REST (bearer token)            ▲ WebSocket (?token=)
//!          ▼                                 │
//!   ┌──────────────┐   HubEvent JSON   ┌───────────┐
//!   │  api router  │ ────────────────▶ │    ws     │
//!   └──────┬───────┘  broadcast::Sender└───────────┘
//!          │ DbHandle::call (spawn_blocking)
//!          ▼
//!   ┌──────────────┐
//!   │   db (HubDb) │  users, sessions, pods, blocks, chat,
//!   └──────────────┘  documents, events, goals, files, explore
//! ```
//!
//! | Module    | Responsibility                                            |
//! |-----------|-----------------------------------------------------------|
//! | `api`     | Axum handlers, `ApiError`, auth extractors                |
//! | `auth`    | Password hashing, session tokens, signup validation       |
//! | `db`      | SQLite access via `DbHandle` (thin `Arc<Mutex<_>>`)       |
//! | `models`  | Wire and row types shared by `db` and `api`               |
//! | `seed`    | Bundled Explore profiles and the idempotent seeder        |
//! | `server`  | `ServerConfig`, router assembly, bind and serve           |
//! | `ws`      | `HubEvent` enum + `broadcast_event()` helper              |
//!
//! ## Typical request flow (post a chat message)
//!
//! 1. `POST /api/chat/{block_id}/messages` → `api::chat::post_message()`
//! 2. `AuthUser` resolves the bearer token to a session user.
//! 3. The handler checks block access, resolves `@mentions` against the
//!    block roster and inserts the message through `DbHandle::call`.
//! 4. `ws::broadcast_event()` pushes `MessagePosted` to sockets following
//!    the pod. Clients that only poll pick it up on their next unread check.

pub mod api;
pub mod auth;
pub mod db;
pub mod models;
pub mod seed;
pub mod server;
pub mod ws;
