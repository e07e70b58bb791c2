//! Client side of the hub: a typed HTTP client and the pollers built on it.
//!
//! | Module   | Responsibility                                                 |
//! |----------|----------------------------------------------------------------|
//! | `http`   | `HubClient`, a thin `reqwest` wrapper over the REST API        |
//! | `poller` | `UnreadPoller` (unread counts + notifications), `ChatFeed`     |

pub mod http;
pub mod poller;

pub use http::HubClient;
pub use poller::{ChatFeed, FeedHandle, PollSnapshot, PollerHandle, UnreadPoller};
