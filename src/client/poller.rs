//! Periodic polling of a pod for unread counts and open-chat messages.
//!
//! The hub's WebSocket is optional; these pollers are what keep badge
//! counts and open chats fresh.
//!
//! - [`UnreadPoller`] reloads the pod's blocks every tick, then asks for the
//!   unread count of every chat block plus the cross-pod notification list.
//!   The board and a [`PollSnapshot`] are published through `watch`
//!   channels so any number of readers can observe the latest state.
//! - [`ChatFeed`] re-fetches the messages of one open chat block on the
//!   (shorter) chat interval and publishes the list when it changes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use podspace_common::BlockBoard;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::http::HubClient;
use crate::hub::models::{ChatMessage, UnreadNotification};

/// Latest poll result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollSnapshot {
    /// Unread count per chat block id.
    pub unread: BTreeMap<i64, u64>,
    pub notifications: Vec<UnreadNotification>,
    /// Completed polls since start; 0 until the first tick lands.
    pub polls: u64,
}

impl PollSnapshot {
    pub fn total_unread(&self) -> u64 {
        self.unread.values().sum()
    }
}

/// A spawned polling loop and the means to stop it.
struct Worker {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl Worker {
    fn spawn<F, Fut>(interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        if !tick().await {
                            break;
                        }
                    }
                }
            }
        });
        Self {
            shutdown_tx: Some(shutdown_tx),
            task,
        }
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            warn!(error = %e, "poller task ended abnormally");
        }
    }
}

// ── Unread counts ────────────────────────────────────────────────────

pub struct UnreadPoller {
    client: HubClient,
    pod_id: i64,
    interval: Duration,
}

impl UnreadPoller {
    pub fn new(client: HubClient, pod_id: i64, interval: Duration) -> Self {
        Self {
            client,
            pod_id,
            interval,
        }
    }

    /// Fetch the pod's blocks into a fresh board.
    pub async fn load_board(&self) -> anyhow::Result<BlockBoard> {
        let blocks = self
            .client
            .blocks(self.pod_id)
            .await
            .with_context(|| format!("Failed to load blocks for pod {}", self.pod_id))?;
        Ok(BlockBoard::from_blocks(blocks))
    }

    /// Reload the board, keeping `current` when the hub cannot be reached.
    pub async fn refresh_board(&self, current: &BlockBoard) -> BlockBoard {
        match self.load_board().await {
            Ok(board) => board,
            Err(e) => {
                warn!(pod_id = self.pod_id, error = %e, "block refresh failed");
                current.clone()
            }
        }
    }

    /// Run one poll against `board`.
    ///
    /// A failed unread request counts as 0 for that block. A failed
    /// notification request keeps `previous`.
    pub async fn poll_once(
        &self,
        board: &BlockBoard,
        previous: &[UnreadNotification],
    ) -> PollSnapshot {
        let mut unread = BTreeMap::new();
        for block_id in board.chat_block_ids() {
            let count = match self.client.unread_count(block_id).await {
                Ok(count) => count,
                Err(e) => {
                    warn!(block_id, error = %e, "unread count failed");
                    0
                }
            };
            unread.insert(block_id, count);
        }

        let notifications = match self.client.notifications().await {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "notification fetch failed");
                previous.to_vec()
            }
        };

        PollSnapshot {
            unread,
            notifications,
            polls: 0,
        }
    }

    /// Load the board, then poll on a fixed interval until stopped.
    ///
    /// Each tick reloads the board first, so chat blocks created or deleted
    /// after start are picked up.
    pub async fn spawn(self) -> anyhow::Result<PollerHandle> {
        let board = self.load_board().await?;
        info!(
            pod_id = self.pod_id,
            chat_blocks = board.chat_block_ids().len(),
            interval_secs = self.interval.as_secs(),
            "unread poller started"
        );

        let (board_tx, board_rx) = watch::channel(board);
        let (snapshot_tx, snapshot_rx) = watch::channel(PollSnapshot::default());
        let (board_tx, snapshot_tx) = (Arc::new(board_tx), Arc::new(snapshot_tx));
        let interval = self.interval;
        let poller = Arc::new(self);
        let mut polls = 0u64;

        let worker = Worker::spawn(interval, move || {
            let poller = poller.clone();
            let board_tx = board_tx.clone();
            let snapshot_tx = snapshot_tx.clone();
            polls += 1;
            let polls = polls;
            async move {
                let current = board_tx.borrow().clone();
                let board = poller.refresh_board(&current).await;
                board_tx.send_replace(board.clone());

                let previous = snapshot_tx.borrow().notifications.clone();
                let mut snapshot = poller.poll_once(&board, &previous).await;
                snapshot.polls = polls;
                debug!(polls, total_unread = snapshot.total_unread(), "poll complete");
                snapshot_tx.send(snapshot).is_ok()
            }
        });

        Ok(PollerHandle {
            boards: board_rx,
            snapshots: snapshot_rx,
            worker,
        })
    }
}

/// Running unread poller. Dropping it without [`PollerHandle::stop`] leaves
/// the task running until every snapshot receiver is gone.
pub struct PollerHandle {
    boards: watch::Receiver<BlockBoard>,
    snapshots: watch::Receiver<PollSnapshot>,
    worker: Worker,
}

impl PollerHandle {
    /// The board as of the latest refresh.
    pub fn board(&self) -> BlockBoard {
        self.boards.borrow().clone()
    }

    pub fn subscribe_board(&self) -> watch::Receiver<BlockBoard> {
        self.boards.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot> {
        self.snapshots.clone()
    }

    pub fn latest(&self) -> PollSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Signal the loop and wait for it to exit.
    pub async fn stop(self) {
        self.worker.stop().await;
        info!("unread poller stopped");
    }
}

// ── Open chat ────────────────────────────────────────────────────────

/// Keeps the message list of one open chat block fresh.
pub struct ChatFeed {
    client: HubClient,
    block_id: i64,
    interval: Duration,
}

impl ChatFeed {
    pub fn new(client: HubClient, block_id: i64, interval: Duration) -> Self {
        Self {
            client,
            block_id,
            interval,
        }
    }

    /// Fetch the messages once, then re-fetch on the interval until stopped.
    /// Receivers are only woken when the list actually changes.
    pub async fn spawn(self) -> anyhow::Result<FeedHandle> {
        let initial = self
            .client
            .messages(self.block_id)
            .await
            .with_context(|| format!("Failed to load messages for block {}", self.block_id))?;
        info!(block_id = self.block_id, messages = initial.len(), "chat feed started");

        let (messages_tx, messages_rx) = watch::channel(initial);
        let messages_tx = Arc::new(messages_tx);
        let interval = self.interval;
        let feed = Arc::new(self);

        let worker = Worker::spawn(interval, move || {
            let feed = feed.clone();
            let messages_tx = messages_tx.clone();
            async move {
                match feed.client.messages(feed.block_id).await {
                    Ok(latest) => {
                        messages_tx.send_if_modified(|current| {
                            if *current == latest {
                                return false;
                            }
                            *current = latest;
                            true
                        });
                    }
                    Err(e) => warn!(block_id = feed.block_id, error = %e, "message refresh failed"),
                }
                !messages_tx.is_closed()
            }
        });

        Ok(FeedHandle {
            messages: messages_rx,
            worker,
        })
    }
}

pub struct FeedHandle {
    messages: watch::Receiver<Vec<ChatMessage>>,
    worker: Worker,
}

impl FeedHandle {
    pub fn subscribe(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.messages.clone()
    }

    pub fn latest(&self) -> Vec<ChatMessage> {
        self.messages.borrow().clone()
    }

    pub async fn stop(self) {
        self.worker.stop().await;
        info!("chat feed stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podspace_common::{BlockKind, BlockSummary};

    fn notification(block_id: i64, count: u64) -> UnreadNotification {
        UnreadNotification {
            block_id,
            block_name: "General".into(),
            pod_id: 1,
            pod_name: "Pod".into(),
            unread_count: count,
        }
    }

    fn chat_board() -> BlockBoard {
        BlockBoard::from_blocks(vec![BlockSummary {
            id: 7,
            pod_id: 1,
            kind: BlockKind::Chat,
            label: "General".into(),
            x: 100.0,
            y: 100.0,
            creator_id: 1,
        }])
    }

    #[test]
    fn test_total_unread() {
        let mut snapshot = PollSnapshot::default();
        assert_eq!(snapshot.total_unread(), 0);
        snapshot.unread.insert(1, 3);
        snapshot.unread.insert(2, 4);
        assert_eq!(snapshot.total_unread(), 7);
    }

    #[tokio::test]
    async fn test_unreachable_hub_counts_as_zero() {
        // Nothing listens on port 9 of localhost; every request fails fast.
        let client = HubClient::new("http://127.0.0.1:9").with_token("t");
        let poller = UnreadPoller::new(client, 1, Duration::from_secs(30));
        let board = chat_board();
        let previous = vec![notification(7, 2)];

        let snapshot = poller.poll_once(&board, &previous).await;
        assert_eq!(snapshot.unread.get(&7), Some(&0));
        assert_eq!(snapshot.notifications, previous);
    }

    #[tokio::test]
    async fn test_refresh_keeps_board_when_hub_unreachable() {
        let client = HubClient::new("http://127.0.0.1:9").with_token("t");
        let poller = UnreadPoller::new(client, 1, Duration::from_secs(30));
        let board = poller.refresh_board(&chat_board()).await;
        assert_eq!(board.chat_block_ids(), vec![7]);
    }

    #[tokio::test]
    async fn test_spawn_fails_without_hub() {
        let client = HubClient::new("http://127.0.0.1:9");
        let poller = UnreadPoller::new(client, 1, Duration::from_secs(30));
        let err = poller.spawn().await.err().unwrap();
        assert!(err.to_string().contains("Failed to load blocks for pod 1"));
    }

    #[tokio::test]
    async fn test_chat_feed_fails_without_hub() {
        let client = HubClient::new("http://127.0.0.1:9");
        let feed = ChatFeed::new(client, 3, Duration::from_secs(2));
        let err = feed.spawn().await.err().unwrap();
        assert!(err.to_string().contains("Failed to load messages for block 3"));
    }
}
