//! Unread watcher command: `podspace watch`.

use anyhow::{Context, Result};
use std::time::Duration;

use podspace::client::{ChatFeed, HubClient, PollSnapshot, PollerHandle, UnreadPoller};
use podspace::config::HubConfig;
use podspace::hub::models::ChatMessage;

pub struct WatchArgs<'a> {
    pub server: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub pod_id: i64,
    pub interval: Option<u64>,
    pub chat: Option<i64>,
}

pub async fn cmd_watch(config: &HubConfig, args: WatchArgs<'_>) -> Result<()> {
    let interval = args
        .interval
        .map(|secs| Duration::from_secs(secs.max(1)))
        .unwrap_or_else(|| config.poller.unread_interval());

    let mut client = HubClient::new(args.server);
    let user = client
        .sign_in(args.email, args.password)
        .await
        .context("Failed to sign in")?;
    println!("Signed in as {} <{}>", user.name, user.email);

    let feed = match args.chat {
        Some(block_id) => {
            let feed = ChatFeed::new(client.clone(), block_id, config.poller.chat_interval())
                .spawn()
                .await?;
            for message in feed.latest() {
                print_message(&message);
            }
            Some(feed)
        }
        None => None,
    };
    let mut last_seen = feed
        .as_ref()
        .and_then(|f| f.latest().last().map(|m| m.id))
        .unwrap_or(0);
    let mut messages = feed.as_ref().map(|f| f.subscribe());

    let handle = UnreadPoller::new(client, args.pod_id, interval)
        .spawn()
        .await?;
    let board = handle.board();
    println!(
        "Watching pod {} ({} blocks, {} chat) every {}s; Ctrl+C to stop",
        args.pod_id,
        board.len(),
        board.chat_block_ids().len(),
        interval.as_secs()
    );

    let mut snapshots = handle.subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                print_snapshot(&handle, &snapshot);
            }
            changed = async {
                match messages.as_mut() {
                    Some(rx) => rx.changed().await,
                    None => std::future::pending().await,
                }
            } => {
                if changed.is_err() {
                    break;
                }
                if let Some(rx) = messages.as_mut() {
                    let latest = rx.borrow_and_update().clone();
                    for message in latest.iter().filter(|m| m.id > last_seen) {
                        print_message(message);
                    }
                    last_seen = latest.last().map(|m| m.id).unwrap_or(last_seen);
                }
            }
        }
    }

    handle.stop().await;
    if let Some(feed) = feed {
        feed.stop().await;
    }
    Ok(())
}

fn print_message(message: &ChatMessage) {
    println!("  <{}> {}", message.author_name, message.message);
}

fn print_snapshot(handle: &PollerHandle, snapshot: &PollSnapshot) {
    let board = handle.board();
    println!("[poll {}] {} unread", snapshot.polls, snapshot.total_unread());
    for (block_id, count) in &snapshot.unread {
        let label = board
            .get(*block_id)
            .map(|b| b.label.as_str())
            .unwrap_or("?");
        println!("  #{:<14} {}", label, count);
    }
    for n in &snapshot.notifications {
        println!("  {} / {}: {} unread", n.pod_name, n.block_name, n.unread_count);
    }
}
