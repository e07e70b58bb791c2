//! End-to-end tests for the HTTP client and unread poller against a live hub.

use std::sync::Arc;
use std::time::Duration;

use podspace::client::{ChatFeed, HubClient, UnreadPoller};
use podspace::common::BlockKind;
use podspace::config::HubConfig;
use podspace::hub::api::AppState;
use podspace::hub::db::{DbHandle, HubDb};
use podspace::hub::server::build_router;
use serde_json::{Value, json};
use tokio::sync::broadcast;

/// Serve a fresh in-memory hub on an ephemeral port and return its base URL.
async fn spawn_hub() -> String {
    let (ws_tx, _) = broadcast::channel(16);
    let state = Arc::new(AppState {
        db: DbHandle::new(HubDb::new_in_memory().unwrap()),
        ws_tx,
        config: HubConfig::default(),
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn api(
    base: &str,
    method: reqwest::Method,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Value {
    let http = reqwest::Client::new();
    let mut req = http.request(method, format!("{base}{path}"));
    if let Some(token) = token {
        req = req.bearer_auth(token);
    }
    if let Some(body) = body {
        req = req.json(&body);
    }
    let resp = req.send().await.unwrap();
    assert!(resp.status().is_success(), "{path} -> {}", resp.status());
    resp.json().await.unwrap_or(Value::Null)
}

async fn signup(base: &str, email: &str, name: &str) -> HubClient {
    api(
        base,
        reqwest::Method::POST,
        "/api/auth/signup",
        None,
        Some(json!({"email": email, "password": "secret1", "name": name})),
    )
    .await;
    let mut client = HubClient::new(base);
    client.sign_in(email, "secret1").await.unwrap();
    client
}

struct Fixture {
    base: String,
    ada: HubClient,
    bob: HubClient,
    pod_id: i64,
    chat_id: i64,
}

/// Ada owns a pod with a chat block and a docs block; Bob is in both.
async fn fixture() -> Fixture {
    let base = spawn_hub().await;
    let ada = signup(&base, "ada@gmail.com", "Ada Lovelace").await;
    let bob = signup(&base, "bob@gmail.com", "Bob Smith").await;
    let ada_token = ada.token().unwrap().to_string();
    let post = reqwest::Method::POST;

    let body = api(&base, post.clone(), "/api/pods", Some(&ada_token), Some(json!({"name": "Launch"}))).await;
    let pod_id = body["pod"]["id"].as_i64().unwrap();
    let body = api(
        &base,
        post.clone(),
        &format!("/api/pods/{pod_id}/invite"),
        Some(&ada_token),
        Some(json!({"email": "bob@gmail.com"})),
    )
    .await;
    let bob_id = body["member"]["id"].as_i64().unwrap();

    let mut chat_id = 0;
    for (kind, label) in [("chat", "General"), ("docs", "Specs")] {
        let body = api(
            &base,
            post.clone(),
            "/api/blocks",
            Some(&ada_token),
            Some(json!({"podId": pod_id, "type": kind, "label": label})),
        )
        .await;
        let id = body["block"]["id"].as_i64().unwrap();
        api(
            &base,
            post.clone(),
            &format!("/api/blocks/{id}/members"),
            Some(&ada_token),
            Some(json!({"userId": bob_id})),
        )
        .await;
        if kind == "chat" {
            chat_id = id;
        }
    }

    Fixture {
        base,
        ada,
        bob,
        pod_id,
        chat_id,
    }
}

async fn post_message(f: &Fixture, text: &str) {
    api(
        &f.base,
        reqwest::Method::POST,
        &format!("/api/chat/{}/messages", f.chat_id),
        f.bob.token(),
        Some(json!({"message": text})),
    )
    .await;
}

#[tokio::test]
async fn test_client_reads_blocks_and_unread_counts() {
    let f = fixture().await;
    let blocks = f.ada.blocks(f.pod_id).await.unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].kind, BlockKind::Chat);
    assert_eq!(blocks[1].kind, BlockKind::Docs);

    assert_eq!(f.ada.unread_count(f.chat_id).await.unwrap(), 0);
    post_message(&f, "hello").await;
    post_message(&f, "@Ada are you there?").await;
    assert_eq!(f.ada.unread_count(f.chat_id).await.unwrap(), 2);
    // Own messages never count as unread.
    assert_eq!(f.bob.unread_count(f.chat_id).await.unwrap(), 0);

    let notifications = f.ada.notifications().await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].block_name, "General");
    assert_eq!(notifications[0].pod_name, "Launch");
    assert_eq!(notifications[0].unread_count, 2);

    f.ada.mark_read(f.chat_id).await.unwrap();
    assert_eq!(f.ada.unread_count(f.chat_id).await.unwrap(), 0);
    assert!(f.ada.notifications().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_client_surfaces_hub_errors() {
    let base = spawn_hub().await;
    let mut client = HubClient::new(&base);
    let err = client.sign_in("nobody@gmail.com", "secret1").await.unwrap_err();
    assert!(err.to_string().contains("Invalid email or password"));

    let err = client.blocks(1).await.unwrap_err();
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_poller_publishes_snapshots() {
    let f = fixture().await;
    post_message(&f, "first").await;

    let poller = UnreadPoller::new(f.ada.clone(), f.pod_id, Duration::from_millis(100));
    let handle = poller.spawn().await.unwrap();
    assert_eq!(handle.board().len(), 2);
    assert_eq!(handle.board().chat_block_ids(), vec![f.chat_id]);

    let mut rx = handle.subscribe();
    let snapshot = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            rx.changed().await.unwrap();
            let snapshot = rx.borrow_and_update().clone();
            if snapshot.polls >= 1 {
                break snapshot;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(snapshot.unread.get(&f.chat_id), Some(&1));
    assert_eq!(snapshot.total_unread(), 1);
    assert_eq!(snapshot.notifications.len(), 1);

    f.ada.mark_read(f.chat_id).await.unwrap();
    let snapshot = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            rx.changed().await.unwrap();
            let snapshot = rx.borrow_and_update().clone();
            if snapshot.total_unread() == 0 {
                break snapshot;
            }
        }
    })
    .await
    .unwrap();
    assert!(snapshot.notifications.is_empty());

    handle.stop().await;
}

#[tokio::test]
async fn test_poller_picks_up_blocks_created_after_start() {
    let f = fixture().await;
    let handle = UnreadPoller::new(f.ada.clone(), f.pod_id, Duration::from_millis(100))
        .spawn()
        .await
        .unwrap();
    assert_eq!(handle.board().chat_block_ids(), vec![f.chat_id]);

    let body = api(
        &f.base,
        reqwest::Method::POST,
        "/api/blocks",
        f.bob.token(),
        Some(json!({"podId": f.pod_id, "type": "chat", "label": "Standup"})),
    )
    .await;
    let standup_id = body["block"]["id"].as_i64().unwrap();
    api(
        &f.base,
        reqwest::Method::POST,
        &format!("/api/chat/{standup_id}/messages"),
        f.bob.token(),
        Some(json!({"message": "late block"})),
    )
    .await;

    let mut rx = handle.subscribe();
    let snapshot = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            rx.changed().await.unwrap();
            let snapshot = rx.borrow_and_update().clone();
            if snapshot.unread.get(&standup_id) == Some(&1) {
                break snapshot;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(snapshot.unread.get(&f.chat_id), Some(&0));

    let board = handle.board();
    assert_eq!(board.len(), 3);
    assert_eq!(board.chat_block_ids(), vec![f.chat_id, standup_id]);
    assert_eq!(board.get(standup_id).unwrap().label, "Standup");

    handle.stop().await;
}

#[tokio::test]
async fn test_chat_feed_publishes_new_messages() {
    let f = fixture().await;
    post_message(&f, "first").await;

    let feed = ChatFeed::new(f.ada.clone(), f.chat_id, Duration::from_millis(100))
        .spawn()
        .await
        .unwrap();
    assert_eq!(feed.latest().len(), 1);
    assert_eq!(feed.latest()[0].message, "first");

    let mut rx = feed.subscribe();
    post_message(&f, "second").await;
    let messages = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            rx.changed().await.unwrap();
            let messages = rx.borrow_and_update().clone();
            if messages.len() == 2 {
                break messages;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(messages[1].message, "second");
    assert_eq!(messages[1].author_name, "Bob Smith");

    feed.stop().await;
}
