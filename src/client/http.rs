use anyhow::Context;
use podspace_common::BlockSummary;
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::hub::models::{ChatMessage, UnreadNotification, User};

/// REST client for a running hub. Cheap to clone.
#[derive(Debug, Clone)]
pub struct HubClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct SigninResponse {
    token: String,
    user: User,
}

#[derive(Deserialize)]
struct BlocksResponse {
    blocks: Vec<BlockSummary>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnreadResponse {
    unread_count: u64,
}

#[derive(Deserialize)]
struct MessagesResponse {
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct NotificationsResponse {
    notifications: Vec<UnreadNotification>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl HubClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sign in and keep the session token for later calls.
    pub async fn sign_in(&mut self, email: &str, password: &str) -> anyhow::Result<User> {
        let resp = self
            .http
            .post(self.url("/api/auth/signin"))
            .json(&serde_json::json!({"email": email, "password": password}))
            .send()
            .await
            .context("Failed to send sign-in request to hub")?;
        let body: SigninResponse = decode(resp, "sign-in").await?;
        self.token = Some(body.token);
        Ok(body.user)
    }

    /// Blocks of one pod, in creation order.
    pub async fn blocks(&self, pod_id: i64) -> anyhow::Result<Vec<BlockSummary>> {
        let resp = self
            .authed(self.http.get(self.url("/api/blocks")))
            .query(&[("podId", pod_id)])
            .send()
            .await
            .context("Failed to send block list request to hub")?;
        let body: BlocksResponse = decode(resp, "block list").await?;
        Ok(body.blocks)
    }

    pub async fn unread_count(&self, block_id: i64) -> anyhow::Result<u64> {
        let resp = self
            .authed(self.http.get(self.url(&format!("/api/blocks/{block_id}/unread"))))
            .send()
            .await
            .context("Failed to send unread count request to hub")?;
        let body: UnreadResponse = decode(resp, "unread count").await?;
        Ok(body.unread_count)
    }

    pub async fn mark_read(&self, block_id: i64) -> anyhow::Result<()> {
        let resp = self
            .authed(self.http.post(self.url(&format!("/api/blocks/{block_id}/unread"))))
            .send()
            .await
            .context("Failed to send mark-read request to hub")?;
        check(resp, "mark read").await?;
        Ok(())
    }

    /// Every message in a chat block, oldest first.
    pub async fn messages(&self, block_id: i64) -> anyhow::Result<Vec<ChatMessage>> {
        let resp = self
            .authed(self.http.get(self.url(&format!("/api/chat/{block_id}/messages"))))
            .send()
            .await
            .context("Failed to send message list request to hub")?;
        let body: MessagesResponse = decode(resp, "message list").await?;
        Ok(body.messages)
    }

    /// Chat blocks with unread messages across every pod the user belongs to.
    pub async fn notifications(&self) -> anyhow::Result<Vec<UnreadNotification>> {
        let resp = self
            .authed(self.http.get(self.url("/api/notifications/unread")))
            .send()
            .await
            .context("Failed to send notifications request to hub")?;
        let body: NotificationsResponse = decode(resp, "notifications").await?;
        Ok(body.notifications)
    }
}

/// Turn a non-2xx response into an error carrying the hub's `error` message.
async fn check(resp: Response, what: &str) -> anyhow::Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = match resp.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    };
    anyhow::bail!("Hub {} request failed ({}): {}", what, status.as_u16(), message)
}

async fn decode<T: DeserializeOwned>(resp: Response, what: &str) -> anyhow::Result<T> {
    check(resp, what)
        .await?
        .json::<T>()
        .await
        .with_context(|| format!("Failed to parse {} response from hub", what))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = HubClient::new("http://localhost:3210/");
        assert_eq!(client.base_url(), "http://localhost:3210");
        assert_eq!(client.url("/health"), "http://localhost:3210/health");
    }

    #[test]
    fn test_with_token() {
        let client = HubClient::new("http://localhost:3210");
        assert!(client.token().is_none());
        let client = client.with_token("abc");
        assert_eq!(client.token(), Some("abc"));
    }

    #[test]
    fn test_block_list_parses_full_block_rows() {
        let json = r#"{"blocks":[{"id":1,"podId":2,"type":"chat","label":"General",
            "description":"","x":100.0,"y":100.0,"creatorId":3,"createdAt":"2025-01-01"}]}"#;
        let body: BlocksResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.blocks.len(), 1);
        assert_eq!(body.blocks[0].label, "General");
        assert_eq!(body.blocks[0].pod_id, 2);
    }
}
