// src/notify/microblog.rs
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One of our own previously published posts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnPost {
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

/// Seam to the external microblogging platform.
#[async_trait::async_trait]
pub trait MicroblogClient: Send + Sync {
    async fn post(&self, text: &str) -> Result<()>;

    /// Our most recent posts, newest first. Used only by the history-based
    /// rate gate.
    async fn recent_own_posts(&self, count: usize) -> Result<Vec<OwnPost>>;
}

/// HTTP client for a status-posting API with bearer-token auth.
#[derive(Clone)]
pub struct HttpMicroblog {
    base_url: String,
    token: String,
    client: reqwest::Client,
    timeout: Duration,
}

#[derive(Serialize)]
struct StatusPayload<'a> {
    status: &'a str,
}

#[derive(Deserialize)]
struct StatusDto {
    #[serde(alias = "content")]
    text: String,
    #[serde(alias = "created_at")]
    sent_at: DateTime<Utc>,
}

impl HttpMicroblog {
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

#[async_trait::async_trait]
impl MicroblogClient for HttpMicroblog {
    async fn post(&self, text: &str) -> Result<()> {
        let url = format!("{}/statuses", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .timeout(self.timeout)
            .json(&StatusPayload { status: text })
            .send()
            .await
            .context("posting status")?;
        resp.error_for_status().context("posting status")?;
        Ok(())
    }

    async fn recent_own_posts(&self, count: usize) -> Result<Vec<OwnPost>> {
        let url = format!("{}/statuses/own?limit={count}", self.base_url);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .timeout(self.timeout)
            .send()
            .await
            .context("listing own statuses")?
            .error_for_status()
            .context("listing own statuses")?;
        let dtos: Vec<StatusDto> = resp.json().await.context("parsing own statuses")?;
        Ok(dtos
            .into_iter()
            .map(|d| OwnPost {
                text: d.text,
                sent_at: d.sent_at,
            })
            .collect())
    }
}

/// Placeholder client for dry-run invocations with no API configured.
/// Posting is a hard error (the dry-run path never posts); the post history
/// is empty.
pub struct DisabledClient;

#[async_trait::async_trait]
impl MicroblogClient for DisabledClient {
    async fn post(&self, _text: &str) -> Result<()> {
        Err(anyhow!("no microblog API configured"))
    }

    async fn recent_own_posts(&self, _count: usize) -> Result<Vec<OwnPost>> {
        Ok(Vec::new())
    }
}

// --- Test helper ---
pub struct MockClient {
    pub posts: std::sync::Mutex<Vec<String>>,
    pub history: Vec<OwnPost>,
    pub fail_sends: bool,
}

impl MockClient {
    pub fn new() -> Self {
        Self {
            posts: std::sync::Mutex::new(Vec::new()),
            history: Vec::new(),
            fail_sends: false,
        }
    }

    pub fn with_history(history: Vec<OwnPost>) -> Self {
        Self {
            history,
            ..Self::new()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Self::new()
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.posts.lock().unwrap().clone()
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MicroblogClient for MockClient {
    async fn post(&self, text: &str) -> Result<()> {
        if self.fail_sends {
            return Err(anyhow!("send failed"));
        }
        self.posts.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn recent_own_posts(&self, count: usize) -> Result<Vec<OwnPost>> {
        Ok(self.history.iter().take(count).cloned().collect())
    }
}
