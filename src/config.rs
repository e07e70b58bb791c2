//! Configuration for the podspace hub, read from `podspace.toml`.
//!
//! Layering is file, then environment, then CLI flags. Every field has a
//! default so an empty (or missing) file is valid.
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 3210
//! db_path = ".podspace/hub.db"
//! dev_mode = false
//!
//! [auth]
//! allowed_email_domains = ["gmail.com", "yahoo.com"]
//! session_ttl_hours = 168
//! min_password_len = 6
//!
//! [uploads]
//! max_image_bytes = 5242880
//! max_document_bytes = 10485760
//!
//! [poller]
//! unread_interval_secs = 30
//! chat_interval_secs = 2
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "podspace.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub uploads: UploadsSection,
    #[serde(default)]
    pub poller: PollerSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Permissive CORS for a separately served frontend.
    #[serde(default)]
    pub dev_mode: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3210
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".podspace/hub.db")
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
            dev_mode: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSection {
    /// Email domains accepted at signup (lowercase, without `@`).
    #[serde(default = "default_allowed_email_domains")]
    pub allowed_email_domains: Vec<String>,
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
    #[serde(default = "default_min_password_len")]
    pub min_password_len: usize,
}

fn default_allowed_email_domains() -> Vec<String> {
    ["gmail.com", "yahoo.com", "outlook.com", "hotmail.com", "icloud.com"]
        .iter()
        .map(|d| d.to_string())
        .collect()
}

fn default_session_ttl_hours() -> i64 {
    24 * 7
}

fn default_min_password_len() -> usize {
    6
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            allowed_email_domains: default_allowed_email_domains(),
            session_ttl_hours: default_session_ttl_hours(),
            min_password_len: default_min_password_len(),
        }
    }
}

impl AuthSection {
    pub fn allows_domain(&self, domain: &str) -> bool {
        let domain = domain.to_lowercase();
        self.allowed_email_domains
            .iter()
            .any(|d| d.eq_ignore_ascii_case(&domain))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadsSection {
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: usize,
}

fn default_max_image_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_max_document_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for UploadsSection {
    fn default() -> Self {
        Self {
            max_image_bytes: default_max_image_bytes(),
            max_document_bytes: default_max_document_bytes(),
        }
    }
}

impl UploadsSection {
    /// Request body limit for multipart routes: the larger upload plus
    /// headroom for the multipart framing and text fields.
    pub fn body_limit(&self) -> usize {
        self.max_image_bytes.max(self.max_document_bytes) + 64 * 1024
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerSection {
    #[serde(default = "default_unread_interval_secs")]
    pub unread_interval_secs: u64,
    #[serde(default = "default_chat_interval_secs")]
    pub chat_interval_secs: u64,
}

fn default_unread_interval_secs() -> u64 {
    30
}

fn default_chat_interval_secs() -> u64 {
    2
}

impl Default for PollerSection {
    fn default() -> Self {
        Self {
            unread_interval_secs: default_unread_interval_secs(),
            chat_interval_secs: default_chat_interval_secs(),
        }
    }
}

impl PollerSection {
    pub fn unread_interval(&self) -> Duration {
        Duration::from_secs(self.unread_interval_secs.max(1))
    }

    pub fn chat_interval(&self) -> Duration {
        Duration::from_secs(self.chat_interval_secs.max(1))
    }
}

impl HubConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse podspace.toml")
    }

    /// Load `path` if it exists, defaults otherwise, then apply the
    /// `PODSPACE_*` environment overrides.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup. Separated from
    /// `load_or_default` so tests need not touch the process environment.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("PODSPACE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PODSPACE_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("Invalid PODSPACE_PORT '{}'", port))?;
        }
        if let Some(db_path) = lookup("PODSPACE_DB_PATH") {
            self.server.db_path = PathBuf::from(db_path);
        }
        Ok(())
    }
}
