use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

/// Durable slot for the bearer token. Holds at most one value; last write wins.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self) -> anyhow::Result<Option<String>>;
    async fn save(&self, token: &str) -> anyhow::Result<()>;
    async fn remove(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenFile {
    token: String,
}

/// Token kept as `{"token": "..."}` in a JSON file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> anyhow::Result<Option<String>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("read token file {}", self.path.display()))
            }
        };
        let file: TokenFile = serde_json::from_slice(&raw)
            .with_context(|| format!("parse token file {}", self.path.display()))?;
        Ok(Some(file.token).filter(|t| !t.is_empty()))
    }

    async fn save(&self, token: &str) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create token directory {}", parent.display()))?;
        }
        let body = serde_json::to_vec(&TokenFile {
            token: token.to_string(),
        })?;
        tokio::fs::write(&self.path, body)
            .await
            .with_context(|| format!("write token file {}", self.path.display()))?;
        debug!(path = %self.path.display(), "token saved");
        Ok(())
    }

    async fn remove(&self) -> anyhow::Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "token removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove token file {}", self.path.display())),
        }
    }
}

/// In-process token slot, gone when the process exits.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: RwLock::new(Some(token.into())),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> anyhow::Result<Option<String>> {
        Ok(self.slot.read().await.clone())
    }

    async fn save(&self, token: &str) -> anyhow::Result<()> {
        *self.slot.write().await = Some(token.to_string());
        Ok(())
    }

    async fn remove(&self) -> anyhow::Result<()> {
        *self.slot.write().await = None;
        Ok(())
    }
}
