//! Cache event notifications
//!
//! Observers see hits, misses, truncations and clears. They are purely
//! informational: a cache with no observers behaves identically.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Something that happened to a cache root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CacheEvent {
    /// Result served from a stored artifact
    Hit { identity: String, key: String },
    /// Result computed and stored
    Miss { identity: String, key: String },
    /// Identity and its tail removed
    Truncated {
        from: String,
        removed: Vec<String>,
        artifacts: usize,
    },
    /// Every artifact removed
    Cleared { artifacts: usize },
}

impl CacheEvent {
    /// Dotted event name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hit { .. } => "checkpoint.hit",
            Self::Miss { .. } => "checkpoint.miss",
            Self::Truncated { .. } => "cache.truncated",
            Self::Cleared { .. } => "cache.cleared",
        }
    }
}

/// Receiver of cache events
#[async_trait]
pub trait CacheObserver: Send + Sync {
    /// Handle one event; must not fail the cache operation
    async fn notify(&self, event: &CacheEvent);
}

/// File-based audit logger that appends JSON lines
pub struct AuditLog {
    enabled: bool,
    path: PathBuf,
}

impl AuditLog {
    /// Create an audit logger writing to `path`
    pub fn new(path: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            enabled,
            path: path.into(),
        }
    }

    /// Log file location
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl CacheObserver for AuditLog {
    /// Silently drops events on IO failure
    async fn notify(&self, event: &CacheEvent) {
        if !self.enabled {
            return;
        }

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event": event.name(),
            "data": event,
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize audit event: {}", e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write audit log: {}", e);
        }
    }
}
