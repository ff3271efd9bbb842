//! JSON Lines outbox files.
//!
//! Each message is serialized to one line and flushed before the write
//! returns, so a crash loses at most the message being written.

use super::FetchDispatcher;
use crate::error::WorkerResult;
use async_trait::async_trait;
use pkgmeta_core::FetchTrigger;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Append-only JSON Lines file shared by concurrent writers.
#[derive(Debug)]
pub struct JsonlOutbox {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlOutbox {
    /// Open (or create) an outbox file for appending.
    pub async fn open(path: impl AsRef<Path>) -> WorkerResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one message as a single line.
    pub async fn append<T: Serialize + Sync>(&self, message: &T) -> WorkerResult<()> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Dispatcher writing each trigger to an outbox file.
#[derive(Debug)]
pub struct OutboxDispatcher {
    outbox: JsonlOutbox,
}

impl OutboxDispatcher {
    pub async fn open(path: impl AsRef<Path>) -> WorkerResult<Self> {
        let outbox = JsonlOutbox::open(path).await?;
        tracing::info!(path = %outbox.path().display(), "Fetch trigger outbox opened");
        Ok(Self { outbox })
    }
}

#[async_trait]
impl FetchDispatcher for OutboxDispatcher {
    async fn dispatch(&self, trigger: FetchTrigger) -> WorkerResult<()> {
        self.outbox.append(&trigger).await?;
        tracing::debug!(purl = %trigger.purl, "Fetch trigger written to outbox");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgmeta_core::{MetadataKind, RequestedMetadata};
    use time::OffsetDateTime;

    #[tokio::test]
    async fn test_outbox_writes_one_trigger_per_line() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("out").join("triggers.jsonl");
        let dispatcher = OutboxDispatcher::open(&path).await.unwrap();

        for purl in ["pkg:maven/com.acme/lib@1.0.0", "pkg:npm/left-pad@1.3.0"] {
            dispatcher
                .dispatch(FetchTrigger {
                    component_uuid: Some(uuid::Uuid::new_v4()),
                    purl: purl.to_string(),
                    internal: false,
                    requested: MetadataKind::Integrity.requested(),
                    triggered_at: OffsetDateTime::now_utc(),
                })
                .await
                .unwrap();
        }

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: FetchTrigger = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.purl, "pkg:maven/com.acme/lib@1.0.0");
        assert_eq!(
            first.requested,
            vec![RequestedMetadata::Integrity, RequestedMetadata::LatestVersion]
        );
    }

    #[tokio::test]
    async fn test_outbox_appends_across_reopen() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("signals.jsonl");

        JsonlOutbox::open(&path)
            .await
            .unwrap()
            .append(&serde_json::json!({"n": 1}))
            .await
            .unwrap();
        JsonlOutbox::open(&path)
            .await
            .unwrap()
            .append(&serde_json::json!({"n": 2}))
            .await
            .unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "{\"n\":1}\n{\"n\":2}\n");
    }
}
