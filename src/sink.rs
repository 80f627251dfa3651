//! Append-only line log for one-shot execution output.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::Result;

/// Destination for rendered output lines.
#[async_trait]
pub trait LineSink: Send + Sync {
    /// Append one line. A trailing newline is added by the sink.
    async fn append(&self, line: &str) -> Result<()>;
}

/// Appends lines to a file, creating it and its parent directories on first use.
///
/// Concurrent appends are serialized so lines from different requests never
/// interleave mid-line.
pub struct FileLineSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileLineSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole log, or `None` if nothing has been written yet.
    pub async fn read_all(&self) -> Result<Option<String>> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl LineSink for FileLineSink {
    async fn append(&self, line: &str) -> Result<()> {
        let _guard = self.lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');
        file.write_all(record.as_bytes()).await?;
        file.flush().await?;
        debug!(path = %self.path.display(), "appended log line");
        Ok(())
    }
}

/// Discards everything. Used when the log file is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl LineSink for NullSink {
    async fn append(&self, _line: &str) -> Result<()> {
        Ok(())
    }
}
