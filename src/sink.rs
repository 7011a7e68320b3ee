use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::transport::FrameHandler;

/// Appends every received record, one per line, to a file.
#[derive(Debug)]
pub struct LogSink {
    path: PathBuf,
    // appends from concurrent connections must not interleave
    write_lock: Mutex<()>,
}

impl LogSink {
    /// Creates the parent directory of `path` if it is missing. The file itself is created on the
    /// first record.
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, record: &str) -> io::Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path).await?;
        let mut line = record.as_bytes().to_vec();
        line.push(b'\n');
        file.write_all(&line).await?;
        file.flush().await
    }
}

impl FrameHandler for LogSink {
    type FollowUp = ();

    async fn on_frame(&self, record: String) {
        match self.append(&record).await {
            Ok(()) => tracing::debug!(%record, "stored"),
            Err(err) => tracing::error!(error = %err, path = %self.path.display(), "failed to store record"),
        }
    }

    async fn follow_up(&self, _: ()) {}
}
