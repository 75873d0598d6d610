//! Append-only durable log plus the bounded buffer served to the monitor.

use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
};

use log::{error, info, warn};
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};

/// Number of recent records kept for status requests.
pub const RING_CAPACITY: usize = 23;

/// Fixed-capacity FIFO of formatted records; the oldest entry is dropped first.
#[derive(Debug, Clone)]
pub struct LogRing {
    lines: VecDeque<String>,
    capacity: usize,
}

impl LogRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, line: String) {
        if self.capacity == 0 {
            return;
        }
        while self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl Default for LogRing {
    fn default() -> Self {
        Self::new(RING_CAPACITY)
    }
}

/// Durable record file plus an in-memory ring of the latest records.
///
/// Write failures on the file are reported through the `log` facade and never
/// returned: the control loop must keep running with a full disk.
#[derive(Debug)]
pub struct StatusLog {
    path: PathBuf,
    recent: Mutex<LogRing>,
}

impl StatusLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            recent: Mutex::new(LogRing::default()),
        }
    }

    /// Opens the log, creating the file when it does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let log = Self::new(path);
        match OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&log.path)
            .await
        {
            Ok(_) => info!("Log file created: {}", log.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                info!("Appending to log file: {}", log.path.display())
            }
            Err(e) => warn!("Failed to create log file {}: {e}", log.path.display()),
        }
        log
    }

    /// Writes `line` to the file and keeps it for status requests.
    pub async fn append(&self, line: &str) {
        self.write_durable(line).await;
        self.recent.lock().await.push(line.to_string());
    }

    /// Writes `line` to the file only.
    pub async fn write_durable(&self, line: &str) {
        if let Err(e) = self.write_line(line).await {
            error!("Failed to write log file {}: {e}", self.path.display());
        }
    }

    /// Copy of the buffered records, oldest first.
    pub async fn snapshot(&self) -> Vec<String> {
        self.recent.lock().await.lines()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_line(&self, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{line}\n").as_bytes()).await?;
        file.flush().await
    }
}
