//! Rotation-aware server log tailer.
//!
//! Follows the newest matching log in a directory `tail -f` style and
//! switches to a newer file as soon as one appears.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use glob::Pattern;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::time::Instant;

use crate::config::LogsConfig;

use super::discovery::{compile_pattern, find_latest_log, LogCandidate};
use super::error::WatcherError;

/// Default wait for a new line before reporting [`TailEvent::Idle`].
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_secs(1);

/// Default delay between selection attempts while no log matches.
pub const DEFAULT_EMPTY_RETRY: Duration = Duration::from_secs(10);

/// What the tailer observed on one call to [`LogTailer::next_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailEvent {
    /// Started following a file, positioned at its end.
    Following(PathBuf),
    /// A complete line appended to the followed file, without its newline.
    Line(String),
    /// No new line arrived within the idle interval.
    Idle,
    /// A newer matching file replaced the followed one.
    Rotated { from: PathBuf, to: PathBuf },
    /// No file in the directory matches the pattern.
    NoLogFile,
}

/// Position in the file currently being followed.
#[derive(Debug)]
pub struct TailCursor {
    path: PathBuf,
    modified: SystemTime,
    offset: u64,
}

impl TailCursor {
    /// Open `candidate` positioned at its current end.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or inspected.
    pub async fn open_at_end(candidate: LogCandidate) -> Result<Self, WatcherError> {
        let file = File::open(&candidate.path)
            .await
            .map_err(|e| WatcherError::from_open(candidate.path.clone(), e))?;
        let metadata = file.metadata().await?;

        Ok(Self {
            path: candidate.path,
            modified: metadata.modified().unwrap_or(candidate.modified),
            offset: metadata.len(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Modification time seen at the last read.
    #[must_use]
    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read complete lines appended since the last read.
    ///
    /// A trailing line without its newline is left for the next read.
    /// Invalid UTF-8 is replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the file was deleted, became unreadable, or an
    /// I/O error occurs.
    pub async fn read_new_lines(&mut self) -> Result<Vec<String>, WatcherError> {
        let file = File::open(&self.path)
            .await
            .map_err(|e| WatcherError::from_open(self.path.clone(), e))?;

        let metadata = file.metadata().await?;
        let file_len = metadata.len();
        if let Ok(modified) = metadata.modified() {
            self.modified = modified;
        }

        if file_len < self.offset {
            tracing::warn!(
                path = %self.path.display(),
                old_offset = self.offset,
                new_len = file_len,
                "Log truncated, resetting offset to 0"
            );
            self.offset = 0;
        }

        if file_len == self.offset {
            return Ok(Vec::new());
        }

        let mut file = file;
        file.seek(std::io::SeekFrom::Start(self.offset)).await?;

        let mut reader = BufReader::new(file);
        let mut lines = Vec::new();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let bytes_read = reader.read_until(b'\n', &mut buf).await?;
            if bytes_read == 0 || buf.last() != Some(&b'\n') {
                break;
            }
            self.offset += bytes_read as u64;

            let line = String::from_utf8_lossy(&buf);
            lines.push(line.trim_end_matches(['\r', '\n']).to_string());
        }

        Ok(lines)
    }
}

/// Follows the newest log matching a glob in a directory.
///
/// Content present before a file is first followed is skipped. Read
/// faults never escape: the file is dropped and selection starts over.
#[derive(Debug)]
pub struct LogTailer {
    dir: PathBuf,
    pattern: Pattern,
    idle_interval: Duration,
    empty_retry: Duration,
    cursor: Option<TailCursor>,
    pending: VecDeque<String>,
    waiting_for_logs: bool,
    lost: Option<PathBuf>,
    last_rotation_check: Instant,
}

impl LogTailer {
    /// Create a tailer for files in `dir` whose names match `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::InvalidPattern`] for an invalid glob.
    pub fn new(dir: impl Into<PathBuf>, pattern: &str) -> Result<Self, WatcherError> {
        Ok(Self {
            dir: dir.into(),
            pattern: compile_pattern(pattern)?,
            idle_interval: DEFAULT_IDLE_INTERVAL,
            empty_retry: DEFAULT_EMPTY_RETRY,
            cursor: None,
            pending: VecDeque::new(),
            waiting_for_logs: false,
            lost: None,
            last_rotation_check: Instant::now(),
        })
    }

    /// Create a tailer from the `[logs]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::InvalidPattern`] for an invalid glob.
    pub fn from_config(config: &LogsConfig) -> Result<Self, WatcherError> {
        Ok(Self::new(&config.dir, &config.pattern)?
            .with_idle_interval(config.idle_interval())
            .with_empty_retry(config.empty_retry()))
    }

    #[must_use]
    pub fn with_idle_interval(mut self, interval: Duration) -> Self {
        self.idle_interval = interval;
        self
    }

    #[must_use]
    pub fn with_empty_retry(mut self, retry: Duration) -> Self {
        self.empty_retry = retry;
        self
    }

    /// The file currently being followed.
    #[must_use]
    pub fn current_path(&self) -> Option<&Path> {
        self.cursor.as_ref().map(TailCursor::path)
    }

    #[must_use]
    pub fn cursor(&self) -> Option<&TailCursor> {
        self.cursor.as_ref()
    }

    /// Stop following the current file and discard unread lines.
    ///
    /// The next call to [`next_event`](Self::next_event) selects afresh.
    pub fn release(&mut self) {
        self.cursor = None;
        self.pending.clear();
    }

    /// Wait for the next line or state change.
    ///
    /// Returns within roughly one idle interval when the file is quiet,
    /// or one empty-retry delay while no log exists.
    pub async fn next_event(&mut self) -> TailEvent {
        if let Some(line) = self.pending.pop_front() {
            return TailEvent::Line(line);
        }

        if self.cursor.is_none() {
            return self.select().await;
        }

        // A busy file never goes idle, so rotation is also checked between reads.
        if self.last_rotation_check.elapsed() >= self.idle_interval {
            if let Some(rotated) = self.check_rotation().await {
                return rotated;
            }
        }

        let cursor = match self.cursor.as_mut() {
            Some(cursor) => cursor,
            None => return TailEvent::Idle,
        };
        match cursor.read_new_lines().await {
            Ok(lines) if !lines.is_empty() => {
                self.pending.extend(lines);
                self.pending
                    .pop_front()
                    .map_or(TailEvent::Idle, TailEvent::Line)
            }
            Ok(_) => {
                tokio::time::sleep(self.idle_interval).await;
                self.check_rotation().await.unwrap_or(TailEvent::Idle)
            }
            Err(e) => {
                tracing::warn!(
                    path = %cursor.path().display(),
                    error = %e,
                    "Lost followed log, reselecting"
                );
                self.lost = Some(cursor.path().to_path_buf());
                self.cursor = None;
                tokio::time::sleep(self.idle_interval).await;
                TailEvent::Idle
            }
        }
    }

    async fn select(&mut self) -> TailEvent {
        if self.waiting_for_logs {
            tokio::time::sleep(self.empty_retry).await;
        }

        let candidate = match find_latest_log(&self.dir, &self.pattern) {
            Ok(Some(candidate)) => candidate,
            Ok(None) => {
                self.waiting_for_logs = true;
                return TailEvent::NoLogFile;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Log directory scan failed");
                self.waiting_for_logs = true;
                return TailEvent::NoLogFile;
            }
        };
        self.waiting_for_logs = false;

        let path = candidate.path.clone();
        match TailCursor::open_at_end(candidate).await {
            Ok(cursor) => {
                tracing::debug!(path = %path.display(), offset = cursor.offset(), "Following log");
                self.cursor = Some(cursor);
                self.last_rotation_check = Instant::now();
                if self.lost.take().as_ref() == Some(&path) {
                    // Same file as the one that just failed; stay quiet.
                    TailEvent::Idle
                } else {
                    TailEvent::Following(path)
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot open log");
                self.lost = Some(path);
                tokio::time::sleep(self.idle_interval).await;
                TailEvent::Idle
            }
        }
    }

    /// Switch files if a different log is now the newest.
    async fn check_rotation(&mut self) -> Option<TailEvent> {
        self.last_rotation_check = Instant::now();
        let current = self.cursor.as_ref()?.path().to_path_buf();

        let latest = match find_latest_log(&self.dir, &self.pattern) {
            Ok(Some(latest)) if latest.path != current => latest,
            Ok(_) => return None,
            Err(e) => {
                tracing::debug!(error = %e, "Rotation check failed");
                return None;
            }
        };

        let to = latest.path.clone();
        self.pending.clear();
        match TailCursor::open_at_end(latest).await {
            Ok(cursor) => {
                self.cursor = Some(cursor);
                Some(TailEvent::Rotated { from: current, to })
            }
            Err(e) => {
                tracing::warn!(path = %to.display(), error = %e, "Cannot open rotated log");
                self.cursor = None;
                None
            }
        }
    }
}
