//! Server log watching.
//!
//! Locates the newest server log and follows it across rotations.

mod discovery;
mod error;
mod tailer;

pub use discovery::{compile_pattern, find_latest_log, matching_logs, LogCandidate};
pub use error::WatcherError;
pub use tailer::{LogTailer, TailCursor, TailEvent, DEFAULT_EMPTY_RETRY, DEFAULT_IDLE_INTERVAL};
