//! The full loop: tail a log, react to a trigger line, stop on cancel.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use pz_watchdog::daemon::{Watchdog, WatchdogStats};
use pz_watchdog::notify::{NotificationEvent, NotificationSender, Route};
use pz_watchdog::restart::{RestartOrchestrator, RestartTiming};
use pz_watchdog::watcher::LogTailer;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::support::{Call, Reply, ScriptedRemote};

const PATTERN: &str = "*_DebugLog-server.txt";
const TRIGGER: &str = "[18-05-24 10:00:00.000] LOG  : General     , 1716026400000> CheckModsNeedUpdate: Mods need update";

fn fast_timing() -> RestartTiming {
    RestartTiming {
        countdown_tick_secs: 0,
        final_warning_secs: 0,
        offline_timeout_secs: 1,
        online_timeout_secs: 1,
        poll_interval_secs: 0,
    }
}

fn append(path: &Path, line: &str) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    writeln!(file, "{line}").unwrap();
}

struct Harness {
    remote: Arc<ScriptedRemote>,
    events: mpsc::UnboundedReceiver<NotificationEvent>,
    cancel: CancellationToken,
    handle: JoinHandle<WatchdogStats>,
}

impl Harness {
    fn start(dir: &Path, forced_check: Option<Duration>) -> Self {
        let remote = ScriptedRemote::new([Reply::players(0), Reply::Refused], Reply::players(0));
        Self::start_with(dir, forced_check, remote)
    }

    fn start_with(dir: &Path, forced_check: Option<Duration>, remote: ScriptedRemote) -> Self {
        let remote = Arc::new(remote);
        let (notify, events) = NotificationSender::channel();
        let tailer = LogTailer::new(dir, PATTERN)
            .unwrap()
            .with_idle_interval(Duration::from_millis(50))
            .with_empty_retry(Duration::from_millis(50));
        let orchestrator = RestartOrchestrator::new(Arc::clone(&remote), notify.clone())
            .with_cooldown(0)
            .with_timing(fast_timing());
        let mut watchdog = Watchdog::new(tailer, Arc::clone(&remote), orchestrator, notify)
            .with_forced_check(forced_check);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move { watchdog.run(&cancel).await }
        });

        Self {
            remote,
            events,
            cancel,
            handle,
        }
    }

    /// Wait for a notification containing `needle`.
    async fn expect(&mut self, needle: &str) -> String {
        let wait = async {
            loop {
                let event = self.events.recv().await.expect("notification queue closed");
                if event.text.contains(needle) {
                    return event.text;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .unwrap_or_else(|_| panic!("no notification containing {needle:?}"))
    }

    async fn stop(self) -> WatchdogStats {
        self.cancel.cancel();
        self.handle.await.unwrap()
    }
}

fn create_log(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[tokio::test]
async fn trigger_line_runs_one_restart() {
    let dir = TempDir::new().unwrap();
    // Written before the watchdog starts, so never seen.
    let log = create_log(&dir, "2024-05-18_10-00_DebugLog-server.txt", &format!("{TRIGGER}\n"));

    let mut harness = Harness::start(dir.path(), None);
    harness.expect("Monitoring log file").await;

    append(&log, "unrelated line");
    append(&log, TRIGGER);
    append(&log, TRIGGER);
    harness.expect("Mods updated detected in log").await;
    harness.expect("Restart completed").await;

    let remote = Arc::clone(&harness.remote);
    let stats = harness.stop().await;
    assert_eq!(stats.triggers, 1);
    assert_eq!(stats.restarts_completed, 1);
    assert_eq!(remote.count(&Call::Shutdown), 1);
}

#[tokio::test]
async fn aborted_restart_is_reported_as_aborted() {
    let dir = TempDir::new().unwrap();
    let log = create_log(&dir, "2024-05-18_10-00_DebugLog-server.txt", "");

    let remote = ScriptedRemote::new(Vec::<Reply>::new(), Reply::Refused);
    let mut harness = Harness::start_with(dir.path(), None, remote);
    harness.expect("Monitoring log file").await;

    append(&log, TRIGGER);
    let text = harness.expect("searching for a new log file").await;
    assert_eq!(text, "Restart aborted, searching for a new log file.");

    let remote = Arc::clone(&harness.remote);
    let stats = harness.stop().await;
    assert_eq!(stats.restarts_aborted, 1);
    assert_eq!(stats.restarts_completed, 0);
    assert_eq!(remote.count(&Call::Shutdown), 0);
}

#[tokio::test]
async fn newer_log_takes_over() {
    let dir = TempDir::new().unwrap();
    let old = create_log(&dir, "2024-05-18_10-00_DebugLog-server.txt", "");
    let old_time = SystemTime::now() - Duration::from_secs(3600);
    fs::File::options()
        .write(true)
        .open(&old)
        .unwrap()
        .set_modified(old_time)
        .unwrap();

    let mut harness = Harness::start(dir.path(), None);
    harness.expect("Monitoring log file").await;

    let new = create_log(&dir, "2024-05-18_11-00_DebugLog-server.txt", "");
    let text = harness.expect("New log file detected").await;
    assert!(text.contains(&new.display().to_string()));

    append(&new, TRIGGER);
    harness.expect("Restart completed").await;
    assert_eq!(harness.stop().await.restarts_completed, 1);
}

#[tokio::test]
async fn empty_directory_is_reported_and_retried() {
    let dir = TempDir::new().unwrap();

    let mut harness = Harness::start(dir.path(), None);
    harness.expect("No log file found").await;
    harness.expect("No log file found").await;

    create_log(&dir, "2024-05-18_10-00_DebugLog-server.txt", "");
    harness.expect("Monitoring log file").await;
    assert_eq!(harness.stop().await.triggers, 0);
}

#[tokio::test]
async fn forced_mod_check_runs_on_idle_ticks() {
    let dir = TempDir::new().unwrap();
    create_log(&dir, "2024-05-18_10-00_DebugLog-server.txt", "");

    let harness = Harness::start(dir.path(), Some(Duration::from_millis(100)));
    let remote = Arc::clone(&harness.remote);

    tokio::time::timeout(Duration::from_secs(5), async {
        while remote.count(&Call::ModCheck) == 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("no forced mod check");

    let stats = harness.stop().await;
    assert!(stats.mod_checks >= 1);
}

#[tokio::test]
async fn startup_notice_goes_to_the_activity_log() {
    let dir = TempDir::new().unwrap();
    let mut harness = Harness::start(dir.path(), None);

    let event = tokio::time::timeout(Duration::from_secs(5), harness.events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.text, "**PZ Watchdog started.**");
    assert_eq!(event.route, Route::Log);
    harness.stop().await;
}

#[tokio::test]
async fn cancel_stops_the_loop() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::start(dir.path(), None);

    let stats = tokio::time::timeout(Duration::from_secs(5), harness.stop())
        .await
        .expect("watchdog did not stop");
    assert_eq!(stats, WatchdogStats::default());
}
