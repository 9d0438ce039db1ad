//! The watchdog main loop.
//!
//! Tails the server log, runs the restart sequence when a trigger line
//! shows up, and forces mod checks on idle ticks when no external
//! scheduler does it.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::notify::NotificationSender;
use crate::rcon::RemoteControl;
use crate::restart::{is_trigger_line, RestartError, RestartOrchestrator, RestartOutcome};
use crate::watcher::{LogTailer, TailEvent};

/// Counters kept across the life of a [`Watchdog`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchdogStats {
    /// Trigger lines seen.
    pub triggers: u32,
    /// Restart sequences that ran to the end.
    pub restarts_completed: u32,
    /// Restart sequences that ended early.
    pub restarts_aborted: u32,
    /// Forced mod checks sent.
    pub mod_checks: u32,
}

/// Cooperative loop wiring the log tailer to the restart orchestrator.
pub struct Watchdog<R: ?Sized> {
    tailer: LogTailer,
    remote: Arc<R>,
    orchestrator: RestartOrchestrator<R>,
    notify: NotificationSender,
    forced_check: Option<Duration>,
    last_forced_check: Instant,
    stats: WatchdogStats,
}

impl<R: RemoteControl + ?Sized> Watchdog<R> {
    #[must_use]
    pub fn new(
        tailer: LogTailer,
        remote: Arc<R>,
        orchestrator: RestartOrchestrator<R>,
        notify: NotificationSender,
    ) -> Self {
        Self {
            tailer,
            remote,
            orchestrator,
            notify,
            forced_check: None,
            last_forced_check: Instant::now(),
            stats: WatchdogStats::default(),
        }
    }

    /// Force a mod check every `interval` of idle time. `None` disables it.
    #[must_use]
    pub fn with_forced_check(mut self, interval: Option<Duration>) -> Self {
        self.forced_check = interval;
        self
    }

    #[must_use]
    pub fn orchestrator(&self) -> &RestartOrchestrator<R> {
        &self.orchestrator
    }

    #[must_use]
    pub fn stats(&self) -> WatchdogStats {
        self.stats
    }

    /// Run until `cancel` fires.
    ///
    /// Cancellation is checked between tail events. A restart sequence that
    /// is already running finishes first.
    pub async fn run(&mut self, cancel: &CancellationToken) -> WatchdogStats {
        tracing::info!(forced_check = ?self.forced_check, "Watchdog running");
        self.notify.log("**PZ Watchdog started.**");
        self.last_forced_check = Instant::now();

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    tracing::info!("Watchdog stopped");
                    return self.stats;
                }
                event = self.tailer.next_event() => {
                    self.handle_event(event).await;
                }
            }
        }
    }

    /// React to one tail event.
    pub async fn handle_event(&mut self, event: TailEvent) {
        match event {
            TailEvent::Line(line) => {
                if is_trigger_line(&line) {
                    self.on_trigger().await;
                }
            }
            TailEvent::Following(path) => {
                tracing::info!(path = %path.display(), "Monitoring log file");
                self.notify
                    .log(format!("Monitoring log file: `{}`", path.display()));
            }
            TailEvent::Rotated { from, to } => {
                tracing::info!(from = %from.display(), to = %to.display(), "New log file detected");
                self.notify.log(format!(
                    "New log file detected: `{}`. Switching to monitor it.",
                    to.display()
                ));
            }
            TailEvent::NoLogFile => {
                tracing::warn!("No log file found");
                self.notify.log("No log file found, retrying in 10s...");
            }
            TailEvent::Idle => self.maybe_force_mod_check().await,
        }
    }

    async fn on_trigger(&mut self) {
        self.stats.triggers += 1;
        tracing::info!("Mod update detected in log");
        self.notify
            .log("**Mods updated detected in log!** Proceeding with restart.");

        let outcome = match AssertUnwindSafe(self.orchestrator.handle_trigger())
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(error = %message, "Restart sequence panicked");
                self.notify
                    .primary(format!("**Error in restart procedure:** {message}"));
                RestartOutcome::Aborted(RestartError::Panicked(message))
            }
        };

        let message = match outcome {
            RestartOutcome::Completed(report) => {
                self.stats.restarts_completed += 1;
                tracing::info!(
                    session = %report.session_id,
                    warnings = report.warnings_sent,
                    final_players = report.final_players,
                    shutdown_sent = report.shutdown_sent,
                    went_offline = report.went_offline,
                    came_online = report.came_online,
                    "Restart completed"
                );
                "Restart completed, searching for a new log file."
            }
            RestartOutcome::Ignored => return,
            RestartOutcome::Aborted(e) => {
                self.stats.restarts_aborted += 1;
                tracing::warn!(error = %e, "Restart did not complete");
                "Restart aborted, searching for a new log file."
            }
        };

        self.notify.log(message);
        // Lines queued before the restart would re-trigger it.
        self.tailer.release();
        self.last_forced_check = Instant::now();
    }

    async fn maybe_force_mod_check(&mut self) {
        let Some(interval) = self.forced_check else {
            return;
        };
        if self.last_forced_check.elapsed() < interval {
            return;
        }
        self.last_forced_check = Instant::now();
        self.stats.mod_checks += 1;

        tracing::info!("Forcing mod update check");
        if let Err(e) = self.remote.force_mod_check().await {
            tracing::warn!(error = %e, "Forced mod check failed");
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
