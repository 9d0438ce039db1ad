//! Player-aware restart sequence.
//!
//! ```text
//! IDLE -> WARNING_COUNTDOWN -> FINAL_COUNTDOWN -> SHUTDOWN_REQUESTED
//!      -> AWAITING_OFFLINE -> AWAITING_ONLINE -> IDLE
//! ```
//!
//! The warning countdown only runs while players are online. Shutdown and
//! the confirmation waits are best-effort: their failures are reported
//! and the sequence carries on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use uuid::Uuid;

use crate::config::RestartConfig;
use crate::health::{AmbiguousPolicy, HealthProber};
use crate::notify::NotificationSender;
use crate::rcon::{escape_broadcast, parse_player_count, RconError, RemoteControl};

use super::state::{RestartPhase, RestartSession, RestartTiming};

/// Errors that end a restart sequence early.
#[derive(thiserror::Error, Debug)]
pub enum RestartError {
    /// The server could not be reached for the initial player count.
    #[error("Cannot read player count: {0}")]
    StatusUnavailable(#[source] RconError),

    /// The sequence panicked.
    #[error("Restart sequence panicked: {0}")]
    Panicked(String),
}

/// Summary of a finished restart sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartReport {
    pub session_id: Uuid,
    /// Per-minute warnings broadcast.
    pub warnings_sent: u32,
    /// Player count at the last query before shutdown.
    pub final_players: u32,
    /// The quit command was accepted.
    pub shutdown_sent: bool,
    /// The server was seen offline before the timeout.
    pub went_offline: bool,
    /// The server was seen online again before the timeout.
    pub came_online: bool,
}

/// What [`RestartOrchestrator::handle_trigger`] did.
#[derive(Debug)]
pub enum RestartOutcome {
    Completed(RestartReport),
    /// Another sequence was already running.
    Ignored,
    Aborted(RestartError),
}

/// Runs the restart sequence, at most one at a time.
pub struct RestartOrchestrator<R: ?Sized> {
    remote: Arc<R>,
    prober: HealthProber<R>,
    notify: NotificationSender,
    cooldown_minutes: u32,
    timing: RestartTiming,
    active: AtomicBool,
    phase: watch::Sender<RestartPhase>,
}

/// Clears the active flag and resets the phase when the sequence ends,
/// including by panic.
struct ActiveGuard<'a> {
    active: &'a AtomicBool,
    phase: &'a watch::Sender<RestartPhase>,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.phase.send_replace(RestartPhase::Idle);
        self.active.store(false, Ordering::Release);
    }
}

impl<R: RemoteControl + ?Sized> RestartOrchestrator<R> {
    #[must_use]
    pub fn new(remote: Arc<R>, notify: NotificationSender) -> Self {
        let defaults = RestartConfig::default();
        Self {
            prober: HealthProber::new(Arc::clone(&remote)),
            remote,
            notify,
            cooldown_minutes: defaults.cooldown_minutes,
            timing: defaults.timing,
            active: AtomicBool::new(false),
            phase: watch::Sender::new(RestartPhase::Idle),
        }
    }

    #[must_use]
    pub fn from_config(remote: Arc<R>, notify: NotificationSender, config: &RestartConfig) -> Self {
        Self::new(remote, notify)
            .with_cooldown(config.cooldown_minutes)
            .with_timing(config.timing)
            .with_ambiguous_policy(config.ambiguous)
    }

    #[must_use]
    pub fn with_cooldown(mut self, minutes: u32) -> Self {
        self.cooldown_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_timing(mut self, timing: RestartTiming) -> Self {
        self.timing = timing;
        self
    }

    #[must_use]
    pub fn with_ambiguous_policy(mut self, policy: AmbiguousPolicy) -> Self {
        self.prober = self.prober.with_policy(policy);
        self
    }

    #[must_use]
    pub fn phase(&self) -> RestartPhase {
        *self.phase.borrow()
    }

    /// Watch phase changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RestartPhase> {
        self.phase.subscribe()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Run the full restart sequence unless one is already running.
    ///
    /// Never fails: faults end the sequence early, are logged and
    /// notified, and come back as [`RestartOutcome::Aborted`].
    pub async fn handle_trigger(&self) -> RestartOutcome {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("Restart already in progress, ignoring trigger");
            return RestartOutcome::Ignored;
        }
        let _guard = ActiveGuard {
            active: &self.active,
            phase: &self.phase,
        };

        let mut session = RestartSession::new(self.cooldown_minutes);
        match self.run_sequence(&mut session).await {
            Ok(report) => {
                tracing::info!(
                    session = %report.session_id,
                    warnings = report.warnings_sent,
                    shutdown_sent = report.shutdown_sent,
                    went_offline = report.went_offline,
                    came_online = report.came_online,
                    "Restart sequence finished"
                );
                RestartOutcome::Completed(report)
            }
            Err(e) => {
                tracing::error!(session = %session.id(), phase = %session.phase(), error = %e, "Restart sequence aborted");
                self.notify
                    .primary(format!("**Error in restart procedure:** {e}"));
                RestartOutcome::Aborted(e)
            }
        }
    }

    async fn run_sequence(&self, session: &mut RestartSession) -> Result<RestartReport, RestartError> {
        let mut report = RestartReport {
            session_id: session.id(),
            warnings_sent: 0,
            final_players: 0,
            shutdown_sent: false,
            went_offline: false,
            came_online: false,
        };

        tracing::info!(session = %session.id(), cooldown = self.cooldown_minutes, "Mod update found. Starting restart procedure");
        self.notify.primary(format!(
            "**Mod update detected!** Starting restart procedure in: {}",
            minutes(self.cooldown_minutes)
        ));

        let players = match self.player_count().await {
            Ok(players) => players,
            Err(e) if e.is_connectivity() => return Err(RestartError::StatusUnavailable(e)),
            Err(e) => {
                tracing::warn!(error = %e, "Player count unreadable, assuming nobody is online");
                self.notify
                    .log(format!("Player count unreadable ({e}), assuming 0."));
                0
            }
        };
        self.record_players(session, players);

        if session.players() > 0 && session.minutes_remaining() > 0 {
            self.enter(session, RestartPhase::WarningCountdown);
            while session.minutes_remaining() > 0 {
                let message = format!("RESTART in {}!", minutes(session.minutes_remaining()));
                self.announce(&message).await;
                report.warnings_sent += 1;
                self.notify.log(message);
                tracing::info!(minutes = session.minutes_remaining(), "Countdown warning");

                tokio::time::sleep(self.timing.countdown_tick()).await;

                match self.player_count().await {
                    Ok(players) => self.record_players(session, players),
                    Err(e) => tracing::warn!(
                        error = %e,
                        players = session.players(),
                        "Player count unavailable, keeping previous value"
                    ),
                }
                if session.players() == 0 {
                    tracing::info!("No players online, skipping countdown and restarting immediately");
                    self.notify.log("No players online, restarting immediately.");
                    break;
                }
                session.tick();
            }
        }
        report.final_players = session.players();

        self.enter(session, RestartPhase::FinalCountdown);
        let final_message = format!("RESTART in {} seconds!", self.timing.final_warning_secs);
        self.announce(&final_message).await;
        self.notify.log(format!("**{final_message}**"));
        tokio::time::sleep(self.timing.final_warning()).await;

        self.enter(session, RestartPhase::ShutdownRequested);
        tracing::info!("Sending quit command, the server manager handles the restart");
        self.notify
            .log("Sending 'quit' command via RCON. Waiting for the restart...");
        match self.remote.request_shutdown().await {
            Ok(()) => report.shutdown_sent = true,
            Err(e) => {
                tracing::error!(error = %e, "Quit command failed");
                self.notify.primary(format!("**Quit command failed:** {e}"));
            }
        }

        self.enter(session, RestartPhase::AwaitingOffline);
        self.notify.log("Waiting for the server to shut down...");
        report.went_offline = self
            .prober
            .wait_until_offline(self.timing.offline_timeout(), self.timing.poll_interval())
            .await;
        if report.went_offline {
            tracing::info!("Server offline confirmed");
            self.notify.primary("**Server offline confirmed.**");
        } else {
            let secs = self.timing.offline_timeout_secs;
            tracing::warn!(timeout_secs = secs, "Server did not go offline in time");
            self.notify.log(format!(
                "**WARNING:** the server did not shut down within {secs}s."
            ));
        }

        self.enter(session, RestartPhase::AwaitingOnline);
        self.notify
            .log("Waiting for the server to come back online...");
        report.came_online = self
            .prober
            .wait_until_online(self.timing.online_timeout(), self.timing.poll_interval())
            .await;
        if report.came_online {
            tracing::info!("Server online detected");
            self.notify.primary("**Server back online!**");
        } else {
            let secs = self.timing.online_timeout_secs;
            tracing::warn!(timeout_secs = secs, "Server did not come back online in time");
            self.notify.log(format!(
                "**WARNING:** the server did not come back online within {secs}s."
            ));
        }

        self.enter(session, RestartPhase::Idle);
        Ok(report)
    }

    fn enter(&self, session: &mut RestartSession, phase: RestartPhase) {
        session.transition(phase);
        self.phase.send_replace(phase);
    }

    fn record_players(&self, session: &mut RestartSession, players: u32) {
        session.set_players(players);
        tracing::info!(players, "Players online");
        self.notify.log(format!("Players online: {players}"));
    }

    async fn player_count(&self) -> Result<u32, RconError> {
        let status = self.remote.query_status().await?;
        Ok(parse_player_count(&status))
    }

    async fn announce(&self, message: &str) {
        if let Err(e) = self.remote.broadcast(&escape_broadcast(message)).await {
            tracing::warn!(error = %e, message, "Broadcast failed");
        }
    }
}

/// "1 minute", "5 minutes".
fn minutes(n: u32) -> String {
    if n == 1 {
        "1 minute".to_string()
    } else {
        format!("{n} minutes")
    }
}
