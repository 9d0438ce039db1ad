//! Restart session state machine.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Phase of the restart sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestartPhase {
    #[default]
    Idle,
    WarningCountdown,
    FinalCountdown,
    ShutdownRequested,
    AwaitingOffline,
    AwaitingOnline,
}

impl fmt::Display for RestartPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::WarningCountdown => "warning countdown",
            Self::FinalCountdown => "final countdown",
            Self::ShutdownRequested => "shutdown requested",
            Self::AwaitingOffline => "awaiting offline",
            Self::AwaitingOnline => "awaiting online",
        };
        f.write_str(name)
    }
}

/// One armed restart, from trigger to confirmation.
#[derive(Debug, Clone)]
pub struct RestartSession {
    id: Uuid,
    minutes_remaining: u32,
    players: u32,
    phase: RestartPhase,
}

impl RestartSession {
    #[must_use]
    pub fn new(cooldown_minutes: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            minutes_remaining: cooldown_minutes,
            players: 0,
            phase: RestartPhase::Idle,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn minutes_remaining(&self) -> u32 {
        self.minutes_remaining
    }

    #[must_use]
    pub fn players(&self) -> u32 {
        self.players
    }

    #[must_use]
    pub fn phase(&self) -> RestartPhase {
        self.phase
    }

    pub fn set_players(&mut self, players: u32) {
        self.players = players;
    }

    /// Count down one minute. Stops at zero.
    pub fn tick(&mut self) {
        self.minutes_remaining = self.minutes_remaining.saturating_sub(1);
    }

    pub fn transition(&mut self, phase: RestartPhase) {
        tracing::debug!(session = %self.id, from = %self.phase, to = %phase, "Restart phase transition");
        self.phase = phase;
    }
}

/// Delays and timeouts of the restart sequence, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartTiming {
    /// Spacing of the per-minute warnings.
    pub countdown_tick_secs: u64,
    /// Length of the final warning before quit.
    pub final_warning_secs: u64,
    /// How long to wait for the server to go down.
    pub offline_timeout_secs: u64,
    /// How long to wait for the server to come back.
    pub online_timeout_secs: u64,
    /// Status polling interval during both waits.
    pub poll_interval_secs: u64,
}

impl Default for RestartTiming {
    fn default() -> Self {
        Self {
            countdown_tick_secs: 60,
            final_warning_secs: 10,
            offline_timeout_secs: 180,
            online_timeout_secs: 300,
            poll_interval_secs: 5,
        }
    }
}

impl RestartTiming {
    #[must_use]
    pub fn countdown_tick(&self) -> Duration {
        Duration::from_secs(self.countdown_tick_secs)
    }

    #[must_use]
    pub fn final_warning(&self) -> Duration {
        Duration::from_secs(self.final_warning_secs)
    }

    #[must_use]
    pub fn offline_timeout(&self) -> Duration {
        Duration::from_secs(self.offline_timeout_secs)
    }

    #[must_use]
    pub fn online_timeout(&self) -> Duration {
        Duration::from_secs(self.online_timeout_secs)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
