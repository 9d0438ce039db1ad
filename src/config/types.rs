//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::health::AmbiguousPolicy;
use crate::restart::RestartTiming;

/// Complete watchdog configuration, loaded once at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Remote administration connection.
    pub rcon: RconConfig,
    /// Restart sequence settings.
    pub restart: RestartConfig,
    /// Server log directory settings.
    pub logs: LogsConfig,
    /// Mod-update check scheduling.
    pub mod_check: ModCheckConfig,
    /// Discord notification webhooks.
    pub discord: DiscordConfig,
}

/// RCON connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RconConfig {
    /// Server host name or IP address.
    pub host: String,
    /// RCON port.
    pub port: u16,
    /// Shared RCON secret. Must not be empty.
    pub password: String,
    /// Upper bound for a single connect + command exchange.
    pub timeout_secs: u64,
}

impl RconConfig {
    /// Returns `host:port`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the exchange timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RconConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 27015,
            password: String::new(),
            timeout_secs: 5,
        }
    }
}

/// Restart sequence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartConfig {
    /// Player-facing warning period in whole minutes.
    pub cooldown_minutes: u32,
    /// How ambiguous status replies are classified.
    pub ambiguous: AmbiguousPolicy,
    /// Delays and timeouts of the sequence.
    pub timing: RestartTiming,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            cooldown_minutes: 5,
            ambiguous: AmbiguousPolicy::default(),
            timing: RestartTiming::default(),
        }
    }
}

/// Where the game server writes its logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsConfig {
    /// Directory scanned for server logs.
    pub dir: PathBuf,
    /// Filename glob, matched against file names only.
    pub pattern: String,
    /// How long the tailer waits for a new line before reporting idle.
    pub idle_millis: u64,
    /// Delay between selection attempts while no log file matches.
    pub empty_retry_secs: u64,
    /// Directory receiving the watchdog's own activity log.
    pub activity_dir: PathBuf,
}

impl LogsConfig {
    #[must_use]
    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_millis)
    }

    #[must_use]
    pub fn empty_retry(&self) -> Duration {
        Duration::from_secs(self.empty_retry_secs)
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("Logs"),
            pattern: "*_DebugLog-server.txt".to_string(),
            idle_millis: 1000,
            empty_retry_secs: 10,
            activity_dir: PathBuf::from("Logs").join("PZWatchdogLogs"),
        }
    }
}

/// Mod-update check scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModCheckConfig {
    /// An external scheduler (e.g. AMP) already triggers mod checks.
    pub external_scheduler: bool,
    /// Minutes between forced checks when not externally scheduled.
    pub poll_interval_minutes: u64,
}

impl ModCheckConfig {
    /// Returns the forced-check interval, or `None` when checks are external.
    #[must_use]
    pub fn forced_interval(&self) -> Option<Duration> {
        if self.external_scheduler {
            None
        } else {
            Some(Duration::from_secs(self.poll_interval_minutes.saturating_mul(60)))
        }
    }
}

impl Default for ModCheckConfig {
    fn default() -> Self {
        Self {
            external_scheduler: true,
            poll_interval_minutes: 10,
        }
    }
}

/// Discord webhook targets. Notifications are disabled when both are unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Server status channel; receives primary-routed events only.
    pub webhook_url: Option<Url>,
    /// Log channel; receives every event.
    pub log_webhook_url: Option<Url>,
}

impl DiscordConfig {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some() || self.log_webhook_url.is_some()
    }
}
