//! PZ Watchdog - unattended mod-update restarts for Project Zomboid.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use url::Url;

use pz_watchdog::config::{ConfigLoader, WatchConfig};
use pz_watchdog::daemon::Watchdog;
use pz_watchdog::logging::init_tracing;
use pz_watchdog::notify::{DiscordWebhook, NotificationSender};
use pz_watchdog::rcon::markers::MARKER_SET_VERSION;
use pz_watchdog::rcon::{RconSession, RemoteControl};
use pz_watchdog::restart::RestartOrchestrator;
use pz_watchdog::watcher::LogTailer;

#[derive(Parser)]
#[command(
    name = "pz-watchdog",
    about = "Restarts a Project Zomboid server over RCON when mods need an update",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (default: search ./pz-watchdog.toml, then the user config dir).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// RCON host.
    #[arg(long)]
    host: Option<String>,

    /// RCON port.
    #[arg(long)]
    port: Option<u16>,

    /// RCON password.
    #[arg(long)]
    password: Option<String>,

    /// Countdown before restart, in minutes.
    #[arg(long)]
    cooldown: Option<u32>,

    /// Mod checks are triggered by an external scheduler.
    #[arg(long, conflicts_with = "poll_interval")]
    external_scheduler: bool,

    /// Force a mod check every N minutes.
    #[arg(long, value_name = "MINUTES")]
    poll_interval: Option<u64>,

    /// Directory holding the server logs.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// File name glob of the server log.
    #[arg(long)]
    pattern: Option<String>,

    /// Discord webhook for server status messages.
    #[arg(long)]
    webhook: Option<Url>,

    /// Discord webhook for the activity log.
    #[arg(long)]
    log_webhook: Option<Url>,
}

impl Cli {
    fn apply(self, config: &mut WatchConfig) {
        if let Some(host) = self.host {
            config.rcon.host = host;
        }
        if let Some(port) = self.port {
            config.rcon.port = port;
        }
        if let Some(password) = self.password {
            config.rcon.password = password;
        }
        if let Some(cooldown) = self.cooldown {
            config.restart.cooldown_minutes = cooldown;
        }
        if self.external_scheduler {
            config.mod_check.external_scheduler = true;
        }
        if let Some(minutes) = self.poll_interval {
            config.mod_check.external_scheduler = false;
            config.mod_check.poll_interval_minutes = minutes;
        }
        if let Some(dir) = self.log_dir {
            config.logs.dir = dir;
        }
        if let Some(pattern) = self.pattern {
            config.logs.pattern = pattern;
        }
        if self.webhook.is_some() {
            config.discord.webhook_url = self.webhook;
        }
        if self.log_webhook.is_some() {
            config.discord.log_webhook_url = self.log_webhook;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbosity = cli.verbose;

    let loader = cli
        .config
        .clone()
        .map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let mut config = match loader.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(2);
        }
    };
    cli.apply(&mut config);
    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        return ExitCode::from(2);
    }

    let activity_log = match init_tracing(verbosity, &config.logs.activity_dir) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let notify = if config.discord.is_enabled() {
        match DiscordWebhook::from_config(&config.discord) {
            Ok(webhook) => NotificationSender::spawn(webhook).0,
            Err(e) => {
                tracing::warn!(error = %e, "Discord notifications disabled");
                NotificationSender::disabled()
            }
        }
    } else {
        NotificationSender::disabled()
    };

    let tailer = match LogTailer::from_config(&config.logs) {
        Ok(tailer) => tailer,
        Err(e) => {
            tracing::error!(error = %e, "Cannot watch server logs");
            return ExitCode::from(2);
        }
    };

    let session = RconSession::from_config(&config.rcon);
    tracing::info!(
        rcon = session.address(),
        cooldown = config.restart.cooldown_minutes,
        log_dir = %config.logs.dir.display(),
        activity_log = %activity_log.display(),
        markers = MARKER_SET_VERSION,
        "PZ Watchdog started"
    );

    let remote: Arc<dyn RemoteControl> = Arc::new(session);
    let orchestrator =
        RestartOrchestrator::from_config(Arc::clone(&remote), notify.clone(), &config.restart);
    let mut watchdog = Watchdog::new(tailer, remote, orchestrator, notify)
        .with_forced_check(config.mod_check.forced_interval());

    let cancel = CancellationToken::new();
    tokio::select! {
        stats = watchdog.run(&cancel) => {
            tracing::info!(?stats, "Watchdog exited");
        }
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Cannot listen for Ctrl-C");
            }
            tracing::info!("Ctrl-C received, shutting down");
            cancel.cancel();
        }
    }

    ExitCode::SUCCESS
}
