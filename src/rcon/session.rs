//! Remote control operations used by the watchdog.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::RconConfig;

use super::client::RconClient;
use super::error::RconError;
use super::markers::{BROADCAST_COMMAND, MOD_CHECK_COMMAND, QUIT_COMMAND, STATUS_COMMAND};

/// The narrow set of remote administration commands the watchdog needs.
///
/// Each call is independently fallible and reports failure as a value.
#[async_trait]
pub trait RemoteControl: Send + Sync {
    /// Issue the player-list query and return the raw reply.
    async fn query_status(&self) -> Result<String, RconError>;

    /// Announce `message` to every player.
    ///
    /// The message is sent inside quotes exactly as given; callers escape
    /// it with [`escape_broadcast`](super::escape_broadcast) first.
    async fn broadcast(&self, message: &str) -> Result<(), RconError>;

    /// Ask the server to save and quit. Does not wait for the exit.
    async fn request_shutdown(&self) -> Result<(), RconError>;

    /// Ask the server to check for mod updates now.
    async fn force_mod_check(&self) -> Result<(), RconError>;
}

/// [`RemoteControl`] over Source RCON, one connection per call.
#[derive(Clone)]
pub struct RconSession {
    address: String,
    password: String,
    timeout: Duration,
}

impl RconSession {
    #[must_use]
    pub fn new(address: impl Into<String>, password: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            password: password.into(),
            timeout,
        }
    }

    #[must_use]
    pub fn from_config(config: &RconConfig) -> Self {
        Self::new(config.address(), config.password.clone(), config.timeout())
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Connect, log in and run `command`, all within one timeout.
    async fn run(&self, command: &str) -> Result<String, RconError> {
        let exchange = async {
            let mut client =
                RconClient::connect(&self.address, &self.password, self.timeout).await?;
            client.exec(command).await
        };
        let reply = tokio::time::timeout(self.timeout, exchange)
            .await
            .unwrap_or(Err(RconError::Timeout(self.timeout)));
        match &reply {
            Ok(text) => tracing::debug!(command, response = ?text, "RCON reply"),
            Err(e) => tracing::debug!(command, error = %e, "RCON command failed"),
        }
        reply
    }
}

impl fmt::Debug for RconSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RconSession")
            .field("address", &self.address)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl RemoteControl for RconSession {
    async fn query_status(&self) -> Result<String, RconError> {
        self.run(STATUS_COMMAND).await
    }

    async fn broadcast(&self, message: &str) -> Result<(), RconError> {
        self.run(&format!("{BROADCAST_COMMAND} \"{message}\""))
            .await
            .map(drop)
    }

    async fn request_shutdown(&self) -> Result<(), RconError> {
        // The server may drop the socket before answering a quit.
        match self.run(QUIT_COMMAND).await {
            Ok(_) | Err(RconError::ConnectionClosed) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn force_mod_check(&self) -> Result<(), RconError> {
        self.run(MOD_CHECK_COMMAND).await.map(drop)
    }
}
