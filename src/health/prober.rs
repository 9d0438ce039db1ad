//! Reachability classification and convergence waits.
//!
//! The RCON protocol has no push notifications, so convergence is
//! observed by polling the status command at a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::rcon::markers::{ONLINE_MARKER, REFUSED_MARKER};
use crate::rcon::{RconError, RemoteControl};

/// Result of a single status probe. Never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reachability {
    Online,
    Offline,
    Unknown,
}

/// How replies that are neither clearly online nor clearly offline are
/// classified: unexpected text, login failures, protocol faults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmbiguousPolicy {
    /// Anything not confirmed online counts as offline.
    ///
    /// A transient fault while waiting for shutdown then reads as an
    /// early success.
    #[default]
    Offline,
    /// Report [`Reachability::Unknown`]; the waits keep polling on it.
    Unknown,
}

impl AmbiguousPolicy {
    fn resolve(self) -> Reachability {
        match self {
            Self::Offline => Reachability::Offline,
            Self::Unknown => Reachability::Unknown,
        }
    }
}

/// Classify one status reply.
///
/// Connectivity faults are always [`Reachability::Offline`].
#[must_use]
pub fn classify_reply(reply: &Result<String, RconError>, policy: AmbiguousPolicy) -> Reachability {
    match reply {
        Ok(text) if text.contains(ONLINE_MARKER) => Reachability::Online,
        Ok(text) if text.contains(REFUSED_MARKER) => Reachability::Offline,
        Err(e) if e.is_connectivity() => Reachability::Offline,
        _ => policy.resolve(),
    }
}

/// Turns status replies into [`Reachability`] and waits for transitions.
#[derive(Debug)]
pub struct HealthProber<R: ?Sized> {
    remote: Arc<R>,
    policy: AmbiguousPolicy,
}

impl<R: ?Sized> Clone for HealthProber<R> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
            policy: self.policy,
        }
    }
}

impl<R: RemoteControl + ?Sized> HealthProber<R> {
    #[must_use]
    pub fn new(remote: Arc<R>) -> Self {
        Self {
            remote,
            policy: AmbiguousPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: AmbiguousPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn policy(&self) -> AmbiguousPolicy {
        self.policy
    }

    /// Probe the server once.
    pub async fn classify(&self) -> Reachability {
        let reply = self.remote.query_status().await;
        match &reply {
            Ok(text) => tracing::debug!(response = ?text, "Status probe reply"),
            Err(e) => tracing::debug!(error = %e, "Status probe failed"),
        }
        classify_reply(&reply, self.policy)
    }

    /// Poll every `interval` until the server reports offline.
    ///
    /// Returns `false` once `timeout` has elapsed without that happening.
    pub async fn wait_until_offline(&self, timeout: Duration, interval: Duration) -> bool {
        self.wait_for(Reachability::Offline, timeout, interval).await
    }

    /// Poll every `interval` until the server reports online.
    ///
    /// Returns `false` once `timeout` has elapsed without that happening.
    pub async fn wait_until_online(&self, timeout: Duration, interval: Duration) -> bool {
        self.wait_for(Reachability::Online, timeout, interval).await
    }

    async fn wait_for(&self, target: Reachability, timeout: Duration, interval: Duration) -> bool {
        let started = Instant::now();
        let mut polls = 0u32;
        while started.elapsed() < timeout {
            polls += 1;
            let state = self.classify().await;
            if state == target {
                tracing::debug!(?target, polls, "Reachability reached");
                return true;
            }
            tracing::trace!(?target, ?state, polls, "Still waiting");
            tokio::time::sleep(interval).await;
        }
        tracing::debug!(?target, polls, ?timeout, "Reachability wait timed out");
        false
    }
}
