//! Notification events and the non-blocking delivery queue.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Which channels an event is delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The activity log channel only.
    Log,
    /// The activity log channel and the primary server channel.
    Primary,
}

/// A human-readable status message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub text: String,
    pub route: Route,
}

/// Errors from notification delivery.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP client setup failed: {0}")]
    Client(String),
    #[error("Webhook request failed: {0}")]
    RequestFailed(String),
    #[error("Webhook rejected message, status={status}, resp={body}")]
    Rejected { status: u16, body: String },
}

/// A notification sink.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one event.
    async fn deliver(&self, event: &NotificationEvent) -> Result<(), NotifyError>;
}

/// Cheap, cloneable handle for queueing notifications.
///
/// Sending never waits on delivery.
#[derive(Debug, Clone)]
pub struct NotificationSender {
    tx: Option<mpsc::UnboundedSender<NotificationEvent>>,
}

impl NotificationSender {
    /// A sender that drops every event.
    #[must_use]
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// A sender paired with the receiving end of its queue.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<NotificationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Start a background task delivering queued events to `notifier`.
    ///
    /// The task ends once every sender clone is dropped.
    #[must_use]
    pub fn spawn<N>(notifier: N) -> (Self, JoinHandle<()>)
    where
        N: Notifier + 'static,
    {
        let (sender, mut rx) = Self::channel();
        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = notifier.deliver(&event).await {
                    tracing::warn!(error = %e, text = %event.text, "Notification delivery failed");
                }
            }
            tracing::debug!("Notification queue closed");
        });
        (sender, handle)
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    pub fn send(&self, text: impl Into<String>, route: Route) {
        let Some(tx) = &self.tx else {
            return;
        };
        let event = NotificationEvent {
            text: text.into(),
            route,
        };
        if tx.send(event).is_err() {
            tracing::debug!("Notification queue closed, dropping event");
        }
    }

    /// Queue an event for the log channel.
    pub fn log(&self, text: impl Into<String>) {
        self.send(text, Route::Log);
    }

    /// Queue an event for the log and primary channels.
    pub fn primary(&self, text: impl Into<String>) {
        self.send(text, Route::Primary);
    }
}
