//! Notification channel contract.
//!
//! A channel posts a rendered [`Embed`] and hands back an opaque
//! [`NotificationHandle`], and later deletes the message behind that handle.
//! The Discord webhook implementation lives in [`crate::discord`].

use crate::format::Embed;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// NotificationHandle
// ---------------------------------------------------------------------------

/// Identifier of a delivered notification (a Discord message id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationHandle(String);

impl NotificationHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NotificationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ChannelError
// ---------------------------------------------------------------------------

/// Failure of a send or delete call. Always transient from the engine's
/// point of view: the store is left untouched and the call is retried on
/// the next cycle.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel request failed: {0}")]
    Http(String),

    #[error("channel returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("channel rate limited, retry after {retry_after:.1}s")]
    RateLimited { retry_after: f64 },

    #[error("unexpected channel response: {0}")]
    Response(String),
}

impl ChannelError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ChannelError::RateLimited { .. })
    }
}

impl From<reqwest::Error> for ChannelError {
    fn from(e: reqwest::Error) -> Self {
        ChannelError::Http(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// NotificationChannel
// ---------------------------------------------------------------------------

pub trait NotificationChannel {
    /// Deliver one notification and return its handle.
    fn send(&self, payload: &Embed) -> Result<NotificationHandle, ChannelError>;

    /// Retract a previously delivered notification.
    fn delete(&self, handle: &NotificationHandle) -> Result<(), ChannelError>;
}

impl<T: NotificationChannel + ?Sized> NotificationChannel for &T {
    fn send(&self, payload: &Embed) -> Result<NotificationHandle, ChannelError> {
        (**self).send(payload)
    }

    fn delete(&self, handle: &NotificationHandle) -> Result<(), ChannelError> {
        (**self).delete(handle)
    }
}
