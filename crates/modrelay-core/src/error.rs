use crate::channel::ChannelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("item already tracked: {0}")]
    DuplicateKey(String),

    #[error("item not tracked: {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("queue source error: {0}")]
    QueueSource(String),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("authorization failed: {0}")]
    Auth(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RelayError {
    /// Whether the poll loop may retry the cycle on the next interval.
    ///
    /// Store failures and contract violations (`NotFound`, `DuplicateKey`)
    /// are never transient: they mean the mapping can no longer be trusted.
    pub fn is_transient(&self) -> bool {
        matches!(self, RelayError::QueueSource(_) | RelayError::Channel(_))
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_and_channel_errors_are_transient() {
        assert!(RelayError::QueueSource("timeout".into()).is_transient());
        assert!(RelayError::Channel(ChannelError::Http("reset".into())).is_transient());
    }

    #[test]
    fn contract_violations_are_not_transient() {
        assert!(!RelayError::DuplicateKey("t1_a".into()).is_transient());
        assert!(!RelayError::NotFound("t1_a".into()).is_transient());
        assert!(!RelayError::Store("disk full".into()).is_transient());
        assert!(!RelayError::Auth("denied".into()).is_transient());
    }
}
