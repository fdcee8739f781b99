use thiserror::Error;

/// Errors that can occur while delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The transport failed (connection refused, 5xx, DNS, …). Retryable.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The endpoint rejected the payload or recipient (4xx). Not retryable
    /// on its own; the monitor decides whether to retry or suppress.
    #[error("Rejected by endpoint: {0}")]
    Rejected(String),

    /// The request exceeded its time budget. Retryable.
    #[error("Delivery timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The adapter's configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl NotifyError {
    /// True when retrying the same payload can never succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(self, NotifyError::Rejected(_) | NotifyError::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_and_timeout_are_transient() {
        assert!(!NotifyError::Transport("refused".into()).is_permanent());
        assert!(!NotifyError::Timeout { ms: 10_000 }.is_permanent());
    }

    #[test]
    fn rejection_is_permanent() {
        assert!(NotifyError::Rejected("unknown recipient".into()).is_permanent());
        assert!(NotifyError::Config("no url".into()).is_permanent());
    }
}
