//! Error type for session operations.

use thiserror::Error;

use crate::config::ConfigError;
use crate::gateway::GatewayError;
use crate::storage::StorageError;

/// Errors surfaced by [`SessionStore`](crate::store::SessionStore) operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The identity authority rejected the request. The message is
    /// user-facing and passed through verbatim.
    #[error("{0}")]
    Denied(String),

    /// A newer session change started before this operation committed.
    /// The later change wins and this one is discarded.
    #[error("operation superseded by a newer session change")]
    Superseded,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denied_displays_message_verbatim() {
        let err = SessionError::Denied("Invalid email or password".to_string());
        assert_eq!(err.to_string(), "Invalid email or password");
    }

    #[test]
    fn test_superseded_display() {
        assert_eq!(
            SessionError::Superseded.to_string(),
            "operation superseded by a newer session change"
        );
    }
}
