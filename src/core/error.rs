//! Core error types

use thiserror::Error;

use crate::permissions::PermissionRequest;

/// Errors that can occur in the execution core
#[derive(Error, Debug)]
pub enum CoreError {
    /// Command string could not be parsed; nothing was executed
    #[error("Failed to parse command: {0}")]
    Parse(String),

    /// An explicit deny rule matched the command
    #[error("The user has specifically restricted access to this command: \"{command}\", you are not allowed to execute it. The user has these settings configured: {rules}")]
    PermissionDenied {
        /// The offending simple command
        command: String,
        /// Serialized effective rule set, so the caller can explain the block
        rules: String,
    },

    /// The user declined an interactive approval request
    #[error("Permission request rejected: {request}")]
    PermissionRejected {
        /// The original request, for explaining why the action did not proceed
        request: PermissionRequest,
    },

    /// A path escapes the project root under a deny policy
    #[error("This command references paths outside of the project root ({path}) so this command is not allowed to be executed")]
    ExternalDirectory {
        /// The escaping path
        path: String,
        /// The command that referenced it
        command: String,
    },

    /// Delegation target does not resolve to any agent profile
    #[error("Unknown agent type: {0} is not a valid agent type")]
    UnknownAgent(String),

    /// A delegated child prompt errored; never retried automatically
    #[error("Subagent session failed: {0}")]
    ChildSession(String),

    /// Session not found
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The approval responder went away while a request was pending
    #[error("Approval responder unavailable")]
    ApprovalUnavailable,

    /// The call was interrupted
    #[error("Interrupted")]
    Interrupted,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        CoreError::Other(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        CoreError::Parse(msg.into())
    }
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::SessionNotFound("abc123".into());
        assert_eq!(err.to_string(), "Session not found: abc123");

        let err = CoreError::UnknownAgent("ghost".into());
        assert_eq!(
            err.to_string(),
            "Unknown agent type: ghost is not a valid agent type"
        );
    }

    #[test]
    fn test_denied_includes_rules() {
        let err = CoreError::PermissionDenied {
            command: "rm -rf build".into(),
            rules: r#"{"*":"deny"}"#.into(),
        };
        let text = err.to_string();
        assert!(text.contains("rm -rf build"));
        assert!(text.contains(r#"{"*":"deny"}"#));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let core_err: CoreError = io_err.into();
        assert!(matches!(core_err, CoreError::Io(_)));
    }
}
