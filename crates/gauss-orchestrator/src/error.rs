//! Error types for the orchestrator crate.
//!
//! Errors fall into two classes. A [`OrchestratorError::Substrate`] error means
//! the control plane kept failing after the bounded retry and is fatal: callers
//! must stop the invocation immediately. Every other error is an ordinary
//! failure of the current workflow step.

use gauss_core::ValidationError;
use thiserror::Error;

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Errors that can occur during orchestration operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Input failed validation; nothing was attempted.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A resource does not exist.
    #[error("{kind} not found: {name}")]
    NotFound {
        /// Resource kind.
        kind: String,
        /// Resource name.
        name: String,
    },

    /// A resource already exists.
    #[error("{kind} already exists: {name}")]
    AlreadyExists {
        /// Resource kind.
        kind: String,
        /// Resource name.
        name: String,
    },

    /// The control plane failed with a non-not-found error on every attempt.
    #[error("control plane failed during {operation} after {attempts} attempts: {message}")]
    Substrate {
        /// The operation that failed.
        operation: String,
        /// Number of attempts made.
        attempts: u32,
        /// Last error reported by the control plane.
        message: String,
    },

    /// The target pod is not in the running phase.
    #[error("pod {pod} is not running")]
    TargetNotRunning {
        /// The pod name.
        pod: String,
    },

    /// A remote command ran but its output classified as failure.
    #[error("remote command failed on {member}: {reason}")]
    RemoteExec {
        /// The member the command ran on.
        member: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Timeout waiting for condition.
    #[error("timeout waiting for {condition} after {attempts} attempts")]
    Timeout {
        /// The condition that timed out.
        condition: String,
        /// Number of polls made.
        attempts: u32,
    },

    /// A database process is already live on the member.
    #[error("member {member} is already running")]
    AlreadyRunning {
        /// The member id.
        member: String,
    },

    /// Invalid state transition.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// The starting state.
        from: String,
        /// The target state.
        to: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrchestratorError {
    /// Creates a not found error.
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Creates an already exists error.
    pub fn already_exists(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Creates a fatal substrate error.
    pub fn substrate(operation: impl Into<String>, attempts: u32, message: impl Into<String>) -> Self {
        Self::Substrate {
            operation: operation.into(),
            attempts,
            message: message.into(),
        }
    }

    /// Creates a target not running error.
    pub fn target_not_running(pod: impl Into<String>) -> Self {
        Self::TargetNotRunning { pod: pod.into() }
    }

    /// Creates a remote exec error.
    pub fn remote_exec(member: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RemoteExec {
            member: member.into(),
            reason: reason.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(condition: impl Into<String>, attempts: u32) -> Self {
        Self::Timeout {
            condition: condition.into(),
            attempts,
        }
    }

    /// Creates an already running error.
    pub fn already_running(member: impl Into<String>) -> Self {
        Self::AlreadyRunning {
            member: member.into(),
        }
    }

    /// Creates an invalid state transition error.
    pub fn invalid_state_transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::InvalidStateTransition {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }

    /// Returns true if the invocation must terminate immediately.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Substrate { .. })
    }

    /// Returns true if this is a not found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if the error was raised before any side effect.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OrchestratorError::not_found("statefulset", "orders");
        assert_eq!(err.to_string(), "statefulset not found: orders");

        let err = OrchestratorError::timeout("statefulset orders to become ready", 10);
        assert_eq!(
            err.to_string(),
            "timeout waiting for statefulset orders to become ready after 10 attempts"
        );

        let err = OrchestratorError::target_not_running("orders-1");
        assert_eq!(err.to_string(), "pod orders-1 is not running");
    }

    #[test]
    fn test_error_is_fatal() {
        assert!(OrchestratorError::substrate("list statefulsets", 5, "500").is_fatal());
        assert!(!OrchestratorError::timeout("x", 10).is_fatal());
        assert!(!OrchestratorError::not_found("pod", "x").is_fatal());
    }

    #[test]
    fn test_error_is_not_found() {
        assert!(OrchestratorError::not_found("statefulset", "x").is_not_found());
        assert!(!OrchestratorError::already_exists("statefulset", "x").is_not_found());
    }

    #[test]
    fn test_validation_conversion() {
        let err: OrchestratorError = ValidationError::EmptyMembers.into();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "validation error: members can't be empty");
    }
}
