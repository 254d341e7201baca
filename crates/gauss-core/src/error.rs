//! Validation errors.
//!
//! Every error in this module is raised before any side effect is attempted.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for validation.
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Errors raised while validating user input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A mandatory argument is missing.
    #[error("argument({0}) must exist")]
    MissingArgument(String),

    /// An argument is present but blank.
    #[error("argument({0}) can't be blank")]
    BlankArgument(String),

    /// The command verb is not one of the supported verbs.
    #[error("the command is invalid: {0}")]
    UnknownCommand(String),

    /// The topology file does not exist.
    #[error("topology file does not exist: {0}")]
    FileNotFound(PathBuf),

    /// The topology file does not carry a `.json` suffix.
    #[error("incorrect file suffix type: {0}")]
    InvalidFileSuffix(PathBuf),

    /// The topology file exceeds the size limit.
    #[error("topology file {path} exceeds {limit} bytes")]
    FileTooLarge {
        /// Path of the file.
        path: PathBuf,
        /// Maximum accepted size in bytes.
        limit: u64,
    },

    /// The topology file could not be read or parsed.
    #[error("malformed topology: {0}")]
    MalformedTopology(String),

    /// The cluster has no members.
    #[error("members can't be empty")]
    EmptyMembers,

    /// Two members share an id.
    #[error("duplicate member id: {0}")]
    DuplicateMember(String),

    /// A member id is not the pod name of its position.
    #[error("member {member} must be named {expected}")]
    MemberNameMismatch {
        /// Member id, as written.
        member: String,
        /// Pod name of the member's position, `<name>-<ordinal>`.
        expected: String,
    },

    /// A port is outside of 1..=65535.
    #[error("port({port}) of member {member} is not an integer in 1..=65535")]
    InvalidPort {
        /// Member id.
        member: String,
        /// Offending value, as written.
        port: String,
    },

    /// A replication port derived from the member port does not fit.
    #[error("port({port}) of member {member} leaves no room for replication ports")]
    ReplicationPortOverflow {
        /// Member id.
        member: String,
        /// Base port.
        port: u16,
    },

    /// A database name is empty or not a plain identifier.
    #[error("dbnames({0}) is invalid")]
    InvalidDatabaseName(String),

    /// The tool refuses to run as root.
    #[error("can not operate openGauss as root")]
    RootUser,
}

impl ValidationError {
    /// Creates a missing argument error.
    pub fn missing(name: impl Into<String>) -> Self {
        Self::MissingArgument(name.into())
    }

    /// Creates a blank argument error.
    pub fn blank(name: impl Into<String>) -> Self {
        Self::BlankArgument(name.into())
    }

    /// Creates a malformed topology error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedTopology(reason.into())
    }
}
