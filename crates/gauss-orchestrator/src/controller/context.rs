//! Per-invocation context.

use gauss_core::ValidationError;
use nix::unistd::{geteuid, User};
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};

const ROOT_USER: &str = "root";

/// Identity of one invocation, carried through every workflow.
///
/// The user owns the database files and is the database superuser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationContext {
    user: String,
    invocation_id: Uuid,
}

impl InvocationContext {
    /// Creates a context for `user` with a fresh invocation id.
    ///
    /// Fails with `RootUser` for `root` and `BlankArgument` for a blank name.
    pub fn new(user: impl Into<String>) -> Result<Self> {
        let user = user.into();
        if user.trim().is_empty() {
            return Err(ValidationError::blank("user").into());
        }
        if user == ROOT_USER {
            return Err(ValidationError::RootUser.into());
        }
        Ok(Self {
            user,
            invocation_id: Uuid::new_v4(),
        })
    }

    /// Resolves the effective user of this process.
    pub fn detect() -> Result<Self> {
        let uid = geteuid();
        if uid.is_root() {
            return Err(ValidationError::RootUser.into());
        }
        let user = User::from_uid(uid)
            .map_err(|e| OrchestratorError::configuration(format!("failed to look up uid {}: {}", uid, e)))?
            .ok_or_else(|| OrchestratorError::configuration(format!("uid {} has no user entry", uid)))?;
        Self::new(user.name)
    }

    /// The effective user name.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// The invocation id.
    pub fn invocation_id(&self) -> Uuid {
        self.invocation_id
    }
}
