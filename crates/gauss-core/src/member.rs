//! Member identification and placement.
//!
//! A member is one database process of a cluster. It runs inside the pod that
//! carries the member id as its name, so the id doubles as the exec target.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// File name of the engine configuration inside a member's data directory.
pub const ENGINE_CONFIG_FILE: &str = "postgresql.conf";

/// File name of the client authentication rules inside a member's data directory.
pub const CLIENT_AUTH_FILE: &str = "pg_hba.conf";

/// Unique identifier of a member, also the name of the pod hosting it.
///
/// # Examples
///
/// ```
/// use gauss_core::member::MemberId;
///
/// let id = MemberId::for_ordinal("orders", 2);
/// assert_eq!(id.as_str(), "orders-2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(String);

impl MemberId {
    /// Creates a member id from its textual form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id of the member at `ordinal` in the workload named `instance`.
    ///
    /// Pods of a replicated workload are named `<instance>-<ordinal>`.
    pub fn for_ordinal(instance: &str, ordinal: usize) -> Self {
        Self(format!("{}-{}", instance, ordinal))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemberId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// The replication role of a member.
///
/// Roles are positional: the member at ordinal 0 is the primary and every
/// other member is a replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Accepts writes.
    Primary,

    /// Replicates from the primary.
    Replica,
}

impl Role {
    /// Returns the role of the member at `ordinal`.
    pub const fn for_ordinal(ordinal: usize) -> Self {
        if ordinal == 0 {
            Self::Primary
        } else {
            Self::Replica
        }
    }

    /// Returns the name of this role.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Replica => "replica",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Specification of a single member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSpec {
    /// Member id (pod name).
    pub id: MemberId,

    /// Address other members use to reach this one.
    pub host: String,

    /// Client port of the database process.
    pub port: u16,

    /// Data directory inside the pod, `<data root>/<id>`.
    pub storage_dir: PathBuf,

    /// Position in the cluster's member list.
    pub ordinal: usize,
}

impl MemberSpec {
    /// Creates a member, deriving its data directory from `data_root`.
    pub fn new(
        id: impl Into<MemberId>,
        host: impl Into<String>,
        port: u16,
        ordinal: usize,
        data_root: &Path,
    ) -> Self {
        let id = id.into();
        let storage_dir = data_root.join(id.as_str());
        Self {
            id,
            host: host.into(),
            port,
            storage_dir,
            ordinal,
        }
    }

    /// Returns the role derived from the member's position.
    pub fn role(&self) -> Role {
        Role::for_ordinal(self.ordinal)
    }

    /// Returns true if this member is the primary.
    pub fn is_primary(&self) -> bool {
        self.role() == Role::Primary
    }

    /// Path of the engine configuration file.
    pub fn config_file(&self) -> PathBuf {
        self.storage_dir.join(ENGINE_CONFIG_FILE)
    }

    /// Path of the client authentication file.
    pub fn client_auth_file(&self) -> PathBuf {
        self.storage_dir.join(CLIENT_AUTH_FILE)
    }
}

impl From<String> for MemberId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
