//! The validated cluster specification.
//!
//! A [`ClusterSpec`] is built once per invocation and never mutated
//! afterwards. Construction enforces the topology invariants: at least one
//! member, unique member ids named `<name>-<ordinal>` after their position,
//! usable ports, and positional ordinals.

use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{Result, ValidationError};
use crate::member::{MemberId, MemberSpec};
use crate::replication::HEARTBEAT_PORT_OFFSET;

/// Deployment mode implied by the member count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClusterMode {
    /// A single member running as a standalone node.
    Single,

    /// One primary and at least one replica.
    PrimaryReplica,
}

impl ClusterMode {
    /// Returns the mode for a cluster of `members` members.
    pub const fn for_size(members: usize) -> Self {
        if members == 1 {
            Self::Single
        } else {
            Self::PrimaryReplica
        }
    }
}

/// A validated, immutable cluster topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterSpec {
    name: String,
    members: Vec<MemberSpec>,
}

impl ClusterSpec {
    /// Creates a cluster specification, validating every invariant.
    ///
    /// Member ordinals are reassigned from list position.
    pub fn new(name: impl Into<String>, members: Vec<MemberSpec>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::blank("name"));
        }
        if members.is_empty() {
            return Err(ValidationError::EmptyMembers);
        }

        let multi_member = members.len() > 1;
        let mut seen = HashSet::new();
        let mut ordered = Vec::with_capacity(members.len());

        for (ordinal, mut member) in members.into_iter().enumerate() {
            if member.id.as_str().trim().is_empty() {
                return Err(ValidationError::blank("id"));
            }
            if !seen.insert(member.id.clone()) {
                return Err(ValidationError::DuplicateMember(member.id.to_string()));
            }
            let expected = MemberId::for_ordinal(&name, ordinal);
            if member.id != expected {
                return Err(ValidationError::MemberNameMismatch {
                    member: member.id.to_string(),
                    expected: expected.to_string(),
                });
            }
            if member.port == 0 {
                return Err(ValidationError::InvalidPort {
                    member: member.id.to_string(),
                    port: member.port.to_string(),
                });
            }
            if multi_member && u32::from(member.port) + HEARTBEAT_PORT_OFFSET > u32::from(u16::MAX) {
                return Err(ValidationError::ReplicationPortOverflow {
                    member: member.id.to_string(),
                    port: member.port,
                });
            }
            member.ordinal = ordinal;
            ordered.push(member);
        }

        Ok(Self {
            name,
            members: ordered,
        })
    }

    /// Creates a builder that derives data directories from `data_root`.
    pub fn builder(name: impl Into<String>, data_root: impl Into<PathBuf>) -> ClusterSpecBuilder {
        ClusterSpecBuilder::new(name, data_root)
    }

    /// Returns the cluster name, also the name of its workload resource.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the members in ordinal order.
    pub fn members(&self) -> &[MemberSpec] {
        &self.members
    }

    /// Returns the number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false; a cluster has at least one member.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns the deployment mode.
    pub fn mode(&self) -> ClusterMode {
        ClusterMode::for_size(self.members.len())
    }

    /// Returns true if the cluster needs replication wiring.
    pub fn is_multi_member(&self) -> bool {
        self.mode() == ClusterMode::PrimaryReplica
    }

    /// Returns the primary member.
    pub fn primary(&self) -> &MemberSpec {
        &self.members[0]
    }

    /// Returns the replica members in ordinal order.
    pub fn replicas(&self) -> &[MemberSpec] {
        &self.members[1..]
    }

    /// Looks up a member by id.
    pub fn member(&self, id: &MemberId) -> Option<&MemberSpec> {
        self.members.iter().find(|m| &m.id == id)
    }
}

/// Builder for [`ClusterSpec`].
#[derive(Debug)]
pub struct ClusterSpecBuilder {
    name: String,
    data_root: PathBuf,
    members: Vec<MemberSpec>,
}

impl ClusterSpecBuilder {
    /// Creates a new builder.
    pub fn new(name: impl Into<String>, data_root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            data_root: data_root.into(),
            members: Vec::new(),
        }
    }

    /// Appends a member; its ordinal is its position.
    pub fn member(mut self, id: impl Into<MemberId>, host: impl Into<String>, port: u16) -> Self {
        let ordinal = self.members.len();
        self.members
            .push(MemberSpec::new(id, host, port, ordinal, Path::new(&self.data_root)));
        self
    }

    /// Builds and validates the cluster specification.
    pub fn build(self) -> Result<ClusterSpec> {
        ClusterSpec::new(self.name, self.members)
    }
}
