//! Replication link derivation.
//!
//! Every member of a multi-member cluster carries one `replconninfo` entry per
//! other member. Links form a full mesh over ordered pairs, so a cluster of
//! `N` members yields `N * (N - 1)` links.

use serde::Serialize;
use std::fmt;

use crate::cluster::ClusterSpec;
use crate::member::{MemberId, MemberSpec};

/// Offset of the replication port from the client port.
pub const REPLICATION_PORT_OFFSET: u32 = 1;

/// Offset of the service port from the client port.
pub const SERVICE_PORT_OFFSET: u32 = 4;

/// Offset of the heartbeat port from the client port.
pub const HEARTBEAT_PORT_OFFSET: u32 = 5;

/// The ports one side of a link listens on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicationEndpoint {
    /// Host of the member.
    pub host: String,

    /// Replication port, client port + 1.
    pub port: u32,

    /// Heartbeat port, client port + 5.
    pub heartbeat_port: u32,

    /// Service port, client port + 4.
    pub service_port: u32,
}

impl ReplicationEndpoint {
    /// Derives the endpoint of `member`.
    pub fn of(member: &MemberSpec) -> Self {
        let base = u32::from(member.port);
        Self {
            host: member.host.clone(),
            port: base + REPLICATION_PORT_OFFSET,
            heartbeat_port: base + HEARTBEAT_PORT_OFFSET,
            service_port: base + SERVICE_PORT_OFFSET,
        }
    }
}

/// A directed replication link from one member to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicationLink {
    /// Member whose configuration carries the link.
    pub owner: MemberId,

    /// Member on the far side.
    pub peer: MemberId,

    /// Link number, the peer's ordinal + 1.
    pub slot: usize,

    /// Local side.
    pub local: ReplicationEndpoint,

    /// Remote side.
    pub remote: ReplicationEndpoint,
}

impl ReplicationLink {
    /// Builds the link `member -> other`.
    pub fn between(member: &MemberSpec, other: &MemberSpec) -> Self {
        Self {
            owner: member.id.clone(),
            peer: other.id.clone(),
            slot: other.ordinal + 1,
            local: ReplicationEndpoint::of(member),
            remote: ReplicationEndpoint::of(other),
        }
    }

    /// Name of the configuration setting, `replconninfo<slot>`.
    pub fn setting_name(&self) -> String {
        format!("replconninfo{}", self.slot)
    }

    /// The value of the configuration setting, without quotes.
    pub fn setting_value(&self) -> String {
        format!(
            "localhost={} localport={} localheartbeatport={} localservice={} \
             remotehost={} remoteport={} remoteheartbeatport={} remoteservice={}",
            self.local.host,
            self.local.port,
            self.local.heartbeat_port,
            self.local.service_port,
            self.remote.host,
            self.remote.port,
            self.remote.heartbeat_port,
            self.remote.service_port,
        )
    }

    /// The full configuration line.
    pub fn conf_line(&self) -> String {
        format!("{} = '{}'", self.setting_name(), self.setting_value())
    }
}

impl fmt::Display for ReplicationLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.owner, self.peer, self.setting_name())
    }
}

/// Returns the links owned by `member`, one per other member, in spec order.
pub fn links_for(cluster: &ClusterSpec, member: &MemberSpec) -> Vec<ReplicationLink> {
    if !cluster.is_multi_member() {
        return Vec::new();
    }
    cluster
        .members()
        .iter()
        .filter(|other| other.id != member.id)
        .map(|other| ReplicationLink::between(member, other))
        .collect()
}

/// Returns the links of every member, outer loop over members in spec order.
///
/// Empty for a single-member cluster.
pub fn full_mesh(cluster: &ClusterSpec) -> Vec<(&MemberSpec, Vec<ReplicationLink>)> {
    if !cluster.is_multi_member() {
        return Vec::new();
    }
    cluster
        .members()
        .iter()
        .map(|member| (member, links_for(cluster, member)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(ports: &[u16]) -> ClusterSpec {
        let mut builder = ClusterSpec::builder("db", "/data");
        for (i, port) in ports.iter().enumerate() {
            builder = builder.member(format!("db-{}", i), format!("10.0.0.{}", i + 1), *port);
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_single_member_has_no_links() {
        let cluster = cluster(&[5432]);
        assert!(full_mesh(&cluster).is_empty());
        assert!(links_for(&cluster, cluster.primary()).is_empty());
    }

    #[test]
    fn test_full_mesh_size() {
        for n in 2..=5usize {
            let ports: Vec<u16> = (0..n as u16).map(|i| 5432 + i * 10).collect();
            let cluster = cluster(&ports);
            let mesh = full_mesh(&cluster);

            assert_eq!(mesh.len(), n);
            assert!(mesh.iter().all(|(_, links)| links.len() == n - 1));
            assert_eq!(mesh.iter().map(|(_, l)| l.len()).sum::<usize>(), n * (n - 1));
        }
    }

    #[test]
    fn test_port_derivation() {
        let cluster = cluster(&[5432, 6000]);
        let link = ReplicationLink::between(&cluster.members()[0], &cluster.members()[1]);

        assert_eq!(link.local.port, 5433);
        assert_eq!(link.local.heartbeat_port, 5437);
        assert_eq!(link.local.service_port, 5436);
        assert_eq!(link.remote.port, 6001);
        assert_eq!(link.remote.heartbeat_port, 6005);
        assert_eq!(link.remote.service_port, 6004);
    }

    #[test]
    fn test_slot_skips_self() {
        let cluster = cluster(&[5432, 5433, 5434]);
        let middle = &cluster.members()[1];
        let slots: Vec<usize> = links_for(&cluster, middle).iter().map(|l| l.slot).collect();

        assert_eq!(slots, vec![1, 3]);
    }

    #[test]
    fn test_conf_line() {
        let cluster = cluster(&[5432, 5433]);
        let link = ReplicationLink::between(&cluster.members()[0], &cluster.members()[1]);

        assert_eq!(
            link.conf_line(),
            "replconninfo2 = 'localhost=10.0.0.1 localport=5433 localheartbeatport=5437 \
             localservice=5436 remotehost=10.0.0.2 remoteport=5434 remoteheartbeatport=5438 \
             remoteservice=5437'"
        );
    }
}
