//! Gauss Core - Cluster topology model for the gauss lifecycle orchestrator.
//!
//! This crate provides the data types that flow through the orchestrator:
//!
//! - [`member`]: Member identification, placement and positional roles
//! - [`cluster`]: The validated, immutable cluster specification
//! - [`replication`]: Full-mesh replication link derivation
//! - [`topology`]: Loading a cluster specification from a topology document
//! - [`command`]: The closed set of CLI verbs and their parameter schemas
//! - [`error`]: Validation errors
//!
//! # Example
//!
//! ```
//! use gauss_core::cluster::{ClusterMode, ClusterSpec};
//! use gauss_core::replication::full_mesh;
//!
//! let cluster = ClusterSpec::builder("orders", "/opt/data1/greenopengauss/data")
//!     .member("orders-0", "10.0.0.1", 5432)
//!     .member("orders-1", "10.0.0.2", 5433)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(cluster.mode(), ClusterMode::PrimaryReplica);
//! assert_eq!(full_mesh(&cluster).iter().map(|(_, l)| l.len()).sum::<usize>(), 2);
//! ```

pub mod cluster;
pub mod command;
pub mod error;
pub mod member;
pub mod replication;
pub mod topology;

pub use cluster::{ClusterMode, ClusterSpec, ClusterSpecBuilder};
pub use command::{DatabaseNames, ParamMap, ValidatedParams, Verb, VerbSchema};
pub use error::{Result, ValidationError};
pub use member::{MemberId, MemberSpec, Role};
pub use replication::{ReplicationEndpoint, ReplicationLink};
pub use topology::{load_topology, parse_topology, TopologyDocument};
