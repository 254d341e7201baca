//! Control-plane access.
//!
//! - [`port`]: The [`ControlPlane`] trait and its error type
//! - [`retry`]: Bounded retry with fatal exhaustion
//! - [`template`]: StatefulSet manifest rendering
//! - [`client`]: The [`SubstrateClient`] workload operations
//! - [`kubernetes`]: The Kubernetes implementation of the port

pub mod client;
pub mod kubernetes;
pub mod port;
pub mod retry;
pub mod template;

pub use client::{ReadinessPolicy, SubstrateClient, WorkloadHandle, WORKLOAD_KIND};
pub use kubernetes::KubeControlPlane;
pub use port::{ControlPlane, ControlPlaneError};
pub use retry::RetryPolicy;
pub use template::{WorkloadTemplate, TOPOLOGY_SIZE_ANNOTATION};
