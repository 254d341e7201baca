//! Gauss Orchestrator - Lifecycle orchestration of openGauss clusters.
//!
//! A cluster runs as one Kubernetes StatefulSet whose pods are the cluster
//! members. This crate drives such a cluster through its lifecycle:
//!
//! - [`substrate`]: StatefulSet create, read, scale and delete with bounded
//!   retry and readiness polling
//! - [`exec`]: Remote command execution inside member pods
//! - [`classify`]: Success or failure of a remote command from its output
//! - [`commands`]: The openGauss command vocabulary
//! - [`replication`]: Replication wiring of multi-member clusters
//! - [`controller`]: The lifecycle workflows and their reports
//! - [`settings`]: Orchestrator settings
//! - [`error`]: The orchestrator error type
//!
//! # Example
//!
//! ```no_run
//! use gauss_core::{ParamMap, Verb};
//! use gauss_orchestrator::{
//!     InvocationContext, KubeControlPlane, KubeExecTransport, Orchestrator, OrchestratorSettings,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = kube::Client::try_default().await?;
//! let orchestrator = Orchestrator::new(
//!     Arc::new(KubeControlPlane::new(client.clone())),
//!     Arc::new(KubeExecTransport::new(client)),
//!     OrchestratorSettings::default(),
//!     InvocationContext::detect()?,
//! );
//!
//! let params = ParamMap::new().with("instance", "orders");
//! let report = orchestrator.execute(Verb::StopInstance, &params).await;
//! println!("{}", report);
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod commands;
pub mod controller;
pub mod error;
pub mod exec;
pub mod replication;
pub mod settings;
pub mod substrate;

#[cfg(test)]
mod testing;

pub use classify::{CommandKind, MarkerTable, OutputClassifier, Verdict};
pub use commands::{GaussCommands, RemoteCommand};
pub use controller::{CommandReport, InvocationContext, LifecycleState, Orchestrator, Outcome, Step};
pub use error::{OrchestratorError, Result};
pub use exec::{KubeExecTransport, RemoteCommandResult, RemoteExecutor};
pub use replication::ReplicationTopologyConfigurer;
pub use settings::OrchestratorSettings;
pub use substrate::{ControlPlane, KubeControlPlane, SubstrateClient, WorkloadHandle};
