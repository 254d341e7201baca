//! The control-plane port.
//!
//! [`ControlPlane`] is the narrow set of Kubernetes API calls the orchestrator
//! needs, over two resource kinds: the StatefulSet holding the cluster and the
//! pods hosting its members. Errors are split into "not found" and everything
//! else; the retry and fatality policy lives in [`super::retry`].

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Pod;
use thiserror::Error;

/// Error reported by a control-plane call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControlPlaneError {
    /// The named resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other API failure.
    #[error("API error: {message}")]
    Api {
        /// HTTP status code, when the server answered.
        code: Option<u16>,
        /// Error message.
        message: String,
    },
}

impl ControlPlaneError {
    /// Creates an API error.
    pub fn api(code: Option<u16>, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }

    /// Returns true if this is a not found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if the server refused a create because the name is taken.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Api { code: Some(409), .. })
    }
}

/// Kubernetes API calls used by the orchestrator.
///
/// All calls are keyed by `(name, namespace)`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Lists the StatefulSets of a namespace.
    async fn list_stateful_sets(&self, namespace: &str) -> Result<Vec<StatefulSet>, ControlPlaneError>;

    /// Reads one StatefulSet.
    async fn read_stateful_set(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<StatefulSet, ControlPlaneError>;

    /// Creates a StatefulSet.
    async fn create_stateful_set(
        &self,
        namespace: &str,
        workload: &StatefulSet,
    ) -> Result<StatefulSet, ControlPlaneError>;

    /// Submits a full StatefulSet representation as a patch.
    async fn patch_stateful_set(
        &self,
        name: &str,
        namespace: &str,
        workload: &StatefulSet,
    ) -> Result<StatefulSet, ControlPlaneError>;

    /// Deletes a StatefulSet.
    async fn delete_stateful_set(&self, name: &str, namespace: &str) -> Result<(), ControlPlaneError>;

    /// Lists the pods of a namespace.
    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, ControlPlaneError>;

    /// Reads one pod.
    async fn read_pod(&self, name: &str, namespace: &str) -> Result<Pod, ControlPlaneError>;
}
