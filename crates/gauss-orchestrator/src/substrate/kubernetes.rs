//! Kubernetes implementation of the control-plane port.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};

use super::port::{ControlPlane, ControlPlaneError};

/// [`ControlPlane`] backed by a `kube` client.
#[derive(Clone)]
pub struct KubeControlPlane {
    client: Client,
}

impl KubeControlPlane {
    /// Creates a control plane over an existing client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn stateful_sets(&self, namespace: &str) -> Api<StatefulSet> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Splits `kube` errors into not-found and everything else.
pub(crate) fn classify_kube_error(err: kube::Error) -> ControlPlaneError {
    match err {
        kube::Error::Api(response) if response.code == 404 => {
            ControlPlaneError::NotFound(response.message)
        }
        kube::Error::Api(response) => ControlPlaneError::api(Some(response.code), response.message),
        other => ControlPlaneError::api(None, other.to_string()),
    }
}

#[async_trait]
impl ControlPlane for KubeControlPlane {
    async fn list_stateful_sets(&self, namespace: &str) -> Result<Vec<StatefulSet>, ControlPlaneError> {
        self.stateful_sets(namespace)
            .list(&ListParams::default())
            .await
            .map(|list| list.items)
            .map_err(classify_kube_error)
    }

    async fn read_stateful_set(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<StatefulSet, ControlPlaneError> {
        self.stateful_sets(namespace)
            .get(name)
            .await
            .map_err(classify_kube_error)
    }

    async fn create_stateful_set(
        &self,
        namespace: &str,
        workload: &StatefulSet,
    ) -> Result<StatefulSet, ControlPlaneError> {
        self.stateful_sets(namespace)
            .create(&PostParams::default(), workload)
            .await
            .map_err(classify_kube_error)
    }

    async fn patch_stateful_set(
        &self,
        name: &str,
        namespace: &str,
        workload: &StatefulSet,
    ) -> Result<StatefulSet, ControlPlaneError> {
        self.stateful_sets(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(workload))
            .await
            .map_err(classify_kube_error)
    }

    async fn delete_stateful_set(&self, name: &str, namespace: &str) -> Result<(), ControlPlaneError> {
        self.stateful_sets(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(classify_kube_error)
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, ControlPlaneError> {
        self.pods(namespace)
            .list(&ListParams::default())
            .await
            .map(|list| list.items)
            .map_err(classify_kube_error)
    }

    async fn read_pod(&self, name: &str, namespace: &str) -> Result<Pod, ControlPlaneError> {
        self.pods(namespace).get(name).await.map_err(classify_kube_error)
    }
}
