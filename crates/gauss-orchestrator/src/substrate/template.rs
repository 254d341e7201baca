//! StatefulSet manifest rendering.

use k8s_openapi::api::apps::v1::StatefulSet;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{OrchestratorError, Result};
use crate::settings::{GaussSettings, WorkloadSettings};

/// Annotation recording the topology size on the workload.
pub const TOPOLOGY_SIZE_ANNOTATION: &str = "replicas";

/// Renders the StatefulSet that hosts one cluster.
#[derive(Debug, Clone)]
pub struct WorkloadTemplate {
    workload: WorkloadSettings,
    gauss_root: PathBuf,
    data_dir: PathBuf,
}

impl WorkloadTemplate {
    /// Creates a template from settings.
    pub fn new(workload: WorkloadSettings, gauss: &GaussSettings) -> Self {
        Self {
            workload,
            gauss_root: gauss.root.clone(),
            data_dir: gauss.data_dir.clone(),
        }
    }

    /// Renders the manifest of workload `name` with `replicas` members.
    ///
    /// The topology-size annotation is set to `replicas`, and the container
    /// learns whether it runs a standalone node through `SINGLE`.
    pub fn render(&self, name: &str, namespace: &str, replicas: usize) -> Result<StatefulSet> {
        let w = &self.workload;
        let single = if replicas == 1 { "true" } else { "false" };
        let annotations = BTreeMap::from([(TOPOLOGY_SIZE_ANNOTATION, replicas.to_string())]);

        let manifest = json!({
            "apiVersion": "apps/v1",
            "kind": "StatefulSet",
            "metadata": {
                "name": name,
                "namespace": namespace,
                "annotations": annotations
            },
            "spec": {
                "selector": { "matchLabels": { "app": w.app_label } },
                "serviceName": w.service_name,
                "replicas": replicas,
                "template": {
                    "metadata": { "labels": { "app": w.app_label } },
                    "spec": {
                        "hostNetwork": w.host_network,
                        "terminationGracePeriodSeconds": w.termination_grace_period_secs,
                        "nodeSelector": w.node_selector,
                        "containers": [{
                            "name": name,
                            "image": w.image,
                            "imagePullPolicy": w.image_pull_policy,
                            "command": w.command,
                            "args": w.args,
                            "env": [
                                { "name": "GAUSS_ROOT", "value": self.gauss_root.display().to_string() },
                                { "name": "SINGLE", "value": single },
                                {
                                    "name": "INSTANCE_ID",
                                    "valueFrom": { "fieldRef": { "fieldPath": "metadata.name" } }
                                },
                                {
                                    "name": "INSTANCE_IP",
                                    "valueFrom": { "fieldRef": { "fieldPath": "status.podIP" } }
                                }
                            ],
                            "volumeMounts": [{
                                "name": w.volume_claim_name,
                                "mountPath": self.data_dir.display().to_string()
                            }]
                        }]
                    }
                },
                "volumeClaimTemplates": [{
                    "metadata": { "name": w.volume_claim_name },
                    "spec": {
                        "accessModes": [w.access_mode],
                        "storageClassName": w.storage_class,
                        "resources": { "requests": { "storage": w.storage_size } }
                    }
                }]
            }
        });

        serde_json::from_value(manifest).map_err(|e| {
            OrchestratorError::configuration(format!("invalid workload template: {}", e))
        })
    }
}
