//! The substrate client.
//!
//! [`SubstrateClient`] owns every interaction with the StatefulSet hosting a
//! cluster and with the pods of its members: existence checks, creation,
//! read-modify-write scaling, idempotent deletion and readiness polling. All
//! calls go through the [`RetryPolicy`].

use k8s_openapi::api::apps::v1::StatefulSet;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::port::ControlPlane;
use super::retry::RetryPolicy;
use super::template::{WorkloadTemplate, TOPOLOGY_SIZE_ANNOTATION};
use crate::error::{OrchestratorError, Result};
use gauss_core::ClusterSpec;

/// Resource kind used in errors and logs.
pub const WORKLOAD_KIND: &str = "statefulset";

/// Pod phase of a running member.
const POD_RUNNING: &str = "Running";

/// Bounds of readiness polling.
///
/// After failing poll `k` the client sleeps `k * step`, so the default of ten
/// polls with a one second step sleeps 45 seconds in total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessPolicy {
    /// Number of polls before timing out.
    pub max_attempts: u32,

    /// Linear backoff step.
    pub step: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            step: Duration::from_secs(1),
        }
    }
}

/// Answer to one create call.
enum CreateOutcome {
    Created(StatefulSet),
    Conflict { retried: bool },
}

/// Snapshot of the workload resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadHandle {
    /// Resource name, also the cluster name.
    pub name: String,

    /// Namespace of the resource.
    pub namespace: String,

    /// Declared replica count.
    pub declared_replicas: i32,

    /// Replicas reported ready, if any.
    pub ready_replicas: Option<i32>,

    /// Raw value of the topology-size annotation.
    pub topology_annotation: Option<String>,
}

impl WorkloadHandle {
    /// Builds a handle from a StatefulSet.
    pub fn from_stateful_set(workload: &StatefulSet) -> Self {
        Self {
            name: workload.metadata.name.clone().unwrap_or_default(),
            namespace: workload.metadata.namespace.clone().unwrap_or_default(),
            declared_replicas: workload
                .spec
                .as_ref()
                .and_then(|s| s.replicas)
                .unwrap_or(0),
            ready_replicas: workload.status.as_ref().and_then(|s| s.ready_replicas),
            topology_annotation: workload
                .metadata
                .annotations
                .as_ref()
                .and_then(|a| a.get(TOPOLOGY_SIZE_ANNOTATION))
                .cloned(),
        }
    }

    /// Returns true when the ready count is reported and equals the declared count.
    pub fn is_ready(&self) -> bool {
        self.ready_replicas == Some(self.declared_replicas)
    }

    /// Returns the topology size recorded at creation.
    pub fn topology_size(&self) -> Result<usize> {
        let raw = self.topology_annotation.as_deref().ok_or_else(|| {
            OrchestratorError::configuration(format!(
                "{} {} has no '{}' annotation",
                WORKLOAD_KIND, self.name, TOPOLOGY_SIZE_ANNOTATION
            ))
        })?;
        match raw.trim().parse::<usize>() {
            Ok(size) if size > 0 => Ok(size),
            _ => Err(OrchestratorError::configuration(format!(
                "{} {} has a malformed '{}' annotation: {}",
                WORKLOAD_KIND, self.name, TOPOLOGY_SIZE_ANNOTATION, raw
            ))),
        }
    }
}

/// Client of the workload resource and its pods.
pub struct SubstrateClient<C> {
    plane: Arc<C>,
    namespace: String,
    template: WorkloadTemplate,
    retry: RetryPolicy,
    readiness: ReadinessPolicy,
}

impl<C: ControlPlane> SubstrateClient<C> {
    /// Creates a client with default retry and readiness bounds.
    pub fn new(plane: Arc<C>, namespace: impl Into<String>, template: WorkloadTemplate) -> Self {
        Self {
            plane,
            namespace: namespace.into(),
            template,
            retry: RetryPolicy::default(),
            readiness: ReadinessPolicy::default(),
        }
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the readiness policy.
    pub fn with_readiness(mut self, readiness: ReadinessPolicy) -> Self {
        self.readiness = readiness;
        self
    }

    /// Returns the namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns true if the workload exists.
    pub async fn exists(&self, name: &str) -> Result<bool> {
        let ns = self.namespace.as_str();
        let listed = self
            .retry
            .run("list statefulsets", || self.plane.list_stateful_sets(ns))
            .await?
            .unwrap_or_default();

        Ok(listed
            .iter()
            .any(|sts| sts.metadata.name.as_deref() == Some(name)))
    }

    /// Reads the workload, `None` when absent.
    pub async fn read(&self, name: &str) -> Result<Option<WorkloadHandle>> {
        Ok(self
            .read_raw(name)
            .await?
            .map(|sts| WorkloadHandle::from_stateful_set(&sts)))
    }

    async fn read_raw(&self, name: &str) -> Result<Option<StatefulSet>> {
        let ns = self.namespace.as_str();
        self.retry
            .run("read statefulset", || self.plane.read_stateful_set(name, ns))
            .await
    }

    /// Creates the workload for `cluster`, one replica per member.
    pub async fn create(&self, cluster: &ClusterSpec) -> Result<WorkloadHandle> {
        self.create_named(cluster.name(), cluster.len()).await
    }

    /// Creates workload `name` with `replicas` replicas.
    ///
    /// Fails with `AlreadyExists` if a workload of that name exists. A conflict
    /// answered to a retried create means an earlier attempt went through, so
    /// the workload is read back instead. Does not wait for readiness.
    pub async fn create_named(&self, name: &str, replicas: usize) -> Result<WorkloadHandle> {
        if self.exists(name).await? {
            warn!(workload = name, namespace = %self.namespace, "Workload already exists");
            return Err(OrchestratorError::already_exists(WORKLOAD_KIND, name));
        }

        let manifest = self.template.render(name, &self.namespace, replicas)?;
        let manifest = &manifest;
        let ns = self.namespace.as_str();
        let calls = AtomicU32::new(0);
        let outcome = self
            .retry
            .run("create statefulset", || {
                let retried = calls.fetch_add(1, Ordering::SeqCst) > 0;
                async move {
                    match self.plane.create_stateful_set(ns, manifest).await {
                        Ok(created) => Ok(CreateOutcome::Created(created)),
                        Err(e) if e.is_conflict() => Ok(CreateOutcome::Conflict { retried }),
                        Err(e) => Err(e),
                    }
                }
            })
            .await?
            .ok_or_else(|| OrchestratorError::not_found("namespace", ns))?;

        let created = match outcome {
            CreateOutcome::Created(created) => created,
            CreateOutcome::Conflict { retried: false } => {
                warn!(workload = name, namespace = ns, "Workload created concurrently");
                return Err(OrchestratorError::already_exists(WORKLOAD_KIND, name));
            }
            // An earlier attempt was applied but its response was lost.
            CreateOutcome::Conflict { retried: true } => {
                debug!(workload = name, namespace = ns, "Create conflicted on retry, reading workload back");
                self.read_raw(name)
                    .await?
                    .ok_or_else(|| OrchestratorError::not_found(WORKLOAD_KIND, name))?
            }
        };

        let handle = WorkloadHandle::from_stateful_set(&created);
        info!(
            workload = name,
            namespace = ns,
            replicas,
            ready = ?handle.ready_replicas,
            "Created workload"
        );
        Ok(handle)
    }

    /// Scales workload `name` to `replicas`.
    ///
    /// Reads the current object and resubmits it with only the replica count
    /// changed.
    pub async fn scale(&self, name: &str, replicas: i32) -> Result<WorkloadHandle> {
        let mut current = self
            .read_raw(name)
            .await?
            .ok_or_else(|| OrchestratorError::not_found(WORKLOAD_KIND, name))?;

        if let Some(spec) = current.spec.as_mut() {
            spec.replicas = Some(replicas);
        }
        // Server-maintained bookkeeping is rejected in patch bodies.
        current.metadata.managed_fields = None;

        let ns = self.namespace.as_str();
        let patched = self
            .retry
            .run("patch statefulset", || {
                self.plane.patch_stateful_set(name, ns, &current)
            })
            .await?
            .ok_or_else(|| OrchestratorError::not_found(WORKLOAD_KIND, name))?;

        let handle = WorkloadHandle::from_stateful_set(&patched);
        info!(workload = name, replicas = handle.declared_replicas, "Scaled workload");
        Ok(handle)
    }

    /// Deletes workload `name`. Absence counts as success.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let ns = self.namespace.as_str();
        let deleted = self
            .retry
            .run("delete statefulset", || self.plane.delete_stateful_set(name, ns))
            .await?;

        match deleted {
            Some(()) => info!(workload = name, namespace = ns, "Deleted workload"),
            None => info!(workload = name, namespace = ns, "Workload already absent"),
        }
        Ok(())
    }

    /// Returns true if every declared replica is ready. An absent workload is not ready.
    pub async fn is_ready(&self, name: &str) -> Result<bool> {
        Ok(self.read(name).await?.map(|h| h.is_ready()).unwrap_or(false))
    }

    /// Polls readiness with linear backoff, failing with `Timeout` once the
    /// attempts run out.
    pub async fn wait_ready(&self, name: &str) -> Result<()> {
        let attempts = self.readiness.max_attempts.max(1);

        for attempt in 1..=attempts {
            if self.is_ready(name).await? {
                info!(workload = name, attempt, "Workload ready");
                return Ok(());
            }
            if attempt < attempts {
                let pause = self.readiness.step * attempt;
                debug!(workload = name, attempt, pause_ms = pause.as_millis() as u64, "Waiting for workload");
                tokio::time::sleep(pause).await;
            }
        }

        warn!(workload = name, attempts, "Workload never became ready");
        Err(OrchestratorError::timeout(
            format!("{} {} to become ready", WORKLOAD_KIND, name),
            attempts,
        ))
    }

    /// Returns true if pod `name` exists and is in the running phase.
    pub async fn is_pod_running(&self, name: &str) -> Result<bool> {
        let ns = self.namespace.as_str();
        let pods = self
            .retry
            .run("list pods", || self.plane.list_pods(ns))
            .await?
            .unwrap_or_default();
        if !pods.iter().any(|p| p.metadata.name.as_deref() == Some(name)) {
            debug!(pod = name, namespace = ns, "Pod does not exist");
            return Ok(false);
        }

        let pod = self
            .retry
            .run("read pod", || self.plane.read_pod(name, ns))
            .await?;
        Ok(pod
            .and_then(|p| p.status)
            .and_then(|s| s.phase)
            .as_deref()
            == Some(POD_RUNNING))
    }
}
