//! In-memory control plane and exec transport for workflow tests.
//!
//! [`FakeCluster`] keeps StatefulSets, pods and live database processes in
//! memory and answers remote commands the way the openGauss tools would.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec, StatefulSetStatus};
use k8s_openapi::api::core::v1::{Pod, PodStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::controller::{InvocationContext, Orchestrator};
use crate::error::Result;
use crate::exec::{ChannelEvent, ExecChannel, ExecTransport, RemoteExecutor};
use crate::settings::{GaussSettings, OrchestratorSettings, WorkloadSettings};
use crate::substrate::{
    ControlPlane, ControlPlaneError, SubstrateClient, WorkloadHandle, WorkloadTemplate, TOPOLOGY_SIZE_ANNOTATION,
};

const NAMESPACE: &str = "manager";
const CHUNK: usize = 7;

/// A canned answer to a remote command.
#[derive(Debug, Clone)]
pub struct FakeReply {
    stdout: String,
    stderr: String,
    exit_status: Option<i32>,
}

impl FakeReply {
    pub fn stdout(text: &str) -> Self {
        Self {
            stdout: text.to_string(),
            stderr: String::new(),
            exit_status: Some(0),
        }
    }

    pub fn with_stderr(mut self, text: &str) -> Self {
        self.stderr = text.to_string();
        self
    }

    pub fn with_exit_status(mut self, status: Option<i32>) -> Self {
        self.exit_status = status;
        self
    }

    fn silent() -> Self {
        Self::stdout("")
    }
}

/// A remote command as the transport saw it.
#[derive(Debug, Clone)]
pub struct RecordedCommand {
    pub pod: String,
    pub namespace: String,
    pub argv: Vec<String>,
}

impl RecordedCommand {
    /// The `bash -c` payload.
    pub fn script(&self) -> &str {
        self.argv.last().map(String::as_str).unwrap_or_default()
    }

    /// The statement of a `gsql -c` command.
    pub fn sql(&self) -> Option<&str> {
        let script = self.script();
        let start = script.find("-c \"")? + 4;
        script[start..].strip_suffix('"')
    }
}

#[derive(Default)]
struct State {
    workloads: BTreeMap<String, StatefulSet>,
    pods: BTreeMap<String, Pod>,
    running: BTreeSet<String>,
    databases: BTreeSet<String>,
    commands: Vec<RecordedCommand>,
    scales: Vec<(String, i32)>,
    replies: Vec<(String, FakeReply)>,
    failing: BTreeSet<String>,
    calls: HashMap<String, u32>,
    mutations: usize,
    pending: bool,
}

/// Shared in-memory cluster. Clones share state.
#[derive(Clone)]
pub struct FakeCluster {
    state: Arc<Mutex<State>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        let state = State {
            databases: ["postgres", "template0", "template1"].iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Adds a ready workload with running pods, without counting a mutation.
    pub fn add_workload(&self, name: &str, replicas: i32) {
        let workload = StatefulSet {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(NAMESPACE.to_string()),
                annotations: Some(BTreeMap::from([(
                    TOPOLOGY_SIZE_ANNOTATION.to_string(),
                    replicas.to_string(),
                )])),
                ..Default::default()
            },
            spec: Some(StatefulSetSpec {
                replicas: Some(replicas),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut state = self.lock();
        state.install(workload);
    }

    /// Changes the replica count without recording a scale.
    pub fn scale_silently(&self, name: &str, replicas: i32) {
        let mut state = self.lock();
        if let Some(mut workload) = state.workloads.get(name).cloned() {
            if let Some(spec) = workload.spec.as_mut() {
                spec.replicas = Some(replicas);
            }
            state.install(workload);
        }
    }

    pub fn remove_annotation(&self, name: &str) {
        if let Some(workload) = self.lock().workloads.get_mut(name) {
            workload.metadata.annotations = None;
        }
    }

    /// Keeps new workloads from becoming ready and their pods from running.
    pub fn set_auto_ready(&self, ready: bool) {
        self.lock().pending = !ready;
    }

    /// Makes every call of a control-plane operation fail with a server error.
    pub fn fail_operation(&self, operation: &str) {
        self.lock().failing.insert(operation.to_string());
    }

    /// Answers commands containing `pattern` with `reply`. Earlier patterns win.
    pub fn reply(&self, pattern: &str, reply: FakeReply) {
        self.lock().replies.push((pattern.to_string(), reply));
    }

    pub fn mark_running(&self, member: &str) {
        self.lock().running.insert(member.to_string());
    }

    pub fn is_running(&self, member: &str) -> bool {
        self.lock().running.contains(member)
    }

    pub fn add_database(&self, name: &str) {
        self.lock().databases.insert(name.to_string());
    }

    pub fn workload(&self, name: &str) -> Option<WorkloadHandle> {
        self.lock().workloads.get(name).map(WorkloadHandle::from_stateful_set)
    }

    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.lock().commands.clone()
    }

    pub fn scales(&self) -> Vec<(String, i32)> {
        self.lock().scales.clone()
    }

    pub fn mutations(&self) -> usize {
        self.lock().mutations
    }

    pub fn calls(&self, operation: &str) -> u32 {
        self.lock().calls.get(operation).copied().unwrap_or(0)
    }

    pub fn substrate(&self) -> SubstrateClient<FakeCluster> {
        SubstrateClient::new(
            Arc::new(self.clone()),
            NAMESPACE,
            WorkloadTemplate::new(WorkloadSettings::default(), &GaussSettings::default()),
        )
    }

    pub fn executor(&self) -> RemoteExecutor<FakeCluster, FakeCluster> {
        RemoteExecutor::new(
            Arc::new(self.substrate()),
            Arc::new(self.clone()),
            GaussSettings::default().shell_prelude,
        )
        .with_poll_interval(Duration::from_millis(10))
    }

    pub fn orchestrator(&self) -> Orchestrator<FakeCluster, FakeCluster> {
        self.orchestrator_with(OrchestratorSettings::default())
    }

    pub fn orchestrator_with(&self, settings: OrchestratorSettings) -> Orchestrator<FakeCluster, FakeCluster> {
        Orchestrator::new(
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            settings,
            InvocationContext::new("dbuser").unwrap(),
        )
    }

    fn enter(&self, operation: &str) -> std::result::Result<MutexGuard<'_, State>, ControlPlaneError> {
        let mut state = self.lock();
        *state.calls.entry(operation.to_string()).or_default() += 1;
        if state.failing.contains(operation) {
            return Err(ControlPlaneError::api(Some(500), format!("{} unavailable", operation)));
        }
        Ok(state)
    }
}

impl State {
    /// Stores `workload` and brings its status and pods in line with its replica count.
    fn install(&mut self, mut workload: StatefulSet) {
        let name = workload.metadata.name.clone().unwrap_or_default();
        let replicas = workload.spec.as_ref().and_then(|s| s.replicas).unwrap_or(0);
        workload.status = Some(StatefulSetStatus {
            replicas,
            ready_replicas: if self.pending { None } else { Some(replicas) },
            ..Default::default()
        });
        workload.metadata.namespace = Some(NAMESPACE.to_string());

        self.remove_pods(&name);
        let phase = if self.pending { "Pending" } else { "Running" };
        for ordinal in 0..replicas.max(0) {
            let pod = format!("{}-{}", name, ordinal);
            self.pods.insert(
                pod.clone(),
                Pod {
                    metadata: ObjectMeta {
                        name: Some(pod),
                        namespace: Some(NAMESPACE.to_string()),
                        ..Default::default()
                    },
                    status: Some(PodStatus {
                        phase: Some(phase.to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            );
        }
        let live: BTreeSet<String> = self.pods.keys().cloned().collect();
        self.running.retain(|member| live.contains(member));
        self.workloads.insert(name, workload);
    }

    fn remove_pods(&mut self, workload: &str) {
        let prefix = format!("{}-", workload);
        self.pods.retain(|name, _| !name.starts_with(&prefix));
    }

    /// Answers `script` run in `pod` the way the database tools would.
    fn answer(&mut self, pod: &str, script: &str) -> FakeReply {
        if let Some((_, reply)) = self.replies.iter().find(|(pattern, _)| script.contains(pattern.as_str())) {
            return reply.clone();
        }

        if script.contains("gs_initdb") {
            FakeReply::stdout("The files belonging to this database system will be owned by user \"dbuser\".\nSuccess. You can now start the database server.\n")
        } else if script.contains("gs_ctl start") || script.contains("gs_ctl build") {
            if self.running.contains(pod) {
                return FakeReply::stdout("FATAL: lock file \"postmaster.pid\" already exists\nIs another server running?\n")
                    .with_exit_status(Some(1));
            }
            self.running.insert(pod.to_string());
            FakeReply::stdout("waiting for server to start....\n.\nserver started\n")
        } else if script.contains("gs_ctl stop") {
            self.running.remove(pod);
            FakeReply::stdout("waiting for server to shut down.... done\nserver stopped\n")
        } else if script.contains("ps -efww") {
            if self.running.contains(pod) {
                FakeReply::stdout(&format!(
                    "dbuser  4242  1  2 10:00 ?  00:00:03 gaussdb -D /opt/data1/greenopengauss/data/{}\n",
                    pod
                ))
            } else {
                FakeReply::silent().with_exit_status(Some(1))
            }
        } else if script.contains("sed -n '/^port/p'") {
            FakeReply::stdout("5432\n")
        } else if script.contains("gsql") {
            self.answer_sql(script)
        } else {
            FakeReply::silent()
        }
    }

    fn answer_sql(&mut self, script: &str) -> FakeReply {
        if let Some(rest) = script.split("WHERE datname = '").nth(1) {
            let wanted = rest.split('\'').next().unwrap_or_default();
            return if self.databases.contains(wanted) {
                FakeReply::stdout(&format!("{}\n", wanted))
            } else {
                FakeReply::silent()
            };
        }
        if script.contains("SELECT datname FROM pg_database") {
            let listing: Vec<&str> = self.databases.iter().map(String::as_str).collect();
            return FakeReply::stdout(&format!("{}\n", listing.join("\n")));
        }
        if let Some(rest) = script.split("CREATE DATABASE ").nth(1) {
            if let Some(name) = rest.split_whitespace().next() {
                self.databases.insert(name.to_string());
            }
        }
        FakeReply::silent()
    }
}

#[async_trait]
impl ControlPlane for FakeCluster {
    async fn list_stateful_sets(&self, _namespace: &str) -> std::result::Result<Vec<StatefulSet>, ControlPlaneError> {
        let state = self.enter("list_stateful_sets")?;
        Ok(state.workloads.values().cloned().collect())
    }

    async fn read_stateful_set(
        &self,
        name: &str,
        _namespace: &str,
    ) -> std::result::Result<StatefulSet, ControlPlaneError> {
        let state = self.enter("read_stateful_set")?;
        state
            .workloads
            .get(name)
            .cloned()
            .ok_or_else(|| ControlPlaneError::NotFound(name.to_string()))
    }

    async fn create_stateful_set(
        &self,
        _namespace: &str,
        workload: &StatefulSet,
    ) -> std::result::Result<StatefulSet, ControlPlaneError> {
        let mut state = self.enter("create_stateful_set")?;
        state.mutations += 1;
        let name = workload.metadata.name.clone().unwrap_or_default();
        if state.workloads.contains_key(&name) {
            return Err(ControlPlaneError::api(Some(409), format!("{} already exists", name)));
        }
        state.install(workload.clone());
        state
            .workloads
            .get(&name)
            .cloned()
            .ok_or_else(|| ControlPlaneError::NotFound(name))
    }

    async fn patch_stateful_set(
        &self,
        name: &str,
        _namespace: &str,
        workload: &StatefulSet,
    ) -> std::result::Result<StatefulSet, ControlPlaneError> {
        let mut state = self.enter("patch_stateful_set")?;
        state.mutations += 1;
        if !state.workloads.contains_key(name) {
            return Err(ControlPlaneError::NotFound(name.to_string()));
        }
        let replicas = workload.spec.as_ref().and_then(|s| s.replicas).unwrap_or(0);
        state.scales.push((name.to_string(), replicas));
        state.install(workload.clone());
        state
            .workloads
            .get(name)
            .cloned()
            .ok_or_else(|| ControlPlaneError::NotFound(name.to_string()))
    }

    async fn delete_stateful_set(&self, name: &str, _namespace: &str) -> std::result::Result<(), ControlPlaneError> {
        let mut state = self.enter("delete_stateful_set")?;
        state.mutations += 1;
        if state.workloads.remove(name).is_none() {
            return Err(ControlPlaneError::NotFound(name.to_string()));
        }
        state.remove_pods(name);
        let prefix = format!("{}-", name);
        state.running.retain(|member| !member.starts_with(&prefix));
        Ok(())
    }

    async fn list_pods(&self, _namespace: &str) -> std::result::Result<Vec<Pod>, ControlPlaneError> {
        let state = self.enter("list_pods")?;
        Ok(state.pods.values().cloned().collect())
    }

    async fn read_pod(&self, name: &str, _namespace: &str) -> std::result::Result<Pod, ControlPlaneError> {
        let state = self.enter("read_pod")?;
        state
            .pods
            .get(name)
            .cloned()
            .ok_or_else(|| ControlPlaneError::NotFound(name.to_string()))
    }
}

/// Replays a reply as chunked output.
struct FakeChannel {
    events: VecDeque<ChannelEvent>,
}

impl FakeChannel {
    fn replay(reply: FakeReply) -> Self {
        let mut events = VecDeque::new();
        for chunk in reply.stdout.as_bytes().chunks(CHUNK) {
            events.push_back(ChannelEvent::Stdout(chunk.to_vec()));
            events.push_back(ChannelEvent::Idle);
        }
        for chunk in reply.stderr.as_bytes().chunks(CHUNK) {
            events.push_back(ChannelEvent::Stderr(chunk.to_vec()));
        }
        events.push_back(ChannelEvent::Closed {
            exit_status: reply.exit_status,
        });
        Self { events }
    }
}

#[async_trait]
impl ExecChannel for FakeChannel {
    async fn poll(&mut self, _wait: Duration) -> Result<ChannelEvent> {
        Ok(self.events.pop_front().unwrap_or(ChannelEvent::Closed { exit_status: None }))
    }
}

#[async_trait]
impl ExecTransport for FakeCluster {
    async fn open(&self, pod: &str, namespace: &str, argv: Vec<String>) -> Result<Box<dyn ExecChannel>> {
        let mut state = self.lock();
        let script = argv.last().cloned().unwrap_or_default();
        state.commands.push(RecordedCommand {
            pod: pod.to_string(),
            namespace: namespace.to_string(),
            argv,
        });
        let reply = state.answer(pod, &script);
        Ok(Box::new(FakeChannel::replay(reply)))
    }
}
