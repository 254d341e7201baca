//! Lifecycle orchestration.
//!
//! The [`Orchestrator`] drives one cluster through its lifecycle with the
//! substrate client and the remote executor. Each public operation runs to
//! completion, records every step it takes and returns a [`CommandReport`].
//! Members are always handled one at a time.
//!
//! - [`state`]: Lifecycle states and allowed transitions
//! - [`report`]: Step trail and command reports
//! - [`context`]: Per-invocation identity
//! - [`cleanup`]: The post-failure cleanup hook
//! - [`datadir`]: Host-side member data directories

pub mod cleanup;
pub mod context;
pub mod datadir;
pub mod report;
pub mod state;

mod create;
mod delete;
mod start;
mod stop;
mod tenant;

pub use cleanup::{cleanup_hook, CleanupHook, NoopCleanup, RollbackCleanup, Teardown};
pub use context::InvocationContext;
pub use datadir::DataDirectories;
pub use report::{CommandReport, Outcome, Step, StepFailure, StepRecord, StepStatus};
pub use state::LifecycleState;
pub use tenant::{provision_statements, removal_statements};

use async_trait::async_trait;
use futures::future::BoxFuture;
use gauss_core::command::{PARAM_FILE, PARAM_INSTANCE};
use gauss_core::{load_topology, MemberId, ParamMap, ValidatedParams, ValidationError, Verb};
use std::sync::Arc;
use tracing::{info_span, Instrument};

use crate::commands::GaussCommands;
use crate::error::{OrchestratorError, Result};
use crate::exec::{ExecTransport, RemoteExecutor};
use crate::settings::OrchestratorSettings;
use crate::substrate::{ControlPlane, ReadinessPolicy, RetryPolicy, SubstrateClient, WorkloadTemplate};
use report::Run;

type Handler<C, T> = for<'a> fn(&'a Orchestrator<C, T>, &'a ValidatedParams) -> BoxFuture<'a, CommandReport>;

/// Drives cluster lifecycles.
pub struct Orchestrator<C, T> {
    settings: OrchestratorSettings,
    context: InvocationContext,
    substrate: Arc<SubstrateClient<C>>,
    executor: RemoteExecutor<C, T>,
    commands: GaussCommands,
    data_dirs: DataDirectories,
    cleanup: Box<dyn CleanupHook>,
}

impl<C: ControlPlane, T: ExecTransport> Orchestrator<C, T> {
    /// Creates an orchestrator.
    ///
    /// The cleanup hook follows `settings.cleanup.rollback_on_failed_create`.
    pub fn new(plane: Arc<C>, transport: Arc<T>, settings: OrchestratorSettings, context: InvocationContext) -> Self {
        let polling = &settings.polling;
        let template = WorkloadTemplate::new(settings.workload.clone(), &settings.gauss);
        let substrate = Arc::new(
            SubstrateClient::new(plane, settings.namespace.clone(), template)
                .with_retry(RetryPolicy::new(polling.api_attempts, polling.api_retry_delay()))
                .with_readiness(ReadinessPolicy {
                    max_attempts: polling.ready_attempts,
                    step: polling.ready_step(),
                }),
        );
        let executor = RemoteExecutor::new(substrate.clone(), transport, settings.gauss.shell_prelude.clone())
            .with_poll_interval(polling.exec_poll_interval());

        Self {
            commands: GaussCommands::new(settings.gauss.clone(), context.user()),
            data_dirs: DataDirectories::new(settings.storage.host_data_root.clone()),
            cleanup: cleanup_hook(settings.cleanup.rollback_on_failed_create),
            substrate,
            executor,
            context,
            settings,
        }
    }

    /// Replaces the cleanup hook.
    pub fn with_cleanup_hook(mut self, hook: Box<dyn CleanupHook>) -> Self {
        self.cleanup = hook;
        self
    }

    /// Returns the invocation context.
    pub fn context(&self) -> &InvocationContext {
        &self.context
    }

    /// Validates `params` against the schema of `verb` and runs the command.
    ///
    /// Everything the command logs carries the verb, the invocation id and the
    /// effective user.
    pub async fn execute(&self, verb: Verb, params: &ParamMap) -> CommandReport {
        let span = info_span!(
            "command",
            verb = %verb,
            invocation = %self.context.invocation_id(),
            user = %self.context.user(),
        );

        async move {
            match params.validate(verb) {
                Ok(validated) => Self::handler(verb)(self, &validated).await,
                Err(e) => {
                    let target = params
                        .get(PARAM_INSTANCE)
                        .or_else(|| params.get(PARAM_FILE))
                        .unwrap_or_default();
                    self.rejected(verb, target, e.into())
                }
            }
        }
        .instrument(span)
        .await
    }

    fn handler(verb: Verb) -> Handler<C, T> {
        match verb {
            Verb::CreateInstance => Self::handle_create,
            Verb::DeleteInstance => Self::handle_delete,
            Verb::AddDatabase => Self::handle_add_database,
            Verb::RemoveDatabase => Self::handle_remove_database,
            Verb::StartInstance => Self::handle_start,
            Verb::StopInstance => Self::handle_stop,
        }
    }

    fn handle_create<'a>(&'a self, params: &'a ValidatedParams) -> BoxFuture<'a, CommandReport> {
        Box::pin(async move {
            let path = params.topology_path().unwrap_or_default();
            match load_topology(&path, &self.settings.gauss.data_dir) {
                Ok(cluster) => self.create(&cluster).await,
                Err(e) => self.rejected(Verb::CreateInstance, &path.display().to_string(), e.into()),
            }
        })
    }

    fn handle_start<'a>(&'a self, params: &'a ValidatedParams) -> BoxFuture<'a, CommandReport> {
        Box::pin(async move {
            let instance = match params.instance() {
                Ok(instance) => instance,
                Err(e) => return self.rejected(Verb::StartInstance, "", e.into()),
            };
            let topology = match params.topology_path() {
                Some(path) => match load_topology(&path, &self.settings.gauss.data_dir) {
                    Ok(cluster) => Some(cluster),
                    Err(e) => return self.rejected(Verb::StartInstance, instance, e.into()),
                },
                None => None,
            };
            self.start(instance, topology.as_ref()).await
        })
    }

    fn handle_stop<'a>(&'a self, params: &'a ValidatedParams) -> BoxFuture<'a, CommandReport> {
        Box::pin(async move {
            match params.instance() {
                Ok(instance) => self.stop(instance).await,
                Err(e) => self.rejected(Verb::StopInstance, "", e.into()),
            }
        })
    }

    fn handle_delete<'a>(&'a self, params: &'a ValidatedParams) -> BoxFuture<'a, CommandReport> {
        Box::pin(async move {
            match params.instance() {
                Ok(instance) => self.delete(instance).await,
                Err(e) => self.rejected(Verb::DeleteInstance, "", e.into()),
            }
        })
    }

    fn handle_add_database<'a>(&'a self, params: &'a ValidatedParams) -> BoxFuture<'a, CommandReport> {
        Box::pin(async move {
            match params.instance().and_then(|i| Ok((i, params.database_names()?))) {
                Ok((instance, names)) => self.add_database(instance, &names).await,
                Err(e) => self.rejected(Verb::AddDatabase, params.get(PARAM_INSTANCE).unwrap_or_default(), e.into()),
            }
        })
    }

    fn handle_remove_database<'a>(&'a self, params: &'a ValidatedParams) -> BoxFuture<'a, CommandReport> {
        Box::pin(async move {
            match params.instance().and_then(|i| Ok((i, params.database_names()?))) {
                Ok((instance, names)) => self.remove_database(instance, &names).await,
                Err(e) => self.rejected(
                    Verb::RemoveDatabase,
                    params.get(PARAM_INSTANCE).unwrap_or_default(),
                    e.into(),
                ),
            }
        })
    }

    fn run(&self, verb: Verb, instance: &str, state: LifecycleState) -> Run {
        Run::new(verb, instance, self.context.invocation_id(), state)
    }

    /// A report for a command refused before any side effect.
    fn rejected(&self, verb: Verb, target: &str, error: OrchestratorError) -> CommandReport {
        self.run(verb, target, LifecycleState::Unprovisioned)
            .finish(Err(StepFailure::new(Step::Validate, error)))
    }

    /// Returns true if a database server process is live on `member`.
    ///
    /// A member whose pod is not running has no live process.
    async fn member_running(&self, member: &MemberId) -> Result<bool> {
        match self.executor.execute(member.as_str(), &self.commands.probe(member)).await {
            Ok(result) => Ok(result.has_output()),
            Err(OrchestratorError::TargetNotRunning { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl<C: ControlPlane, T: ExecTransport> Teardown for Orchestrator<C, T> {
    async fn delete_workload(&self, instance: &str) -> Result<()> {
        self.substrate.delete(instance).await
    }

    async fn remove_data(&self, instance: &str) -> Result<usize> {
        self.data_dirs.remove_instance(instance).await
    }
}

/// Checks that a topology describes `instance`.
fn ensure_topology_matches(instance: &str, cluster_name: &str) -> Result<()> {
    if instance == cluster_name {
        Ok(())
    } else {
        Err(ValidationError::malformed(format!(
            "topology describes '{}', not '{}'",
            cluster_name, instance
        ))
        .into())
    }
}
