//! Step trail and command reports.

use gauss_core::{MemberId, Verb};
use std::fmt;
use std::future::Future;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::state::LifecycleState;
use crate::error::{OrchestratorError, Result};

/// One workflow step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Parameter and topology validation.
    Validate,
    /// Lifecycle state change.
    Transition(LifecycleState),
    /// Read of the workload resource.
    ReadWorkload,
    /// Creation of the workload resource.
    CreateWorkload,
    /// Replica count change.
    ScaleWorkload(i32),
    /// Readiness polling.
    AwaitReady,
    /// `gs_initdb` of one member.
    InitializeMember(MemberId),
    /// Listen address, port and client-auth rule of one member.
    ConfigureMember(MemberId),
    /// Replication links of every member.
    ConfigureReplication,
    /// Live process check of one member.
    ProbeMember(MemberId),
    /// Start of one member.
    StartMember(MemberId),
    /// Stop of one member.
    StopMember(MemberId),
    /// Deletion of the workload resource.
    DeleteWorkload,
    /// Removal of member data directories.
    RemoveDataDirectories,
    /// Post-failure cleanup hook.
    Cleanup,
    /// Port discovery on the primary.
    DiscoverPort,
    /// Creation of the shared access database when missing.
    EnsureAccessDatabase,
    /// Check of requested names against existing databases.
    CheckDatabases,
    /// Provisioning of one tenant.
    AddTenant(String),
    /// Removal of one tenant.
    RemoveTenant(String),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validate => f.write_str("validate"),
            Self::Transition(state) => write!(f, "enter {}", state),
            Self::ReadWorkload => f.write_str("read workload"),
            Self::CreateWorkload => f.write_str("create workload"),
            Self::ScaleWorkload(replicas) => write!(f, "scale workload to {}", replicas),
            Self::AwaitReady => f.write_str("await ready"),
            Self::InitializeMember(id) => write!(f, "initialize {}", id),
            Self::ConfigureMember(id) => write!(f, "configure {}", id),
            Self::ConfigureReplication => f.write_str("configure replication"),
            Self::ProbeMember(id) => write!(f, "probe {}", id),
            Self::StartMember(id) => write!(f, "start {}", id),
            Self::StopMember(id) => write!(f, "stop {}", id),
            Self::DeleteWorkload => f.write_str("delete workload"),
            Self::RemoveDataDirectories => f.write_str("remove data directories"),
            Self::Cleanup => f.write_str("cleanup"),
            Self::DiscoverPort => f.write_str("discover port"),
            Self::EnsureAccessDatabase => f.write_str("ensure access database"),
            Self::CheckDatabases => f.write_str("check databases"),
            Self::AddTenant(name) => write!(f, "add tenant {}", name),
            Self::RemoveTenant(name) => write!(f, "remove tenant {}", name),
        }
    }
}

/// How a step ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Succeeded,
    Failed(String),
    Skipped(String),
}

/// A step and how it ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: Step,
    pub status: StepStatus,
}

/// A step that failed, aborting its workflow.
#[derive(Debug)]
pub struct StepFailure {
    /// The failing step.
    pub step: Step,
    /// What went wrong.
    pub error: OrchestratorError,
}

impl StepFailure {
    pub fn new(step: Step, error: impl Into<OrchestratorError>) -> Self {
        Self {
            step,
            error: error.into(),
        }
    }
}

/// Overall result of one command.
#[derive(Debug)]
pub enum Outcome {
    Success,
    Failure {
        /// The step that aborted the command.
        step: Step,
        /// Its error.
        error: OrchestratorError,
    },
}

impl Outcome {
    /// Returns true on success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Everything one invocation did.
#[derive(Debug)]
pub struct CommandReport {
    /// The verb that ran.
    pub verb: Verb,
    /// Target cluster.
    pub instance: String,
    /// Invocation id, also carried by every log line of the run.
    pub invocation_id: Uuid,
    /// Success or the failing step.
    pub outcome: Outcome,
    /// Lifecycle state when the command ended.
    pub state: LifecycleState,
    /// Steps in execution order.
    pub trail: Vec<StepRecord>,
}

impl CommandReport {
    /// Returns true if the command succeeded.
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// Returns true if the command ended on a fatal control-plane error.
    pub fn is_fatal(&self) -> bool {
        matches!(&self.outcome, Outcome::Failure { error, .. } if error.is_fatal())
    }

    /// Returns the error of a failed command.
    pub fn error(&self) -> Option<&OrchestratorError> {
        match &self.outcome {
            Outcome::Success => None,
            Outcome::Failure { error, .. } => Some(error),
        }
    }

    /// Returns the records of `step`.
    pub fn records(&self, step: &Step) -> impl Iterator<Item = &StepRecord> + '_ {
        let step = step.clone();
        self.trail.iter().filter(move |r| r.step == step)
    }
}

impl fmt::Display for CommandReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Success => write!(f, "{} {} succeeded ({})", self.verb, self.instance, self.state),
            Outcome::Failure { step, error } => write!(
                f,
                "{} {} failed at '{}': {} ({})",
                self.verb, self.instance, step, error, self.state
            ),
        }
    }
}

/// Bookkeeping of one running command.
pub(crate) struct Run {
    verb: Verb,
    instance: String,
    invocation_id: Uuid,
    state: LifecycleState,
    trail: Vec<StepRecord>,
}

impl Run {
    pub(crate) fn new(verb: Verb, instance: impl Into<String>, invocation_id: Uuid, state: LifecycleState) -> Self {
        Self {
            verb,
            instance: instance.into(),
            invocation_id,
            state,
            trail: Vec::new(),
        }
    }

    pub(crate) fn state(&self) -> LifecycleState {
        self.state
    }

    /// Moves the lifecycle to `next`.
    pub(crate) fn enter(&mut self, next: LifecycleState) -> std::result::Result<(), StepFailure> {
        let from = self.state;
        self.state = from
            .transition(next)
            .map_err(|e| StepFailure::new(Step::Transition(next), e))?;
        info!(cluster = %self.instance, from = %from, to = %next, "Lifecycle state changed");
        Ok(())
    }

    /// Runs one step and records how it ended.
    pub(crate) async fn step<T, F>(&mut self, step: Step, work: F) -> std::result::Result<T, StepFailure>
    where
        F: Future<Output = Result<T>>,
    {
        info!(cluster = %self.instance, step = %step, "Step started");
        match work.await {
            Ok(value) => {
                info!(cluster = %self.instance, step = %step, "Step succeeded");
                self.record(step, StepStatus::Succeeded);
                Ok(value)
            }
            Err(e) => {
                if e.is_fatal() {
                    error!(cluster = %self.instance, step = %step, error = %e, "Step failed fatally");
                } else {
                    warn!(cluster = %self.instance, step = %step, error = %e, "Step failed");
                }
                self.record(step.clone(), StepStatus::Failed(e.to_string()));
                Err(StepFailure { step, error: e })
            }
        }
    }

    /// Records a step that did not need to run.
    pub(crate) fn skip(&mut self, step: Step, reason: impl Into<String>) {
        let reason = reason.into();
        info!(cluster = %self.instance, step = %step, reason = %reason, "Step skipped");
        self.record(step, StepStatus::Skipped(reason));
    }

    /// Sets the state found at the start of a command.
    pub(crate) fn observe(&mut self, state: LifecycleState) {
        debug!(cluster = %self.instance, state = %state, "Observed lifecycle state");
        self.state = state;
    }

    fn record(&mut self, step: Step, status: StepStatus) {
        self.trail.push(StepRecord { step, status });
    }

    /// Closes the run. A failure moves the lifecycle to `Failed`.
    pub(crate) fn finish(mut self, result: std::result::Result<(), StepFailure>) -> CommandReport {
        let outcome = match result {
            Ok(()) => {
                info!(cluster = %self.instance, verb = %self.verb, state = %self.state, "Command succeeded");
                Outcome::Success
            }
            Err(StepFailure { step, error }) => {
                if !self.state.is_terminal() {
                    self.state = LifecycleState::Failed;
                }
                error!(
                    cluster = %self.instance,
                    verb = %self.verb,
                    step = %step,
                    error = %error,
                    "Command failed"
                );
                Outcome::Failure { step, error }
            }
        };
        CommandReport {
            verb: self.verb,
            instance: self.instance,
            invocation_id: self.invocation_id,
            outcome,
            state: self.state,
            trail: self.trail,
        }
    }
}
