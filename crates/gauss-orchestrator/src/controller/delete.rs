//! Cluster deletion.

use gauss_core::Verb;
use tracing::{info, warn};

use super::report::{CommandReport, Run, Step, StepFailure};
use super::state::LifecycleState;
use super::Orchestrator;
use crate::exec::ExecTransport;
use crate::substrate::ControlPlane;

impl<C: ControlPlane, T: ExecTransport> Orchestrator<C, T> {
    /// Deletes the workload of `instance`, then its member data directories.
    ///
    /// An absent workload counts as deleted. Data directory removal is best
    /// effort: its failure is recorded in the trail but the command succeeds
    /// once the workload is gone.
    pub async fn delete(&self, instance: &str) -> CommandReport {
        let mut run = self.run(Verb::DeleteInstance, instance, LifecycleState::Unprovisioned);
        let result = self.delete_steps(instance, &mut run).await;
        run.finish(result)
    }

    async fn delete_steps(&self, instance: &str, run: &mut Run) -> Result<(), StepFailure> {
        let observed = match run.step(Step::ReadWorkload, self.substrate.read(instance)).await? {
            Some(handle) if handle.declared_replicas > 0 => LifecycleState::Running,
            Some(_) => LifecycleState::Stopped,
            None => LifecycleState::Unprovisioned,
        };
        run.observe(observed);

        run.step(Step::DeleteWorkload, self.substrate.delete(instance)).await?;
        run.enter(LifecycleState::Deleted)?;

        let removed = run
            .step(Step::RemoveDataDirectories, self.data_dirs.remove_instance(instance))
            .await;
        match removed {
            Ok(count) => info!(cluster = instance, removed = count, "Cluster deleted"),
            Err(failure) => warn!(
                cluster = instance,
                root = %self.data_dirs.root().display(),
                error = %failure.error,
                "Cluster deleted, data directories left behind"
            ),
        }
        Ok(())
    }
}
