//! Cluster stop, highest ordinal first.

use gauss_core::{MemberId, Verb};
use tracing::info;

use super::report::{CommandReport, Run, Step, StepFailure};
use super::state::LifecycleState;
use super::Orchestrator;
use crate::error::OrchestratorError;
use crate::exec::ExecTransport;
use crate::substrate::{ControlPlane, WORKLOAD_KIND};

impl<C: ControlPlane, T: ExecTransport> Orchestrator<C, T> {
    /// Stops every member of `instance`, replicas first.
    ///
    /// Members are visited in descending ordinal order. After each one the
    /// workload is scaled down to that member's ordinal, so a partial stop
    /// leaves the replica count matching the members still up.
    pub async fn stop(&self, instance: &str) -> CommandReport {
        let mut run = self.run(Verb::StopInstance, instance, LifecycleState::Unprovisioned);
        let result = self.stop_steps(instance, &mut run).await;
        run.finish(result)
    }

    async fn stop_steps(&self, instance: &str, run: &mut Run) -> Result<(), StepFailure> {
        let handle = run
            .step(Step::ReadWorkload, self.substrate.read(instance))
            .await?
            .ok_or_else(|| {
                StepFailure::new(Step::ReadWorkload, OrchestratorError::not_found(WORKLOAD_KIND, instance))
            })?;
        run.observe(LifecycleState::Running);
        run.enter(LifecycleState::StoppingMembers)?;

        let declared = handle.declared_replicas.max(0);
        for ordinal in (0..declared).rev() {
            let member = MemberId::for_ordinal(instance, ordinal as usize);

            let running = run
                .step(Step::ProbeMember(member.clone()), self.member_running(&member))
                .await?;
            if running {
                let command = self.commands.stop(&self.commands.member_dir(&member));
                run.step(
                    Step::StopMember(member.clone()),
                    self.executor.run(member.as_str(), &command),
                )
                .await?;
            } else {
                run.skip(Step::StopMember(member.clone()), "not running");
            }

            run.step(Step::ScaleWorkload(ordinal), self.substrate.scale(instance, ordinal))
                .await?;
        }

        run.enter(LifecycleState::Stopped)?;
        info!(cluster = instance, members = declared, "Cluster stopped");
        Ok(())
    }
}
