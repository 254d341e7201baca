//! Cluster creation.

use gauss_core::{ClusterSpec, Verb};
use tracing::{info, warn};

use super::cleanup::Teardown;
use super::report::{CommandReport, Run, Step, StepFailure};
use super::state::LifecycleState;
use super::Orchestrator;
use crate::commands::start_kind;
use crate::exec::ExecTransport;
use crate::replication::ReplicationTopologyConfigurer;
use crate::substrate::ControlPlane;

impl<C: ControlPlane, T: ExecTransport> Orchestrator<C, T> {
    /// Provisions `cluster` and starts every member.
    ///
    /// Refuses a cluster whose workload already exists without touching it.
    /// After any failure past workload creation the cleanup hook runs, unless
    /// the failure was a fatal control-plane error.
    pub async fn create(&self, cluster: &ClusterSpec) -> CommandReport {
        let mut run = self.run(Verb::CreateInstance, cluster.name(), LifecycleState::Unprovisioned);
        info!(cluster = cluster.name(), members = cluster.len(), mode = ?cluster.mode(), "Creating cluster");

        let mut provisioned = false;
        let mut result = self.create_steps(cluster, &mut run, &mut provisioned).await;

        let needs_cleanup = matches!(&result, Err(failure) if provisioned && !failure.error.is_fatal());
        if needs_cleanup {
            warn!(cluster = cluster.name(), hook = self.cleanup.name(), "Running cleanup after failed create");
            let teardown: &dyn Teardown = self;
            let cleanup = run
                .step(Step::Cleanup, self.cleanup.after_failed_create(cluster.name(), teardown))
                .await;
            if let Err(cleanup_failure) = cleanup {
                if cleanup_failure.error.is_fatal() {
                    result = Err(cleanup_failure);
                }
            }
        }

        run.finish(result)
    }

    async fn create_steps(
        &self,
        cluster: &ClusterSpec,
        run: &mut Run,
        provisioned: &mut bool,
    ) -> Result<(), StepFailure> {
        let name = cluster.name();

        run.enter(LifecycleState::Provisioning)?;
        run.step(Step::CreateWorkload, self.substrate.create(cluster)).await?;
        *provisioned = true;

        run.enter(LifecycleState::AwaitingReady)?;
        run.step(Step::AwaitReady, self.substrate.wait_ready(name)).await?;

        run.enter(LifecycleState::Initializing)?;
        for member in cluster.members() {
            let pod = member.id.as_str();
            run.step(
                Step::InitializeMember(member.id.clone()),
                self.executor.run(pod, &self.commands.initialize(member)),
            )
            .await?;
            run.step(
                Step::ConfigureMember(member.id.clone()),
                self.executor.run(pod, &self.commands.configure(member)),
            )
            .await?;
        }

        if cluster.is_multi_member() {
            let configurer = ReplicationTopologyConfigurer::new(&self.commands);
            run.step(Step::ConfigureReplication, configurer.apply(cluster, &self.executor))
                .await?;
        } else {
            run.skip(Step::ConfigureReplication, "single member");
        }

        run.enter(LifecycleState::StartingMembers)?;
        for member in cluster.members() {
            let kind = start_kind(cluster.mode(), member.role());
            run.step(
                Step::StartMember(member.id.clone()),
                self.executor
                    .run(member.id.as_str(), &self.commands.start(&member.storage_dir, kind)),
            )
            .await?;
        }

        run.enter(LifecycleState::Running)?;
        info!(cluster = name, members = cluster.len(), "Cluster running");
        Ok(())
    }
}
