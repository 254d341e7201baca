//! Cluster start.

use gauss_core::{ClusterMode, ClusterSpec, MemberId, Role, Verb};
use tracing::{debug, info};

use super::report::{CommandReport, Run, Step, StepFailure};
use super::state::LifecycleState;
use super::{ensure_topology_matches, Orchestrator};
use crate::commands::start_kind;
use crate::error::OrchestratorError;
use crate::exec::ExecTransport;
use crate::substrate::{ControlPlane, WORKLOAD_KIND};

impl<C: ControlPlane, T: ExecTransport> Orchestrator<C, T> {
    /// Brings `instance` back up.
    ///
    /// An existing workload is scaled to the topology size recorded on it. An
    /// absent one is re-created from `topology`, and without a topology the
    /// command fails with `NotFound`. A member that already has a live server
    /// process aborts the command before it is started twice.
    pub async fn start(&self, instance: &str, topology: Option<&ClusterSpec>) -> CommandReport {
        let mut run = self.run(Verb::StartInstance, instance, LifecycleState::Unprovisioned);
        let result = self.start_steps(instance, topology, &mut run).await;
        run.finish(result)
    }

    async fn start_steps(
        &self,
        instance: &str,
        topology: Option<&ClusterSpec>,
        run: &mut Run,
    ) -> Result<(), StepFailure> {
        let handle = run.step(Step::ReadWorkload, self.substrate.read(instance)).await?;

        let size = match (handle, topology) {
            (Some(handle), _) => {
                run.observe(LifecycleState::Stopped);
                if topology.is_some() {
                    debug!(cluster = instance, "Workload exists, topology file ignored");
                }
                let size = handle
                    .topology_size()
                    .map_err(|e| StepFailure::new(Step::ReadWorkload, e))?;
                run.enter(LifecycleState::Provisioning)?;
                let replicas = i32::try_from(size).map_err(|_| {
                    StepFailure::new(
                        Step::ReadWorkload,
                        OrchestratorError::configuration(format!("topology size {} is out of range", size)),
                    )
                })?;
                run.step(Step::ScaleWorkload(replicas), self.substrate.scale(instance, replicas))
                    .await?;
                size
            }
            (None, Some(cluster)) => {
                ensure_topology_matches(instance, cluster.name())
                    .map_err(|e| StepFailure::new(Step::Validate, e))?;
                run.enter(LifecycleState::Provisioning)?;
                run.step(Step::CreateWorkload, self.substrate.create(cluster)).await?;
                cluster.len()
            }
            (None, None) => {
                return Err(StepFailure::new(
                    Step::ReadWorkload,
                    OrchestratorError::not_found(WORKLOAD_KIND, instance),
                ));
            }
        };

        run.enter(LifecycleState::AwaitingReady)?;
        run.step(Step::AwaitReady, self.substrate.wait_ready(instance)).await?;

        run.enter(LifecycleState::StartingMembers)?;
        let mode = ClusterMode::for_size(size);
        for ordinal in 0..size {
            let member = MemberId::for_ordinal(instance, ordinal);
            run.step(Step::ProbeMember(member.clone()), async {
                if self.member_running(&member).await? {
                    Err(OrchestratorError::already_running(member.as_str()))
                } else {
                    Ok(())
                }
            })
            .await?;

            let kind = start_kind(mode, Role::for_ordinal(ordinal));
            let command = self.commands.start(&self.commands.member_dir(&member), kind);
            run.step(
                Step::StartMember(member.clone()),
                self.executor.run(member.as_str(), &command),
            )
            .await?;
        }

        run.enter(LifecycleState::Running)?;
        info!(cluster = instance, members = size, "Cluster running");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::controller::{LifecycleState, Outcome, Step};
    use crate::error::OrchestratorError;
    use crate::testing::FakeCluster;
    use gauss_core::{ClusterSpec, MemberId};

    #[tokio::test]
    async fn test_start_scales_to_recorded_size() {
        let fake = FakeCluster::new();
        fake.add_workload("orders", 3);
        fake.scale_silently("orders", 0);

        let report = fake.orchestrator().start("orders", None).await;

        assert!(report.is_success(), "{}", report);
        assert_eq!(report.state, LifecycleState::Running);
        assert_eq!(fake.scales(), vec![("orders".to_string(), 3)]);

        let starts: Vec<String> = fake
            .commands()
            .into_iter()
            .filter(|c| c.script().contains("gs_ctl"))
            .map(|c| c.script().to_string())
            .collect();
        assert_eq!(starts.len(), 3);
        assert!(starts[0].contains("start -D /opt/data1/greenopengauss/data/orders-0 -M primary"));
        assert!(starts[1].contains("build -D /opt/data1/greenopengauss/data/orders-1 -b full"));
        assert!(starts[2].contains("build -D /opt/data1/greenopengauss/data/orders-2 -b full"));
    }

    #[tokio::test]
    async fn test_start_single_member() {
        let fake = FakeCluster::new();
        fake.add_workload("orders", 1);

        let report = fake.orchestrator().start("orders", None).await;

        assert!(report.is_success(), "{}", report);
        assert!(fake
            .commands()
            .iter()
            .any(|c| c.script().contains("start -D /opt/data1/greenopengauss/data/orders-0 -Z single_node")));
    }

    #[tokio::test]
    async fn test_start_refuses_live_member() {
        let fake = FakeCluster::new();
        fake.add_workload("orders", 2);
        fake.mark_running("orders-1");

        let report = fake.orchestrator().start("orders", None).await;

        match &report.outcome {
            Outcome::Failure { step, error } => {
                assert_eq!(*step, Step::ProbeMember(MemberId::new("orders-1")));
                assert!(matches!(error, OrchestratorError::AlreadyRunning { .. }));
            }
            Outcome::Success => panic!("start should fail"),
        }
        assert!(fake.commands().iter().all(|c| !c.script().contains("build")));
    }

    #[tokio::test]
    async fn test_start_absent_without_topology() {
        let fake = FakeCluster::new();

        let report = fake.orchestrator().start("orders", None).await;

        assert!(report.error().unwrap().is_not_found());
        assert_eq!(fake.mutations(), 0);
    }

    #[tokio::test]
    async fn test_start_absent_recreates_from_topology() {
        let fake = FakeCluster::new();
        let cluster = ClusterSpec::builder("orders", "/opt/data1/greenopengauss/data")
            .member("orders-0", "10.0.0.1", 5432)
            .member("orders-1", "10.0.0.2", 5433)
            .build()
            .unwrap();

        let report = fake.orchestrator().start("orders", Some(&cluster)).await;

        assert!(report.is_success(), "{}", report);
        assert_eq!(fake.workload("orders").unwrap().declared_replicas, 2);
        assert!(fake.commands().iter().all(|c| !c.script().contains("gs_initdb")));
    }

    #[tokio::test]
    async fn test_start_rejects_mismatched_topology() {
        let fake = FakeCluster::new();
        let cluster = ClusterSpec::builder("billing", "/data")
            .member("billing-0", "10.0.0.1", 5432)
            .build()
            .unwrap();

        let report = fake.orchestrator().start("orders", Some(&cluster)).await;

        assert!(report.error().unwrap().is_validation());
        assert_eq!(fake.mutations(), 0);
    }

    #[tokio::test]
    async fn test_start_requires_topology_annotation() {
        let fake = FakeCluster::new();
        fake.add_workload("orders", 2);
        fake.remove_annotation("orders");

        let report = fake.orchestrator().start("orders", None).await;

        assert!(matches!(report.error(), Some(OrchestratorError::Configuration(_))));
        assert!(fake.scales().is_empty());
    }
}
