//! Replication topology configuration.

use gauss_core::replication::full_mesh;
use gauss_core::{ClusterSpec, MemberId};
use tracing::info;

use crate::commands::{GaussCommands, RemoteCommand};
use crate::error::Result;
use crate::exec::{ExecTransport, RemoteExecutor};
use crate::substrate::ControlPlane;

/// Appends the full replication mesh to the configuration of every member.
pub struct ReplicationTopologyConfigurer<'a> {
    commands: &'a GaussCommands,
}

impl<'a> ReplicationTopologyConfigurer<'a> {
    pub fn new(commands: &'a GaussCommands) -> Self {
        Self { commands }
    }

    /// Returns the commands to run, in emission order.
    ///
    /// Outer loop over members in spec order, inner loop over every other
    /// member. Empty for a single-member cluster.
    pub fn plan(&self, cluster: &ClusterSpec) -> Vec<(MemberId, RemoteCommand)> {
        full_mesh(cluster)
            .into_iter()
            .flat_map(|(member, links)| {
                links
                    .into_iter()
                    .map(move |link| (member.id.clone(), self.commands.replication(member, &link)))
            })
            .collect()
    }

    /// Runs the plan through `executor`, stopping at the first failure.
    ///
    /// Returns the number of links written.
    pub async fn apply<C, T>(&self, cluster: &ClusterSpec, executor: &RemoteExecutor<C, T>) -> Result<usize>
    where
        C: ControlPlane,
        T: ExecTransport,
    {
        let plan = self.plan(cluster);
        if plan.is_empty() {
            return Ok(0);
        }
        for (member, command) in &plan {
            executor.run(member.as_str(), command).await?;
        }
        info!(cluster = cluster.name(), links = plan.len(), "Replication topology configured");
        Ok(plan.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::GaussSettings;
    use crate::testing::FakeCluster;

    fn cluster(size: usize) -> ClusterSpec {
        let mut builder = ClusterSpec::builder("orders", "/opt/data1/greenopengauss/data");
        for i in 0..size {
            builder = builder.member(format!("orders-{}", i), format!("10.0.0.{}", i + 1), 5432 + i as u16);
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_single_member_plans_nothing() {
        let commands = GaussCommands::new(GaussSettings::default(), "dbuser");
        assert!(ReplicationTopologyConfigurer::new(&commands).plan(&cluster(1)).is_empty());
    }

    #[test]
    fn test_plan_order_and_slots() {
        let commands = GaussCommands::new(GaussSettings::default(), "dbuser");
        let plan = ReplicationTopologyConfigurer::new(&commands).plan(&cluster(3));

        assert_eq!(plan.len(), 6);
        let owners: Vec<&str> = plan.iter().map(|(m, _)| m.as_str()).collect();
        assert_eq!(owners, vec!["orders-0", "orders-0", "orders-1", "orders-1", "orders-2", "orders-2"]);

        assert!(plan[0].1.script.contains("replconninfo2 = 'localhost=10.0.0.1 localport=5433"));
        assert!(plan[1].1.script.contains("replconninfo3 = "));
        assert!(plan[2].1.script.contains("replconninfo1 = "));
        assert!(plan[3].1.script.contains("replconninfo3 = "));
        assert!(plan[5].1.script.contains(
            "remotehost=10.0.0.2 remoteport=5434 remoteheartbeatport=5438 remoteservice=5437"
        ));
    }

    #[tokio::test]
    async fn test_apply_runs_every_link_in_owner_pod() {
        let fake = FakeCluster::new();
        fake.add_workload("orders", 3);
        let executor = fake.executor();
        let commands = GaussCommands::new(GaussSettings::default(), "dbuser");

        let written = ReplicationTopologyConfigurer::new(&commands)
            .apply(&cluster(3), &executor)
            .await
            .unwrap();

        assert_eq!(written, 6);
        let pods: Vec<String> = fake.commands().into_iter().map(|c| c.pod).collect();
        assert_eq!(pods, vec!["orders-0", "orders-0", "orders-1", "orders-1", "orders-2", "orders-2"]);
    }

    #[tokio::test]
    async fn test_apply_single_member_is_a_no_op() {
        let fake = FakeCluster::new();
        fake.add_workload("orders", 1);
        let executor = fake.executor();
        let commands = GaussCommands::new(GaussSettings::default(), "dbuser");

        let written = ReplicationTopologyConfigurer::new(&commands)
            .apply(&cluster(1), &executor)
            .await
            .unwrap();

        assert_eq!(written, 0);
        assert!(fake.commands().is_empty());
    }
}
