//! Post-failure cleanup after a failed create.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::Result;

/// Destructive operations a cleanup hook may use.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Teardown: Send + Sync {
    /// Deletes the workload of `instance`. Absence counts as success.
    async fn delete_workload(&self, instance: &str) -> Result<()>;

    /// Removes the data directories of `instance`, returning how many went.
    async fn remove_data(&self, instance: &str) -> Result<usize>;
}

/// Runs after a create fails past workload creation.
///
/// Never runs after a fatal control-plane error.
#[async_trait]
pub trait CleanupHook: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Cleans up after the failed create of `instance`.
    async fn after_failed_create(&self, instance: &str, teardown: &dyn Teardown) -> Result<()>;
}

/// Leaves everything in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCleanup;

#[async_trait]
impl CleanupHook for NoopCleanup {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn after_failed_create(&self, instance: &str, _teardown: &dyn Teardown) -> Result<()> {
        info!(cluster = instance, "Rollback disabled, leaving partial cluster in place");
        Ok(())
    }
}

/// Deletes the workload and the member data directories.
#[derive(Debug, Clone, Copy, Default)]
pub struct RollbackCleanup;

#[async_trait]
impl CleanupHook for RollbackCleanup {
    fn name(&self) -> &'static str {
        "rollback"
    }

    async fn after_failed_create(&self, instance: &str, teardown: &dyn Teardown) -> Result<()> {
        warn!(cluster = instance, "Rolling back failed create");
        teardown.delete_workload(instance).await?;
        let removed = teardown.remove_data(instance).await?;
        info!(cluster = instance, removed, "Rollback complete");
        Ok(())
    }
}

/// Returns the hook selected by `rollback_on_failed_create`.
pub fn cleanup_hook(rollback_on_failed_create: bool) -> Box<dyn CleanupHook> {
    if rollback_on_failed_create {
        Box::new(RollbackCleanup)
    } else {
        Box::new(NoopCleanup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrchestratorError;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn test_noop_touches_nothing() {
        let teardown = MockTeardown::new();
        NoopCleanup.after_failed_create("orders", &teardown).await.unwrap();
    }

    #[tokio::test]
    async fn test_rollback_deletes_workload_then_data() {
        let mut seq = mockall::Sequence::new();
        let mut teardown = MockTeardown::new();
        teardown
            .expect_delete_workload()
            .with(eq("orders"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        teardown
            .expect_remove_data()
            .with(eq("orders"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(3));

        RollbackCleanup.after_failed_create("orders", &teardown).await.unwrap();
    }

    #[tokio::test]
    async fn test_rollback_stops_when_delete_fails() {
        let mut teardown = MockTeardown::new();
        teardown
            .expect_delete_workload()
            .returning(|_| Err(OrchestratorError::substrate("delete statefulset", 5, "unavailable")));
        teardown.expect_remove_data().never();

        let err = RollbackCleanup.after_failed_create("orders", &teardown).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_selection() {
        assert_eq!(cleanup_hook(false).name(), "noop");
        assert_eq!(cleanup_hook(true).name(), "rollback");
    }
}
