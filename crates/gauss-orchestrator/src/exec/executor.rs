//! The remote executor.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::channel::{ChannelEvent, ExecTransport};
use super::lines::LineAssembler;
use crate::classify::{MarkerTable, OutputClassifier, Verdict};
use crate::commands::RemoteCommand;
use crate::error::{OrchestratorError, Result};
use crate::substrate::{ControlPlane, SubstrateClient};

/// Captured output of one remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemoteCommandResult {
    /// Exit status from the channel's terminal status, if reported.
    pub exit_status: Option<i32>,

    /// Stdout lines in arrival order.
    pub stdout: Vec<String>,

    /// Stderr lines in arrival order. Logged, never classified.
    pub stderr: Vec<String>,
}

impl RemoteCommandResult {
    /// Returns stdout joined with newlines.
    pub fn stdout_text(&self) -> String {
        self.stdout.join("\n")
    }

    /// Returns the last non-empty stdout line.
    pub fn last_line(&self) -> Option<&str> {
        self.stdout
            .iter()
            .rev()
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
    }

    /// Returns true if stdout carries at least one non-empty line.
    pub fn has_output(&self) -> bool {
        self.last_line().is_some()
    }
}

/// Runs shell commands inside member pods.
///
/// Every command is wrapped as `bash -c "<prelude> && <command>"`. The target
/// pod must be running; the executor never opens a channel into a pod that is
/// not. Members are handled one at a time: a call blocks until the channel
/// closes.
pub struct RemoteExecutor<C, T> {
    substrate: Arc<SubstrateClient<C>>,
    transport: Arc<T>,
    classifier: Arc<dyn OutputClassifier>,
    prelude: String,
    poll_interval: Duration,
}

impl<C: ControlPlane, T: ExecTransport> RemoteExecutor<C, T> {
    /// Creates an executor using the standard marker table.
    pub fn new(substrate: Arc<SubstrateClient<C>>, transport: Arc<T>, prelude: impl Into<String>) -> Self {
        Self {
            substrate,
            transport,
            classifier: Arc::new(MarkerTable::standard()),
            prelude: prelude.into(),
            poll_interval: Duration::from_secs(1),
        }
    }

    /// Sets the output classifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn OutputClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Sets the channel poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn argv(&self, script: &str) -> Vec<String> {
        let line = if self.prelude.is_empty() {
            script.to_string()
        } else {
            format!("{} && {}", self.prelude, script)
        };
        vec!["bash".to_string(), "-c".to_string(), line]
    }

    /// Executes `command` in `pod` and returns its captured output.
    ///
    /// Fails with `TargetNotRunning` before opening a channel if the pod is not
    /// running.
    pub async fn execute(&self, pod: &str, command: &RemoteCommand) -> Result<RemoteCommandResult> {
        if !self.substrate.is_pod_running(pod).await? {
            warn!(pod, namespace = self.substrate.namespace(), "Pod not running");
            return Err(OrchestratorError::target_not_running(pod));
        }

        info!(pod, kind = %command.kind, command = %command.display, "Executing remote command");
        let mut channel = self
            .transport
            .open(pod, self.substrate.namespace(), self.argv(&command.script))
            .await?;

        let mut stdout = LineAssembler::new();
        let mut stderr = LineAssembler::new();
        let mut result = RemoteCommandResult::default();

        loop {
            match channel.poll(self.poll_interval).await? {
                ChannelEvent::Stdout(chunk) => result.stdout.extend(stdout.push(&chunk)),
                ChannelEvent::Stderr(chunk) => {
                    for line in stderr.push(&chunk) {
                        warn!(pod, stderr = %line, "Remote command stderr");
                        result.stderr.push(line);
                    }
                }
                ChannelEvent::Idle => continue,
                ChannelEvent::Closed { exit_status } => {
                    result.exit_status = exit_status;
                    break;
                }
            }
        }

        result.stdout.extend(stdout.finish());
        if let Some(line) = stderr.finish() {
            warn!(pod, stderr = %line, "Remote command stderr");
            result.stderr.push(line);
        }

        debug!(
            pod,
            exit_status = ?result.exit_status,
            stdout_lines = result.stdout.len(),
            stderr_lines = result.stderr.len(),
            "Remote command finished"
        );
        Ok(result)
    }

    /// Executes `command` and classifies its output.
    ///
    /// Fails with `RemoteExec` when the classifier rejects the output.
    pub async fn run(&self, pod: &str, command: &RemoteCommand) -> Result<RemoteCommandResult> {
        let result = self.execute(pod, command).await?;
        match self.classifier.classify(command.kind, &result) {
            Verdict::Success => {
                info!(pod, kind = %command.kind, "Remote command succeeded");
                Ok(result)
            }
            Verdict::Failure(reason) => {
                warn!(pod, kind = %command.kind, reason = %reason, stdout = ?result.stdout, "Remote command failed");
                Err(OrchestratorError::remote_exec(
                    pod,
                    format!("{} {}", command.kind, reason),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::CommandKind;
    use crate::testing::{FakeCluster, FakeReply};

    fn command(kind: CommandKind, script: &str) -> RemoteCommand {
        RemoteCommand::new(kind, script)
    }

    #[tokio::test]
    async fn test_refuses_pod_that_is_not_running() {
        let fake = FakeCluster::new();
        let executor = fake.executor();

        let err = executor
            .execute("orders-0", &command(CommandKind::Probe, "true"))
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::TargetNotRunning { .. }));
        assert!(fake.commands().is_empty());
    }

    #[tokio::test]
    async fn test_collects_chunked_output_and_wraps_prelude() {
        let fake = FakeCluster::new();
        fake.add_workload("orders", 1);
        fake.reply(
            "gs_ctl start",
            FakeReply::stdout("waiting for server to start...\nserver started\n").with_stderr("warning: slow disk\n"),
        );
        let executor = fake.executor();

        let result = executor
            .run("orders-0", &command(CommandKind::StartSingle, "gs_ctl start -D /data/orders-0"))
            .await
            .unwrap();

        assert_eq!(result.stdout, vec!["waiting for server to start...", "server started"]);
        assert_eq!(result.stderr, vec!["warning: slow disk"]);
        assert_eq!(result.exit_status, Some(0));

        let recorded = fake.commands();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].pod, "orders-0");
        assert_eq!(
            recorded[0].argv,
            vec![
                "bash".to_string(),
                "-c".to_string(),
                "source /home/dbuser/.bashrc && gs_ctl start -D /data/orders-0".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_stderr_is_never_classified() {
        let fake = FakeCluster::new();
        fake.add_workload("orders", 1);
        fake.reply("gs_ctl stop", FakeReply::stdout("").with_stderr("server stopped\n"));
        let executor = fake.executor();

        let err = executor
            .run("orders-0", &command(CommandKind::StopMember, "gs_ctl stop -D /data/orders-0"))
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::RemoteExec { .. }));
    }

    #[test]
    fn test_last_line() {
        let result = RemoteCommandResult {
            exit_status: Some(0),
            stdout: vec!["5432".into(), "5433".into(), "  ".into()],
            stderr: Vec::new(),
        };
        assert_eq!(result.last_line(), Some("5433"));
        assert!(RemoteCommandResult::default().last_line().is_none());
    }
}
