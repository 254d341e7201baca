//! Kubernetes exec transport.

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::{AttachParams, AttachedProcess};
use kube::{Api, Client};
use std::pin::Pin;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use super::channel::{ChannelEvent, ExecChannel, ExecTransport};
use crate::error::{OrchestratorError, Result};

const READ_BUFFER: usize = 8 * 1024;

type BoxedReader = Pin<Box<dyn AsyncRead + Send>>;

/// [`ExecTransport`] over the pod `exec` subresource.
#[derive(Clone)]
pub struct KubeExecTransport {
    client: Client,
}

impl KubeExecTransport {
    /// Creates a transport over an existing client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExecTransport for KubeExecTransport {
    async fn open(&self, pod: &str, namespace: &str, argv: Vec<String>) -> Result<Box<dyn ExecChannel>> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = AttachParams::default().stdin(false).stdout(true).stderr(true);

        let mut process = pods
            .exec(pod, argv, &params)
            .await
            .map_err(|e| OrchestratorError::remote_exec(pod, format!("failed to open exec channel: {}", e)))?;

        let stdout = process.stdout().map(|r| Box::pin(r) as BoxedReader);
        let stderr = process.stderr().map(|r| Box::pin(r) as BoxedReader);
        let status = process.take_status().map(|s| s.boxed());

        Ok(Box::new(KubeExecChannel {
            pod: pod.to_string(),
            _process: process,
            stdout,
            stderr,
            status,
        }))
    }
}

/// A live exec session.
struct KubeExecChannel {
    pod: String,
    _process: AttachedProcess,
    stdout: Option<BoxedReader>,
    stderr: Option<BoxedReader>,
    status: Option<BoxFuture<'static, Option<Status>>>,
}

enum Read {
    Stdout(std::io::Result<usize>),
    Stderr(std::io::Result<usize>),
}

impl KubeExecChannel {
    async fn finish(&mut self) -> ChannelEvent {
        let exit_status = match self.status.take() {
            Some(status) => status.await.as_ref().and_then(exit_status_of),
            None => None,
        };
        debug!(pod = %self.pod, ?exit_status, "Exec channel closed");
        ChannelEvent::Closed { exit_status }
    }
}

#[async_trait]
impl ExecChannel for KubeExecChannel {
    async fn poll(&mut self, wait: Duration) -> Result<ChannelEvent> {
        if self.stdout.is_none() && self.stderr.is_none() {
            return Ok(self.finish().await);
        }

        let mut out_buf = vec![0u8; READ_BUFFER];
        let mut err_buf = vec![0u8; READ_BUFFER];

        let read = {
            let stdout = self.stdout.as_mut();
            let stderr = self.stderr.as_mut();
            let read_stdout = async {
                match stdout {
                    Some(r) => r.read(&mut out_buf).await,
                    None => std::future::pending().await,
                }
            };
            let read_stderr = async {
                match stderr {
                    Some(r) => r.read(&mut err_buf).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                n = read_stdout => Some(Read::Stdout(n)),
                n = read_stderr => Some(Read::Stderr(n)),
                _ = tokio::time::sleep(wait) => None,
            }
        };

        let event = match read {
            None => ChannelEvent::Idle,
            Some(Read::Stdout(Ok(0))) => {
                self.stdout = None;
                ChannelEvent::Idle
            }
            Some(Read::Stderr(Ok(0))) => {
                self.stderr = None;
                ChannelEvent::Idle
            }
            Some(Read::Stdout(Ok(n))) => ChannelEvent::Stdout(out_buf[..n].to_vec()),
            Some(Read::Stderr(Ok(n))) => ChannelEvent::Stderr(err_buf[..n].to_vec()),
            Some(Read::Stdout(Err(e))) | Some(Read::Stderr(Err(e))) => {
                return Err(OrchestratorError::remote_exec(
                    &self.pod,
                    format!("exec channel read failed: {}", e),
                ));
            }
        };
        Ok(event)
    }
}

/// Extracts the exit code from the terminal status of an exec session.
fn exit_status_of(status: &Status) -> Option<i32> {
    if status.status.as_deref() == Some("Success") {
        return Some(0);
    }
    status
        .details
        .as_ref()
        .and_then(|d| d.causes.as_ref())
        .and_then(|causes| {
            causes
                .iter()
                .find(|c| c.reason.as_deref() == Some("ExitCode"))
                .and_then(|c| c.message.as_deref())
                .and_then(|m| m.trim().parse().ok())
        })
}
