//! Remote-execution channel abstraction.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// One observation of an exec channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A chunk of standard output.
    Stdout(Vec<u8>),

    /// A chunk of standard error.
    Stderr(Vec<u8>),

    /// Nothing arrived within the poll window.
    Idle,

    /// The channel closed. No further events follow.
    Closed {
        /// Exit status, when the remote side reported one.
        exit_status: Option<i32>,
    },
}

/// A live command-execution session inside one container.
///
/// Output arrives in arbitrary chunks; callers must not assume a chunk holds
/// whole lines.
#[async_trait]
pub trait ExecChannel: Send {
    /// Waits up to `wait` for the next event.
    async fn poll(&mut self, wait: Duration) -> Result<ChannelEvent>;
}

/// Opens exec channels into pods.
#[async_trait]
pub trait ExecTransport: Send + Sync {
    /// Starts `argv` in pod `pod` of `namespace`.
    async fn open(&self, pod: &str, namespace: &str, argv: Vec<String>) -> Result<Box<dyn ExecChannel>>;
}
