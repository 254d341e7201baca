//! Remote command execution inside member pods.
//!
//! - [`channel`]: The transport and channel traits
//! - [`lines`]: Line assembly over chunked output
//! - [`executor`]: The [`RemoteExecutor`]
//! - [`kubernetes`]: The pod `exec` transport

pub mod channel;
pub mod executor;
pub mod kubernetes;
pub mod lines;

pub use channel::{ChannelEvent, ExecChannel, ExecTransport};
pub use executor::{RemoteCommandResult, RemoteExecutor};
pub use kubernetes::KubeExecTransport;
pub use lines::LineAssembler;
