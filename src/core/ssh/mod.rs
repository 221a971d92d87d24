mod client;
mod runner;

pub use client::{execute_local_command, is_local_host, CommandOutput, SshClient};
pub use runner::{CommandRunner, HostOutput, RecordingRunner, RemoteRunner, RunOutput};
