//! Command runners: the seam between the task pipeline and the transport.
//!
//! A runner takes one rendered shell string and executes it on every host of
//! the site, sequentially, in configured order. The pipeline never sees SSH.

use std::sync::Mutex;

use serde::Serialize;

use super::client::{CommandOutput, SshClient};
use crate::error::Result;
use crate::server::Server;

/// Output of one command on one host.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostOutput {
    pub server_id: String,
    pub host: String,
    #[serde(flatten)]
    pub output: CommandOutput,
}

/// Output of one command across every host it ran on.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutput {
    pub hosts: Vec<HostOutput>,
}

impl RunOutput {
    /// A command succeeds only if it succeeded everywhere.
    pub fn success(&self) -> bool {
        self.hosts.iter().all(|h| h.output.success)
    }

    pub fn first_failure(&self) -> Option<&HostOutput> {
        self.hosts.iter().find(|h| !h.output.success)
    }

    pub fn failed_hosts(&self) -> Vec<String> {
        self.hosts
            .iter()
            .filter(|h| !h.output.success)
            .map(|h| h.host.clone())
            .collect()
    }

    /// Stdout of the first host, for read-only queries.
    pub fn first_stdout(&self) -> Option<&str> {
        self.hosts.first().map(|h| h.output.stdout.as_str())
    }
}

pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &str) -> RunOutput;
}

/// Runs commands over SSH on each configured server.
pub struct RemoteRunner {
    clients: Vec<SshClient>,
}

impl RemoteRunner {
    pub fn new(servers: &[Server]) -> Result<Self> {
        let clients = servers
            .iter()
            .map(SshClient::from_server)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { clients })
    }
}

impl CommandRunner for RemoteRunner {
    fn run(&self, command: &str) -> RunOutput {
        let hosts = self
            .clients
            .iter()
            .map(|client| {
                log_status!("ssh", "{}: {}", client.host, command);
                HostOutput {
                    server_id: client.server_id.clone(),
                    host: client.host.clone(),
                    output: client.execute(command),
                }
            })
            .collect();
        RunOutput { hosts }
    }
}

/// Records commands instead of running them.
///
/// Backs `--dry-run`; every command succeeds unless it contains one of the
/// configured failure substrings, which makes it the pipeline's test double too.
#[derive(Default)]
pub struct RecordingRunner {
    commands: Mutex<Vec<String>>,
    fail_matching: Vec<String>,
    stdout: String,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every command containing `pattern`.
    pub fn failing_on(mut self, pattern: impl Into<String>) -> Self {
        self.fail_matching.push(pattern.into());
        self
    }

    /// Stdout returned for every successful command.
    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .map(|commands| commands.clone())
            .unwrap_or_default()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &str) -> RunOutput {
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(command.to_string());
        }

        let output = if self.fail_matching.iter().any(|p| command.contains(p.as_str())) {
            CommandOutput::failed(1, format!("simulated failure: {}", command))
        } else {
            CommandOutput::ok(self.stdout.clone())
        };

        RunOutput {
            hosts: vec![HostOutput {
                server_id: "dry-run".to_string(),
                host: "dry-run".to_string(),
                output,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_runner_records_in_order() {
        let runner = RecordingRunner::new();
        runner.run("mkdir -p /a");
        runner.run("chmod 2775 /a");
        assert_eq!(runner.commands(), vec!["mkdir -p /a", "chmod 2775 /a"]);
    }

    #[test]
    fn recording_runner_fails_matching_commands() {
        let runner = RecordingRunner::new().failing_on("updatedb");
        assert!(runner.run("drush cc all").success());

        let output = runner.run("drush updatedb -y");
        assert!(!output.success());
        assert_eq!(output.failed_hosts(), vec!["dry-run"]);
        assert_eq!(output.first_failure().unwrap().output.exit_code, 1);
    }

    #[test]
    fn run_output_fails_if_any_host_fails() {
        let output = RunOutput {
            hosts: vec![
                HostOutput {
                    server_id: "web1".to_string(),
                    host: "web1.example.com".to_string(),
                    output: CommandOutput::ok(""),
                },
                HostOutput {
                    server_id: "web2".to_string(),
                    host: "web2.example.com".to_string(),
                    output: CommandOutput::failed(2, "No such file"),
                },
            ],
        };
        assert!(!output.success());
        assert_eq!(output.failed_hosts(), vec!["web2.example.com"]);
    }
}
