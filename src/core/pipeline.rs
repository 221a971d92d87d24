//! Sequential execution of planned tasks against a command runner.

use serde::Serialize;

use crate::error::{Error, RemoteCommandFailedDetails, Result, TargetDetails};
use crate::ssh::{CommandRunner, HostOutput};
use crate::tasks::{ErrorPolicy, TaskContext, TaskDescriptor};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub command: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_hosts: Vec<String>,
    pub hosts: Vec<HostOutput>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRunResult {
    pub task: String,
    pub policy: ErrorPolicy,
    pub status: PipelineRunStatus,
    pub commands: Vec<CommandResult>,
}

impl TaskRunResult {
    pub fn failed_commands(&self) -> Vec<String> {
        self.commands
            .iter()
            .filter(|c| !c.success)
            .map(|c| c.command.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunResult {
    pub tasks: Vec<TaskRunResult>,
    pub status: PipelineRunStatus,
    pub summary: PipelineRunSummary,
}

impl PipelineRunResult {
    pub fn from_tasks(tasks: Vec<TaskRunResult>) -> Self {
        let status = combine_status(tasks.iter().map(|t| &t.status));
        let summary = summarize(&tasks);
        Self {
            tasks,
            status,
            summary,
        }
    }

    pub fn commands(&self) -> impl Iterator<Item = &CommandResult> {
        self.tasks.iter().flat_map(|t| t.commands.iter())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunSummary {
    pub total_tasks: usize,
    pub total_commands: usize,
    pub succeeded: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub next_actions: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineRunStatus {
    Success,
    PartialSuccess,
    Failed,
}

/// Run one task: plan its commands, then execute them in order.
///
/// Under `ErrorPolicy::Abort` the first failing command returns
/// `remote.command_failed`. Under `ErrorPolicy::Continue` failures are
/// recorded and the remaining commands still run.
pub fn run_task(
    task: &TaskDescriptor,
    ctx: &TaskContext,
    runner: &dyn CommandRunner,
) -> Result<TaskRunResult> {
    let planned = task.plan(ctx)?;
    log_status!("task", "{} ({} commands)", task.name, planned.len());

    let mut commands = Vec::with_capacity(planned.len());
    for command in &planned {
        let rendered = command.render();
        let output = runner.run(&rendered);
        let success = output.success();

        if !success {
            if task.policy == ErrorPolicy::Abort {
                return Err(abort_error(ctx, &rendered, output.first_failure()));
            }
            log_status!(
                "warn",
                "{}: command failed on {}, continuing: {}",
                task.name,
                output.failed_hosts().join(", "),
                rendered
            );
        }

        commands.push(CommandResult {
            command: rendered,
            success,
            failed_hosts: output.failed_hosts(),
            hosts: output.hosts,
        });
    }

    let statuses: Vec<PipelineRunStatus> = commands
        .iter()
        .map(|c| {
            if c.success {
                PipelineRunStatus::Success
            } else {
                PipelineRunStatus::Failed
            }
        })
        .collect();
    let status = combine_status(statuses.iter());

    Ok(TaskRunResult {
        task: task.name.to_string(),
        policy: task.policy,
        status,
        commands,
    })
}

/// Run tasks strictly in order. An aborting task stops the run.
pub fn run(
    tasks: &[&TaskDescriptor],
    ctx: &TaskContext,
    runner: &dyn CommandRunner,
) -> Result<PipelineRunResult> {
    let mut results = Vec::with_capacity(tasks.len());
    for task in tasks {
        results.push(run_task(task, ctx, runner)?);
    }
    Ok(PipelineRunResult::from_tasks(results))
}

fn abort_error(ctx: &TaskContext, command: &str, failure: Option<&HostOutput>) -> Error {
    let (exit_code, stdout, stderr, server_id, host) = match failure {
        Some(f) => (
            f.output.exit_code,
            f.output.stdout.clone(),
            f.output.stderr.clone(),
            Some(f.server_id.clone()),
            Some(f.host.clone()),
        ),
        None => (-1, String::new(), String::new(), None, None),
    };

    // ssh exits 255 when the connection itself failed
    Error::remote_command_failed(RemoteCommandFailedDetails {
        command: command.to_string(),
        exit_code,
        stdout,
        stderr,
        target: TargetDetails {
            site_id: Some(ctx.site.id.clone()),
            server_id,
            host,
        },
    })
    .with_retryable(exit_code == 255)
}

/// All success → success; all failed → failed; otherwise partial.
/// An empty set counts as success.
fn combine_status<'a, I>(statuses: I) -> PipelineRunStatus
where
    I: Iterator<Item = &'a PipelineRunStatus>,
{
    let mut any_ok = false;
    let mut any_failed = false;
    for status in statuses {
        match status {
            PipelineRunStatus::Success => any_ok = true,
            PipelineRunStatus::Failed => any_failed = true,
            PipelineRunStatus::PartialSuccess => {
                any_ok = true;
                any_failed = true;
            }
        }
    }

    match (any_ok, any_failed) {
        (_, false) => PipelineRunStatus::Success,
        (true, true) => PipelineRunStatus::PartialSuccess,
        (false, true) => PipelineRunStatus::Failed,
    }
}

fn summarize(tasks: &[TaskRunResult]) -> PipelineRunSummary {
    let total_commands = tasks.iter().map(|t| t.commands.len()).sum();
    let failed = tasks
        .iter()
        .flat_map(|t| t.commands.iter())
        .filter(|c| !c.success)
        .count();

    let next_actions = tasks
        .iter()
        .filter(|t| t.status != PipelineRunStatus::Success)
        .map(|t| format!("Re-run '{}' after fixing: {}", t.task, t.failed_commands().join("; ")))
        .collect();

    PipelineRunSummary {
        total_tasks: tasks.len(),
        total_commands,
        succeeded: total_commands - failed,
        failed,
        next_actions,
    }
}
