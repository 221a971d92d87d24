use clap::Args;
use serde::Serialize;

use dropship::deploy::{self, TaskOutput};
use dropship::tasks::{self, TaskDescriptor};

use super::{pipeline_exit_code, CmdResult};

#[derive(Args)]
pub struct TaskArgs {
    /// Site ID
    pub site_id: String,

    /// Task name (e.g. drush:updatedb); see `dropship tasks`
    pub task: String,

    /// Release to run against (defaults to the one `current` points at)
    #[arg(long)]
    pub release: Option<String>,

    /// Commit for deploy:update_code (defaults to the head of the site's branch)
    #[arg(long)]
    pub revision: Option<String>,

    /// Print the commands that would run without contacting servers
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListOutput {
    command: String,
    tasks: Vec<TaskDescriptor>,
}

pub fn run(args: TaskArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<TaskOutput> {
    let output = deploy::run_task(
        &args.site_id,
        &args.task,
        args.release.as_deref(),
        args.revision.as_deref(),
        args.dry_run,
    )?;
    let exit_code = pipeline_exit_code(output.result.status);
    Ok((output, exit_code))
}

pub fn list() -> CmdResult<TaskListOutput> {
    Ok((
        TaskListOutput {
            command: "tasks".to_string(),
            tasks: tasks::all().to_vec(),
        },
        0,
    ))
}
