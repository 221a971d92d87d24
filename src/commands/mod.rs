use clap::Args;

pub type CmdResult<T> = dropship::Result<(T, i32)>;

pub(crate) struct GlobalArgs {}

/// Shared arguments for `set` commands.
#[derive(Args, Default, Debug)]
pub struct SetArgs {
    /// Entity ID
    pub id: String,

    /// JSON patch (positional, supports @file and - for stdin)
    pub spec: Option<String>,

    /// Explicit JSON patch (takes precedence over positional)
    #[arg(long, value_name = "JSON")]
    pub json: Option<String>,
}

impl SetArgs {
    /// Get the JSON spec from either --json or positional argument
    pub fn json_spec(&self) -> dropship::Result<&str> {
        self.json
            .as_deref()
            .or(self.spec.as_deref())
            .ok_or_else(|| dropship::Error::validation_missing_argument(vec!["spec".to_string()]))
    }
}

/// Exit code for a pipeline that finished without aborting.
/// Tolerated failures still exit non-zero so scripts notice them.
pub(crate) fn pipeline_exit_code(status: dropship::pipeline::PipelineRunStatus) -> i32 {
    match status {
        dropship::pipeline::PipelineRunStatus::Success => 0,
        dropship::pipeline::PipelineRunStatus::PartialSuccess
        | dropship::pipeline::PipelineRunStatus::Failed => 20,
    }
}

pub mod deploy;
pub mod server;
pub mod site;
pub mod tag;
pub mod task;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run_json($args))
    };
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (dropship::Result<serde_json::Value>, i32) {
    crate::tty::status("dropship is working...");

    match command {
        // Commands without global context
        crate::Commands::Tasks => crate::output::map_cmd_result_to_json(task::list()),

        // Commands with global context
        crate::Commands::Site(args) => dispatch!(args, global, site),
        crate::Commands::Server(args) => dispatch!(args, global, server),
        crate::Commands::Deploy(args) => dispatch!(args, global, deploy),
        crate::Commands::Setup(args) => {
            crate::output::map_cmd_result_to_json(deploy::run_setup(args, global))
        }
        crate::Commands::Task(args) => dispatch!(args, global, task),
        crate::Commands::Tag(args) => dispatch!(args, global, tag),
    }
}
