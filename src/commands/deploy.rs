use clap::Args;

use dropship::deploy::{self, DeployConfig, DeployOutput, TaskOutput};

use super::{pipeline_exit_code, CmdResult};

#[derive(Args)]
pub struct DeployArgs {
    /// Site ID
    pub site_id: String,

    /// Print the commands that would run without contacting servers
    #[arg(long)]
    pub dry_run: bool,

    /// Deploy this commit instead of the head of the site's branch
    #[arg(long)]
    pub revision: Option<String>,

    /// Push a deploy tag from the current repository after deploying
    #[arg(long)]
    pub tag: bool,
}

#[derive(Args)]
pub struct SetupArgs {
    /// Site ID
    pub site_id: String,

    /// Print the commands that would run without contacting servers
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(args: DeployArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<DeployOutput> {
    let config = DeployConfig {
        dry_run: args.dry_run,
        revision: args.revision,
        tag: args.tag,
    };

    let output = deploy::run(&args.site_id, &config)?;
    let exit_code = pipeline_exit_code(output.result.status);
    Ok((output, exit_code))
}

pub fn run_setup(args: SetupArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<TaskOutput> {
    let output = deploy::setup(&args.site_id, args.dry_run)?;
    let exit_code = pipeline_exit_code(output.result.status);
    Ok((output, exit_code))
}
