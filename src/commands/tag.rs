use clap::Args;

use dropship::deploy;
use dropship::git::DeployTagOutput;

use super::CmdResult;

#[derive(Args)]
pub struct TagArgs {
    /// Site ID
    pub site_id: String,

    /// Release to tag (defaults to the one `current` points at)
    #[arg(long)]
    pub release: Option<String>,

    /// Commit to tag (defaults to the release's REVISION file)
    #[arg(long)]
    pub revision: Option<String>,
}

pub fn run(args: TagArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<DeployTagOutput> {
    let output = deploy::tag(
        &args.site_id,
        args.release.as_deref(),
        args.revision.as_deref(),
    )?;
    Ok((output, 0))
}
