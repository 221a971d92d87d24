use clap::{Parser, Subcommand};

use commands::GlobalArgs;

mod commands;
mod output;
mod tty;

use commands::{deploy, server, site, tag, task};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "dropship")]
#[command(version = VERSION)]
#[command(about = "CLI for Drupal release deployment over SSH")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage site deployment configurations
    #[command(visible_alias = "sites")]
    Site(site::SiteArgs),
    /// Manage SSH server configurations
    #[command(visible_alias = "servers")]
    Server(server::ServerArgs),
    /// Deploy a new release: update code, run Drupal hooks, switch current
    Deploy(deploy::DeployArgs),
    /// Prepare release and shared directories on every server
    Setup(deploy::SetupArgs),
    /// Run one named task against a release
    Task(task::TaskArgs),
    /// List available tasks
    Tasks,
    /// Tag a deployed release in git and push the tag to origin
    Tag(tag::TagArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let global = GlobalArgs {};

    let (json_result, exit_code) = commands::run_json(cli.command, &global);
    let _ = output::print_json_result(json_result);

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
