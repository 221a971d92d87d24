use clap::{Args, Subcommand};
use serde::Serialize;

use dropship::server::{self, Server};

use super::{CmdResult, SetArgs};

#[derive(Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerOutput {
    command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    server_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    server: Option<Server>,
    #[serde(skip_serializing_if = "Option::is_none")]
    servers: Option<Vec<Server>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deleted: Option<Vec<String>>,
}

#[derive(Args)]
pub struct ServerArgs {
    #[command(subcommand)]
    command: ServerCommand,
}

#[derive(Subcommand)]
enum ServerCommand {
    /// Register a new SSH server
    Create {
        /// JSON input spec (supports @file and - for stdin)
        #[arg(long)]
        json: Option<String>,

        /// Server ID (CLI mode, derived from host when omitted)
        id: Option<String>,
        /// SSH host
        #[arg(long)]
        host: Option<String>,
        /// SSH username
        #[arg(long)]
        user: Option<String>,
        /// SSH port (default: 22)
        #[arg(long)]
        port: Option<u16>,
        /// SSH private key path
        #[arg(long)]
        identity_file: Option<String>,
    },
    /// Display server configuration
    Show {
        /// Server ID
        server_id: String,
    },
    /// Modify server settings
    #[command(visible_aliases = ["edit", "merge"])]
    Set {
        #[command(flatten)]
        args: SetArgs,
    },
    /// Remove a server configuration
    Delete {
        /// Server ID
        server_id: String,
    },
    /// List all configured servers
    List,
}

pub fn run(args: ServerArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<ServerOutput> {
    match args.command {
        ServerCommand::Create {
            json,
            id,
            host,
            user,
            port,
            identity_file,
        } => {
            let created = if let Some(spec) = json {
                server::create(&spec)?
            } else {
                let host = host.ok_or_else(|| {
                    dropship::Error::validation_invalid_argument(
                        "host",
                        "Missing required argument: --host",
                        None,
                        None,
                    )
                })?;

                let user = user.ok_or_else(|| {
                    dropship::Error::validation_invalid_argument(
                        "user",
                        "Missing required argument: --user",
                        None,
                        None,
                    )
                })?;

                server::create_from_flags(id, host, user, port, identity_file)?
            };

            Ok((
                ServerOutput {
                    command: "server.create".to_string(),
                    server_id: Some(created.id.clone()),
                    server: Some(created),
                    updated: Some(vec!["created".to_string()]),
                    ..Default::default()
                },
                0,
            ))
        }
        ServerCommand::Show { server_id } => {
            let server = server::load(&server_id)?;
            Ok((
                ServerOutput {
                    command: "server.show".to_string(),
                    server_id: Some(server_id),
                    server: Some(server),
                    ..Default::default()
                },
                0,
            ))
        }
        ServerCommand::Set { args } => {
            let result = server::merge(&args.id, args.json_spec()?)?;
            let server = server::load(&result.id)?;
            Ok((
                ServerOutput {
                    command: "server.set".to_string(),
                    server_id: Some(result.id),
                    server: Some(server),
                    updated: Some(result.updated_fields),
                    ..Default::default()
                },
                0,
            ))
        }
        ServerCommand::Delete { server_id } => {
            server::delete(&server_id)?;
            Ok((
                ServerOutput {
                    command: "server.delete".to_string(),
                    server_id: Some(server_id.clone()),
                    deleted: Some(vec![server_id]),
                    ..Default::default()
                },
                0,
            ))
        }
        ServerCommand::List => Ok((
            ServerOutput {
                command: "server.list".to_string(),
                servers: Some(server::list()?),
                ..Default::default()
            },
            0,
        )),
    }
}
