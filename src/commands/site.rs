use clap::{Args, Subcommand};
use serde::Serialize;

use dropship::site::{self, SiteConfig};

use super::{CmdResult, SetArgs};

#[derive(Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteOutput {
    command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    site_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    site: Option<SiteConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sites: Option<Vec<SiteConfig>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    removed: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deleted: Option<Vec<String>>,
}

#[derive(Args)]
pub struct SiteArgs {
    #[command(subcommand)]
    command: SiteCommand,
}

#[derive(Subcommand)]
enum SiteCommand {
    /// Register a new site from a JSON spec
    Create {
        /// JSON spec (supports @file and - for stdin)
        spec: String,
    },
    /// Display site configuration
    Show {
        /// Site ID
        site_id: String,
    },
    /// Modify site settings (JSON merge patch)
    #[command(visible_aliases = ["edit", "merge"])]
    Set {
        #[command(flatten)]
        args: SetArgs,
    },
    /// Remove items from array fields
    Remove {
        #[command(flatten)]
        args: SetArgs,
    },
    /// Remove a site configuration
    Delete {
        /// Site ID
        site_id: String,
    },
    /// List all configured sites
    List,
}

pub fn run(args: SiteArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<SiteOutput> {
    match args.command {
        SiteCommand::Create { spec } => {
            let created = site::create(&spec)?;
            Ok((
                SiteOutput {
                    command: "site.create".to_string(),
                    site_id: Some(created.id.clone()),
                    site: Some(created),
                    updated: Some(vec!["created".to_string()]),
                    ..Default::default()
                },
                0,
            ))
        }
        SiteCommand::Show { site_id } => {
            let site = site::load(&site_id)?;
            Ok((
                SiteOutput {
                    command: "site.show".to_string(),
                    site_id: Some(site_id),
                    site: Some(site),
                    ..Default::default()
                },
                0,
            ))
        }
        SiteCommand::Set { args } => {
            let result = site::merge(&args.id, args.json_spec()?)?;
            let site = site::load(&result.id)?;
            Ok((
                SiteOutput {
                    command: "site.set".to_string(),
                    site_id: Some(result.id),
                    site: Some(site),
                    updated: Some(result.updated_fields),
                    ..Default::default()
                },
                0,
            ))
        }
        SiteCommand::Remove { args } => {
            let result = site::remove_from_json(&args.id, args.json_spec()?)?;
            let site = site::load(&result.id)?;
            Ok((
                SiteOutput {
                    command: "site.remove".to_string(),
                    site_id: Some(result.id),
                    site: Some(site),
                    removed: Some(result.removed_from),
                    ..Default::default()
                },
                0,
            ))
        }
        SiteCommand::Delete { site_id } => {
            site::delete(&site_id)?;
            Ok((
                SiteOutput {
                    command: "site.delete".to_string(),
                    site_id: Some(site_id.clone()),
                    deleted: Some(vec![site_id]),
                    ..Default::default()
                },
                0,
            ))
        }
        SiteCommand::List => Ok((
            SiteOutput {
                command: "site.list".to_string(),
                sites: Some(site::list()?),
                ..Default::default()
            },
            0,
        )),
    }
}
