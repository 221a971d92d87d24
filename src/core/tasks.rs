//! The named deployment tasks.
//!
//! A task body only plans: it turns a site and a release layout into the
//! ordered list of remote commands to run. Execution, error policy and
//! logging live in `pipeline`.

use serde::Serialize;

use crate::command::{DrushCommand, DrushVariable, RemoteCommand};
use crate::config::suggest_similar;
use crate::error::{Error, Result};
use crate::release::DeployLayout;
use crate::site::{DeployStrategy, Scm, SiteConfig, DOMAIN_SHARED_ASSETS};

pub mod names {
    pub const SETUP: &str = "deploy:setup";
    pub const UPDATE_CODE: &str = "deploy:update_code";
    pub const CREATE_SYMLINK: &str = "deploy:create_symlink";
    pub const CLEANUP: &str = "deploy:cleanup";
    pub const SYMLINK_SHARED: &str = "drupal:symlink_shared";
    pub const SITE_OFFLINE: &str = "drush:site_offline";
    pub const UPDATEDB: &str = "drush:updatedb";
    pub const CACHE_CLEAR: &str = "drush:cache_clear";
    pub const SITE_ONLINE: &str = "drush:site_online";
    pub const BACKUPDB: &str = "drush:backupdb";
}

/// What a failing command does to the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// First failure stops the run and is returned as an error.
    Abort,
    /// Failures are recorded; remaining commands, domains and tasks still run.
    Continue,
}

/// Which release a task operates on when none is named explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseTarget {
    /// A fresh timestamped release.
    New,
    /// The release `current` points at.
    Current,
}

/// Everything a task body may read. Borrowed, never mutated.
#[derive(Debug, Clone, Copy)]
pub struct TaskContext<'a> {
    pub site: &'a SiteConfig,
    pub layout: &'a DeployLayout,
    /// Commit being deployed; only `deploy:update_code` needs it.
    pub revision: Option<&'a str>,
}

type TaskBody = fn(&TaskContext) -> Result<Vec<RemoteCommand>>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub policy: ErrorPolicy,
    pub release: ReleaseTarget,
    #[serde(skip)]
    body: TaskBody,
}

impl TaskDescriptor {
    pub fn plan(&self, ctx: &TaskContext) -> Result<Vec<RemoteCommand>> {
        (self.body)(ctx)
    }
}

static TASKS: &[TaskDescriptor] = &[
    TaskDescriptor {
        name: names::SETUP,
        description: "Prepare release and shared directories. Safe to re-run; never destroys data.",
        policy: ErrorPolicy::Abort,
        release: ReleaseTarget::New,
        body: setup,
    },
    TaskDescriptor {
        name: names::UPDATE_CODE,
        description: "Update the cached copy and copy it into a new release.",
        policy: ErrorPolicy::Abort,
        release: ReleaseTarget::New,
        body: update_code,
    },
    TaskDescriptor {
        name: names::SYMLINK_SHARED,
        description: "Symlink settings, files and additional shared assets into the release.",
        policy: ErrorPolicy::Abort,
        release: ReleaseTarget::Current,
        body: symlink_shared,
    },
    TaskDescriptor {
        name: names::SITE_OFFLINE,
        description: "Set the site offline",
        policy: ErrorPolicy::Continue,
        release: ReleaseTarget::Current,
        body: site_offline,
    },
    TaskDescriptor {
        name: names::UPDATEDB,
        description: "Run Drupal database migrations if required",
        policy: ErrorPolicy::Continue,
        release: ReleaseTarget::Current,
        body: updatedb,
    },
    TaskDescriptor {
        name: names::CACHE_CLEAR,
        description: "Clear the drupal cache",
        policy: ErrorPolicy::Continue,
        release: ReleaseTarget::Current,
        body: cache_clear,
    },
    TaskDescriptor {
        name: names::SITE_ONLINE,
        description: "Set the site online",
        policy: ErrorPolicy::Continue,
        release: ReleaseTarget::Current,
        body: site_online,
    },
    TaskDescriptor {
        name: names::BACKUPDB,
        description: "Backup the database",
        policy: ErrorPolicy::Continue,
        release: ReleaseTarget::Current,
        body: backupdb,
    },
    TaskDescriptor {
        name: names::CREATE_SYMLINK,
        description: "Point the current symlink at the release.",
        policy: ErrorPolicy::Abort,
        release: ReleaseTarget::Current,
        body: create_symlink,
    },
    TaskDescriptor {
        name: names::CLEANUP,
        description: "Remove old releases, keeping the newest keepReleases.",
        policy: ErrorPolicy::Continue,
        release: ReleaseTarget::New,
        body: cleanup,
    },
];

pub fn all() -> &'static [TaskDescriptor] {
    TASKS
}

pub fn find(name: &str) -> Result<&'static TaskDescriptor> {
    TASKS.iter().find(|task| task.name == name).ok_or_else(|| {
        let suggestions = suggest_similar(name, TASKS.iter().map(|t| t.name.to_string()));
        Error::task_not_found(name, suggestions)
    })
}

// ============================================================================
// Task bodies
// ============================================================================

fn setup(ctx: &TaskContext) -> Result<Vec<RemoteCommand>> {
    let site = ctx.site;
    let layout = ctx.layout;
    let sudo = site.use_sudo;
    let base = vec![layout.releases_path.clone(), layout.shared_path.clone()];

    let mut commands = vec![
        RemoteCommand::mkdir(&base)?.with_sudo(sudo),
        RemoteCommand::chown(&site.user, &site.runner_group, &layout.deploy_to)?.with_sudo(sudo),
    ];
    if site.group_writable {
        commands.push(RemoteCommand::chmod_group_writable(&base)?.with_sudo(sudo));
    }

    if site.shared_children.is_empty() {
        return Ok(commands);
    }

    for domain in &site.domains {
        let dirs: Vec<String> = site
            .shared_children
            .iter()
            .map(|child| layout.shared_domain_path(domain, child))
            .collect();
        commands.push(RemoteCommand::mkdir(&dirs)?.with_sudo(sudo));
        commands.push(RemoteCommand::chmod_shared(&dirs)?.with_sudo(sudo));
    }

    Ok(commands)
}

fn update_code(ctx: &TaskContext) -> Result<Vec<RemoteCommand>> {
    let site = ctx.site;
    let layout = ctx.layout;
    let revision = ctx
        .revision
        .ok_or_else(|| Error::validation_missing_argument(vec!["revision".to_string()]))?;

    match (site.scm, site.deploy_via) {
        (Scm::Git, DeployStrategy::RemoteCache) => Ok(vec![
            RemoteCommand::sync_cached_copy(
                site.require_repository()?,
                revision,
                &layout.cached_copy_path,
                site.git_enable_submodules,
            )?,
            RemoteCommand::copy_release(&layout.cached_copy_path, &layout.release.path)?,
            RemoteCommand::write_revision(&layout.release.path, revision)?,
        ]),
    }
}

fn symlink_shared(ctx: &TaskContext) -> Result<Vec<RemoteCommand>> {
    let layout = ctx.layout;
    let mut commands = Vec::new();

    for domain in &ctx.site.domains {
        for asset in DOMAIN_SHARED_ASSETS {
            commands.push(RemoteCommand::relink_shared(
                &layout.shared_domain_path(domain, asset),
                &layout.release_domain_path(domain, asset),
            )?);
        }
    }

    for asset in &ctx.site.additional_shared_assets {
        let asset = asset.trim_matches('/');
        commands.push(RemoteCommand::relink_shared(
            &format!("{}/{}", layout.shared_path, asset),
            &format!("{}/{}", layout.app_path, asset),
        )?);
    }

    Ok(commands)
}

/// One drush invocation per domain per subcommand, domains outermost.
fn drush_each_domain(ctx: &TaskContext, subcommands: &[DrushCommand]) -> Result<Vec<RemoteCommand>> {
    let program = ctx.site.drush_argv();
    let mut commands = Vec::new();
    for domain in &ctx.site.domains {
        for subcommand in subcommands {
            commands.push(RemoteCommand::drush(
                &program,
                &ctx.layout.app_path,
                domain,
                *subcommand,
            )?);
        }
    }
    Ok(commands)
}

fn maintenance(enabled: bool) -> [DrushCommand; 2] {
    [
        DrushCommand::VariableSet {
            variable: DrushVariable::SiteOffline,
            enabled,
        },
        DrushCommand::VariableSet {
            variable: DrushVariable::MaintenanceMode,
            enabled,
        },
    ]
}

fn site_offline(ctx: &TaskContext) -> Result<Vec<RemoteCommand>> {
    drush_each_domain(ctx, &maintenance(true))
}

fn site_online(ctx: &TaskContext) -> Result<Vec<RemoteCommand>> {
    drush_each_domain(ctx, &maintenance(false))
}

fn updatedb(ctx: &TaskContext) -> Result<Vec<RemoteCommand>> {
    drush_each_domain(ctx, &[DrushCommand::UpdateDb])
}

fn cache_clear(ctx: &TaskContext) -> Result<Vec<RemoteCommand>> {
    drush_each_domain(ctx, &[DrushCommand::CacheClearAll])
}

fn backupdb(ctx: &TaskContext) -> Result<Vec<RemoteCommand>> {
    drush_each_domain(ctx, &[DrushCommand::BamBackup])
}

fn create_symlink(ctx: &TaskContext) -> Result<Vec<RemoteCommand>> {
    Ok(vec![RemoteCommand::link_current(
        &ctx.layout.release.path,
        &ctx.layout.current_path,
    )?])
}

fn cleanup(ctx: &TaskContext) -> Result<Vec<RemoteCommand>> {
    Ok(vec![RemoteCommand::prune_releases(
        &ctx.layout.releases_path,
        ctx.site.keep_releases,
    )?
    .with_sudo(ctx.site.use_sudo)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::Release;

    fn fixture(domains: &[&str]) -> (SiteConfig, DeployLayout) {
        let mut site = SiteConfig::new("blog", "deploy");
        site.domains = domains.iter().map(|d| d.to_string()).collect();
        let release = Release::named("/var/www/blog/releases", "20240309140507").unwrap();
        let layout = DeployLayout::new(&site, release).unwrap();
        (site, layout)
    }

    fn rendered(name: &str, site: &SiteConfig, layout: &DeployLayout) -> Vec<String> {
        let ctx = TaskContext {
            site,
            layout,
            revision: Some("0123456789abcdef"),
        };
        find(name)
            .unwrap()
            .plan(&ctx)
            .unwrap()
            .iter()
            .map(RemoteCommand::render)
            .collect()
    }

    #[test]
    fn setup_renders_literal_commands() {
        let (site, layout) = fixture(&["default"]);
        assert_eq!(
            rendered(names::SETUP, &site, &layout),
            vec![
                "mkdir -p /var/www/blog/releases /var/www/blog/shared",
                "chown -R deploy:www-data /var/www/blog",
                "mkdir -p /var/www/blog/shared/default/files /var/www/blog/shared/default/private",
                "chmod 2775 /var/www/blog/shared/default/files /var/www/blog/shared/default/private",
            ]
        );
    }

    #[test]
    fn setup_uses_sudo_and_group_writable() {
        let (mut site, layout) = fixture(&["default"]);
        site.use_sudo = true;
        site.group_writable = true;
        let commands = rendered(names::SETUP, &site, &layout);
        assert!(commands.iter().all(|c| c.starts_with("sudo ")));
        assert_eq!(
            commands[2],
            "sudo chmod g+w /var/www/blog/releases /var/www/blog/shared"
        );
    }

    #[test]
    fn setup_without_shared_children_skips_domain_dirs() {
        let (mut site, layout) = fixture(&["default", "example.com"]);
        site.shared_children.clear();
        assert_eq!(rendered(names::SETUP, &site, &layout).len(), 2);
    }

    #[test]
    fn symlink_shared_links_domain_then_additional_assets() {
        let (mut site, layout) = fixture(&["default"]);
        site.additional_shared_assets = vec!["robots.txt".to_string()];
        let commands = rendered(names::SYMLINK_SHARED, &site, &layout);
        assert_eq!(commands.len(), 4);
        assert_eq!(
            commands[2],
            "rm -rf /var/www/blog/releases/20240309140507/sites/default/settings.php && ln -nfs /var/www/blog/shared/default/settings.php /var/www/blog/releases/20240309140507/sites/default/settings.php"
        );
        assert_eq!(
            commands[3],
            "rm -rf /var/www/blog/releases/20240309140507/robots.txt && ln -nfs /var/www/blog/shared/robots.txt /var/www/blog/releases/20240309140507/robots.txt"
        );
    }

    #[test]
    fn site_offline_sets_both_variables_per_domain() {
        let (site, layout) = fixture(&["default", "example.com"]);
        let commands = rendered(names::SITE_OFFLINE, &site, &layout);
        let root = "/var/www/blog/releases/20240309140507";
        assert_eq!(
            commands,
            vec![
                format!("drush -r {} -l default vset site_offline 1 -y", root),
                format!("drush -r {} -l default vset maintenance_mode 1 -y", root),
                format!("drush -r {} -l example.com vset site_offline 1 -y", root),
                format!("drush -r {} -l example.com vset maintenance_mode 1 -y", root),
            ]
        );
    }

    #[test]
    fn update_code_requires_revision_and_repository() {
        let (mut site, layout) = fixture(&["default"]);
        let ctx = TaskContext {
            site: &site,
            layout: &layout,
            revision: None,
        };
        let err = find(names::UPDATE_CODE).unwrap().plan(&ctx).unwrap_err();
        assert_eq!(err.code.as_str(), "validation.missing_argument");

        let err = find(names::UPDATE_CODE)
            .unwrap()
            .plan(&TaskContext {
                revision: Some("0123456789abcdef"),
                ..ctx
            })
            .unwrap_err();
        assert_eq!(err.code.as_str(), "config.missing_key");

        site.repository = Some("git@example.com:blog.git".to_string());
        let commands = rendered(names::UPDATE_CODE, &site, &layout);
        assert_eq!(commands.len(), 3);
        assert_eq!(
            commands[1],
            "cp -RPp /var/www/blog/shared/cached-copy /var/www/blog/releases/20240309140507"
        );
    }

    #[test]
    fn cleanup_keeps_newest_releases() {
        let (site, layout) = fixture(&["default"]);
        assert_eq!(
            rendered(names::CLEANUP, &site, &layout),
            vec!["cd /var/www/blog/releases && ls -1 | sort -r | tail -n +6 | xargs -r rm -rf"]
        );
    }

    #[test]
    fn cleanup_with_sudo_elevates_only_the_removal() {
        let (mut site, layout) = fixture(&["default"]);
        site.use_sudo = true;
        let commands = rendered(names::CLEANUP, &site, &layout);
        assert_eq!(
            commands,
            vec!["cd /var/www/blog/releases && ls -1 | sort -r | tail -n +6 | xargs -r sudo rm -rf"]
        );
        assert!(!commands[0].starts_with("sudo cd "));
    }

    #[test]
    fn policies_match_task_kind() {
        for name in [names::SETUP, names::SYMLINK_SHARED, names::UPDATE_CODE] {
            assert_eq!(find(name).unwrap().policy, ErrorPolicy::Abort);
        }
        for name in [
            names::SITE_OFFLINE,
            names::UPDATEDB,
            names::CACHE_CLEAR,
            names::SITE_ONLINE,
            names::BACKUPDB,
        ] {
            assert_eq!(find(name).unwrap().policy, ErrorPolicy::Continue);
        }
    }

    #[test]
    fn unknown_task_suggests_close_names() {
        let err = find("drush:updatdb").unwrap_err();
        assert_eq!(err.code.as_str(), "task.not_found");
        assert!(err.details.to_string().contains("drush:updatedb"));
    }
}
