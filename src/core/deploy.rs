//! Deploy orchestration: resolve a site, its release and its runner, then
//! drive tasks through the pipeline.
//!
//! `deploy` = `deploy:update_code` → hooks attached to it → `deploy:create_symlink`.

use chrono::Utc;
use serde::Serialize;

use crate::command::RemoteCommand;
use crate::error::{Error, RemoteCommandFailedDetails, Result, TargetDetails};
use crate::git::{self, DeployTagOutput};
use crate::hooks::{self, HookMap};
use crate::pipeline::{self, PipelineRunResult, TaskRunResult};
use crate::release::{self, DeployLayout, Release};
use crate::site::{self, SiteConfig};
use crate::ssh::{CommandRunner, RecordingRunner, RemoteRunner};
use crate::tasks::{self, names, ReleaseTarget, TaskContext, TaskDescriptor};

#[derive(Debug, Clone, Default)]
pub struct DeployConfig {
    /// Record commands instead of running them.
    pub dry_run: bool,
    /// Deploy this commit instead of resolving the site's branch.
    pub revision: Option<String>,
    /// Push a deploy tag after a successful deploy.
    pub tag: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployOutput {
    pub site_id: String,
    pub release: Release,
    pub revision: String,
    pub dry_run: bool,
    #[serde(flatten)]
    pub result: PipelineRunResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub planned_commands: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<DeployTagOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutput {
    pub site_id: String,
    pub release: Release,
    pub dry_run: bool,
    #[serde(flatten)]
    pub result: TaskRunResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub planned_commands: Vec<String>,
}

/// Run the full deploy chain for an already-resolved layout.
///
/// Aborting tasks (`update_code`, `symlink_shared`, `create_symlink`) stop the
/// chain with an error; drush tasks record failures and let it continue.
pub fn deploy(
    site: &SiteConfig,
    layout: &DeployLayout,
    revision: &str,
    hooks: &HookMap,
    runner: &dyn CommandRunner,
) -> Result<PipelineRunResult> {
    let ctx = TaskContext {
        site,
        layout,
        revision: Some(revision),
    };

    let mut results = vec![pipeline::run_task(
        tasks::find(names::UPDATE_CODE)?,
        &ctx,
        runner,
    )?];

    let fired = hooks::fire(hooks, hooks::events::POST_UPDATE_CODE, &ctx, runner)?;
    results.extend(fired.tasks);

    results.push(pipeline::run_task(
        tasks::find(names::CREATE_SYMLINK)?,
        &ctx,
        runner,
    )?);

    Ok(PipelineRunResult::from_tasks(results))
}

/// High-level deploy entry point: loads the site, resolves the revision and
/// runner, and deploys a fresh release.
pub fn run(site_id: &str, config: &DeployConfig) -> Result<DeployOutput> {
    let site = load_site(site_id)?;
    let revision = match &config.revision {
        Some(revision) => revision.clone(),
        None => git::resolve_revision(site.require_repository()?, &site.branch)?,
    };

    let release = Release::at(&release::releases_path(&site), Utc::now());
    let layout = DeployLayout::new(&site, release.clone())?;
    log_status!("deploy", "Deploying {} ({}) as release {}", site.id, revision, release.name);

    let (result, planned_commands) = with_runner(&site, config.dry_run, |runner| {
        deploy(&site, &layout, &revision, &hooks::default_hooks(), runner)
    })?;

    let (tag, tag_error) = if config.tag && !config.dry_run {
        push_tag(&site, &release.name, &revision)
    } else {
        (None, None)
    };

    Ok(DeployOutput {
        site_id: site.id.clone(),
        release,
        revision,
        dry_run: config.dry_run,
        result,
        planned_commands,
        tag,
        tag_error,
    })
}

/// Run `deploy:setup` for a site.
pub fn setup(site_id: &str, dry_run: bool) -> Result<TaskOutput> {
    run_task(site_id, names::SETUP, None, None, dry_run)
}

/// Run one named task against a release.
///
/// Without `release_name`, tasks that work on a deployed release use the one
/// `current` points at; the others get a fresh release.
pub fn run_task(
    site_id: &str,
    task_name: &str,
    release_name: Option<&str>,
    revision: Option<&str>,
    dry_run: bool,
) -> Result<TaskOutput> {
    let task = tasks::find(task_name)?;
    let site = load_site(site_id)?;
    let release = resolve_release(&site, task, release_name, dry_run)?;
    let layout = DeployLayout::new(&site, release.clone())?;

    let revision = if task.name == names::UPDATE_CODE {
        Some(match revision {
            Some(revision) => revision.to_string(),
            None => git::resolve_revision(site.require_repository()?, &site.branch)?,
        })
    } else {
        None
    };

    let ctx = TaskContext {
        site: &site,
        layout: &layout,
        revision: revision.as_deref(),
    };

    let (result, planned_commands) = with_runner(&site, dry_run, |runner| {
        pipeline::run_task(task, &ctx, runner)
    })?;

    Ok(TaskOutput {
        site_id: site.id.clone(),
        release,
        dry_run,
        result,
        planned_commands,
    })
}

/// Push the deploy tag for a release from the repository in the working
/// directory. Without a revision, the release's `REVISION` file is read.
pub fn tag(
    site_id: &str,
    release_name: Option<&str>,
    revision: Option<&str>,
) -> Result<DeployTagOutput> {
    let site = load_site(site_id)?;
    let mut runner = None;
    let release = match release_name {
        Some(name) => Release::named(&release::releases_path(&site), name)?,
        None => current_release(&site, connect(&site, &mut runner)?)?,
    };

    let revision = match revision {
        Some(revision) => revision.to_string(),
        None => {
            let command = RemoteCommand::read_revision(&release.path)?;
            query(&site, connect(&site, &mut runner)?, &command)?
        }
    };

    let cwd = std::env::current_dir()
        .map_err(|e| Error::internal_io(e.to_string(), Some("current directory".to_string())))?;
    git::push_deploy_tag(&cwd, &release.name, site.stage.as_deref(), &revision)
}

fn load_site(site_id: &str) -> Result<SiteConfig> {
    let site = site::load(site_id)?;
    site.check()?;
    Ok(site)
}

fn remote_runner(site: &SiteConfig) -> Result<RemoteRunner> {
    RemoteRunner::new(&site.load_servers()?)
}

/// Connect on first use and reuse the runner afterwards.
fn connect<'a>(site: &SiteConfig, slot: &'a mut Option<RemoteRunner>) -> Result<&'a RemoteRunner> {
    let runner = match slot.take() {
        Some(runner) => runner,
        None => remote_runner(site)?,
    };
    Ok(slot.insert(runner))
}

/// Run `f` against a recording runner (dry run) or the site's servers.
/// Returns the rendered commands when recording.
fn with_runner<T, F>(site: &SiteConfig, dry_run: bool, f: F) -> Result<(T, Vec<String>)>
where
    F: FnOnce(&dyn CommandRunner) -> Result<T>,
{
    if dry_run {
        let runner = RecordingRunner::new();
        let result = f(&runner)?;
        Ok((result, runner.commands()))
    } else {
        let runner = remote_runner(site)?;
        Ok((f(&runner)?, Vec::new()))
    }
}

fn resolve_release(
    site: &SiteConfig,
    task: &TaskDescriptor,
    release_name: Option<&str>,
    dry_run: bool,
) -> Result<Release> {
    let releases_path = release::releases_path(site);
    if let Some(name) = release_name {
        return Release::named(&releases_path, name);
    }

    match task.release {
        ReleaseTarget::New => Ok(Release::at(&releases_path, Utc::now())),
        ReleaseTarget::Current if dry_run => Err(Error::validation_missing_argument(vec![
            "release".to_string(),
        ])
        .with_hint("Dry runs do not contact servers; pass --release <name>")),
        ReleaseTarget::Current => current_release(site, &remote_runner(site)?),
    }
}

/// The release `current` points at, read with `readlink`.
fn current_release(site: &SiteConfig, runner: &dyn CommandRunner) -> Result<Release> {
    let releases_path = release::releases_path(site);
    let command = RemoteCommand::read_link(&format!("{}/current", site.deploy_to()))?;
    let target = query(site, runner, &command)?;
    let name = release::release_name_from_link(&target)?;
    Release::named(&releases_path, &name)
}

/// Run a read-only command and return the first host's trimmed stdout.
fn query(site: &SiteConfig, runner: &dyn CommandRunner, command: &RemoteCommand) -> Result<String> {
    let rendered = command.render();
    let output = runner.run(&rendered);

    if let Some(failure) = output.first_failure() {
        return Err(Error::remote_command_failed(RemoteCommandFailedDetails {
            command: rendered,
            exit_code: failure.output.exit_code,
            stdout: failure.output.stdout.clone(),
            stderr: failure.output.stderr.clone(),
            target: TargetDetails {
                site_id: Some(site.id.clone()),
                server_id: Some(failure.server_id.clone()),
                host: Some(failure.host.clone()),
            },
        }));
    }

    Ok(output.first_stdout().unwrap_or_default().trim().to_string())
}

/// Tag failures never fail a deploy that already went live.
fn push_tag(
    site: &SiteConfig,
    release_name: &str,
    revision: &str,
) -> (Option<DeployTagOutput>, Option<String>) {
    let result = std::env::current_dir()
        .map_err(|e| Error::internal_io(e.to_string(), Some("current directory".to_string())))
        .and_then(|cwd| git::push_deploy_tag(&cwd, release_name, site.stage.as_deref(), revision));

    match result {
        Ok(output) => (Some(output), None),
        Err(e) => {
            log_status!("warn", "Deploy tag not pushed: {}", e.message);
            (None, Some(e.message))
        }
    }
}
