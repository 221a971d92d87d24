//! Lifecycle hooks: named events with ordered task lists attached.
//!
//! An event is named after the task it follows. Firing an event runs every
//! attached task in attachment order, each under its own error policy.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::Result;
use crate::pipeline::{self, TaskRunResult};
use crate::ssh::CommandRunner;
use crate::tasks::{self, names, TaskContext, TaskDescriptor};

/// A map of event names to task names.
pub type HookMap = HashMap<String, Vec<String>>;

pub mod events {
    /// Fired once the new release has been populated.
    pub const POST_UPDATE_CODE: &str = super::names::UPDATE_CODE;
}

/// Result of running all hooks for an event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookRunResult {
    pub event: String,
    pub tasks: Vec<TaskRunResult>,
    pub all_succeeded: bool,
}

/// The Drupal attachment: link shared assets, then drive drush around the
/// database update.
pub fn default_hooks() -> HookMap {
    let mut hooks = HookMap::new();
    hooks.insert(
        events::POST_UPDATE_CODE.to_string(),
        [
            names::SYMLINK_SHARED,
            names::SITE_OFFLINE,
            names::UPDATEDB,
            names::CACHE_CLEAR,
            names::SITE_ONLINE,
        ]
        .iter()
        .map(|name| name.to_string())
        .collect(),
    );
    hooks
}

/// Resolve the tasks attached to `event`. Unknown task names are an error.
pub fn resolve_hooks(hooks: &HookMap, event: &str) -> Result<Vec<&'static TaskDescriptor>> {
    hooks
        .get(event)
        .map(|names| names.iter().map(|name| tasks::find(name)).collect())
        .unwrap_or_else(|| Ok(Vec::new()))
}

/// Fire `event`: run its tasks in order. An aborting task stops the event.
pub fn fire(
    hooks: &HookMap,
    event: &str,
    ctx: &TaskContext,
    runner: &dyn CommandRunner,
) -> Result<HookRunResult> {
    let attached = resolve_hooks(hooks, event)?;
    if !attached.is_empty() {
        log_status!("hook", "after {}: {} task(s)", event, attached.len());
    }

    let mut results = Vec::with_capacity(attached.len());
    for task in attached {
        results.push(pipeline::run_task(task, ctx, runner)?);
    }

    let all_succeeded = results
        .iter()
        .all(|r| r.status == pipeline::PipelineRunStatus::Success);

    Ok(HookRunResult {
        event: event.to_string(),
        tasks: results,
        all_succeeded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::{DeployLayout, Release};
    use crate::site::SiteConfig;
    use crate::ssh::RecordingRunner;

    #[test]
    fn default_hooks_attach_drupal_tasks_in_order() {
        let hooks = default_hooks();
        let names: Vec<&str> = resolve_hooks(&hooks, events::POST_UPDATE_CODE)
            .unwrap()
            .iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "drupal:symlink_shared",
                "drush:site_offline",
                "drush:updatedb",
                "drush:cache_clear",
                "drush:site_online",
            ]
        );
    }

    #[test]
    fn unattached_event_fires_nothing() {
        let site = SiteConfig::new("blog", "deploy");
        let release = Release::named("/var/www/blog/releases", "r1").unwrap();
        let layout = DeployLayout::new(&site, release).unwrap();
        let ctx = TaskContext {
            site: &site,
            layout: &layout,
            revision: None,
        };
        let runner = RecordingRunner::new();

        let result = fire(&default_hooks(), "deploy:cleanup", &ctx, &runner).unwrap();

        assert!(result.tasks.is_empty());
        assert!(result.all_succeeded);
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn unknown_attached_task_is_rejected() {
        let mut hooks = HookMap::new();
        hooks.insert("deploy:update_code".to_string(), vec!["drush:nope".to_string()]);
        let err = resolve_hooks(&hooks, "deploy:update_code").unwrap_err();
        assert_eq!(err.code.as_str(), "task.not_found");
    }
}
