//! Site deployment configuration.
//!
//! A `SiteConfig` is the immutable description of one Drupal deployment:
//! where releases live, who owns them, which domains (Drupal `sites/*`
//! directories) to drive and which servers to run on. It is loaded once and
//! passed by reference into every task.

use crate::config::{self, ConfigEntity};
use crate::error::{Error, Result};
use crate::output::{MergeResult, RemoveResult};
use crate::paths;
use crate::server::{self, Server};
use crate::utils::validation;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Assets linked into `sites/<domain>/` for every domain.
pub const DOMAIN_SHARED_ASSETS: [&str; 3] = ["files", "private", "settings.php"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Scm {
    #[default]
    Git,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeployStrategy {
    /// Keep a clone in `shared/cached-copy`, update it, copy it into the release.
    #[default]
    RemoteCache,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    #[serde(skip_deserializing, default)]
    pub id: String,
    pub application: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default)]
    pub scm: Scm,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default)]
    pub deploy_via: DeployStrategy,
    #[serde(default = "default_true")]
    pub git_enable_submodules: bool,
    #[serde(default = "default_drush_cmd")]
    pub drush_cmd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_to: Option<String>,
    pub user: String,
    #[serde(default = "default_runner_group")]
    pub runner_group: String,
    #[serde(default)]
    pub group_writable: bool,
    #[serde(default)]
    pub use_sudo: bool,
    #[serde(default = "default_shared_children")]
    pub shared_children: Vec<String>,
    #[serde(default)]
    pub additional_shared_assets: Vec<String>,
    #[serde(default = "default_domains")]
    pub domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_root: Option<String>,
    #[serde(default)]
    pub servers: Vec<String>,
    #[serde(default = "default_keep_releases")]
    pub keep_releases: usize,
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_true() -> bool {
    true
}

fn default_drush_cmd() -> String {
    "drush".to_string()
}

fn default_runner_group() -> String {
    "www-data".to_string()
}

fn default_shared_children() -> Vec<String> {
    vec!["files".to_string(), "private".to_string()]
}

fn default_domains() -> Vec<String> {
    vec!["default".to_string()]
}

fn default_keep_releases() -> usize {
    5
}

impl SiteConfig {
    /// A config with every default applied, for the given application and user.
    pub fn new(application: impl Into<String>, user: impl Into<String>) -> Self {
        let application = application.into();
        Self {
            id: application.clone(),
            application,
            repository: None,
            scm: Scm::default(),
            branch: default_branch(),
            deploy_via: DeployStrategy::default(),
            git_enable_submodules: true,
            drush_cmd: default_drush_cmd(),
            deploy_to: None,
            user: user.into(),
            runner_group: default_runner_group(),
            group_writable: false,
            use_sudo: false,
            shared_children: default_shared_children(),
            additional_shared_assets: Vec::new(),
            domains: default_domains(),
            stage: None,
            app_root: None,
            servers: Vec::new(),
            keep_releases: default_keep_releases(),
        }
    }

    /// Deploy root, `/var/www/<application>` unless overridden.
    pub fn deploy_to(&self) -> String {
        match &self.deploy_to {
            Some(path) => path.trim_end_matches('/').to_string(),
            None => format!("/var/www/{}", self.application),
        }
    }

    /// The drush invocation split into argv words.
    pub fn drush_argv(&self) -> Vec<String> {
        self.drush_cmd
            .split_whitespace()
            .map(String::from)
            .collect()
    }

    pub fn require_repository(&self) -> Result<&str> {
        match self.repository.as_deref() {
            Some(repo) if !repo.trim().is_empty() => Ok(repo),
            _ => Err(Error::config_missing_key(
                "repository",
                Some(format!("sites/{}.json", self.id)),
            )),
        }
    }

    /// Load every configured server, in configured order.
    pub fn load_servers(&self) -> Result<Vec<Server>> {
        if self.servers.is_empty() {
            return Err(Error::config_missing_key(
                "servers",
                Some(format!("sites/{}.json", self.id)),
            )
            .with_hint(format!(
                "Attach a server with: dropship site set {} '{{\"servers\":[\"<server-id>\"]}}'",
                self.id
            )));
        }
        self.servers.iter().map(|id| server::load(id)).collect()
    }

    pub fn check(&self) -> Result<()> {
        validation::require_non_empty(
            &self.application,
            "application",
            "Application cannot be empty",
        )?;
        validation::require_identifier(&self.application, "application")?;
        validation::require_identifier(&self.user, "user")?;
        validation::require_identifier(&self.runner_group, "runnerGroup")?;
        validation::require_non_empty(&self.branch, "branch", "Branch cannot be empty")?;
        validation::require_non_empty(
            &self.drush_cmd,
            "drushCmd",
            "Drush command cannot be empty",
        )?;
        if self.drush_cmd.contains(|c: char| c.is_control()) {
            return Err(Error::config_invalid_value(
                "drushCmd",
                Some(self.drush_cmd.clone()),
                "Drush command contains control characters",
            ));
        }
        validation::require_absolute_path(&self.deploy_to(), "deployTo")?;

        for child in &self.shared_children {
            validation::require_relative_path(child, "sharedChildren")?;
        }
        for asset in &self.additional_shared_assets {
            validation::require_relative_path(asset, "additionalSharedAssets")?;
        }
        for domain in &self.domains {
            validation::require_domain(domain, "domains")?;
        }
        if let Some(stage) = &self.stage {
            validation::require_identifier(stage, "stage")?;
        }
        if let Some(app_root) = &self.app_root {
            validation::require_relative_path(app_root, "appRoot")?;
        }
        if self.keep_releases == 0 {
            return Err(Error::config_invalid_value(
                "keepReleases",
                Some("0".to_string()),
                "Must keep at least the current release",
            ));
        }
        Ok(())
    }
}

impl ConfigEntity for SiteConfig {
    fn id(&self) -> &str {
        &self.id
    }
    fn set_id(&mut self, id: String) {
        self.id = id;
    }
    fn config_path(id: &str) -> Result<PathBuf> {
        paths::site(id)
    }
    fn config_dir() -> Result<PathBuf> {
        paths::sites()
    }
    fn not_found_error(id: String, suggestions: Vec<String>) -> Error {
        Error::site_not_found(id, suggestions)
    }
    fn entity_type() -> &'static str {
        "site"
    }
    fn validate(&self) -> Result<()> {
        self.check()
    }
}

// ============================================================================
// Core CRUD - Thin wrappers around config module
// ============================================================================

pub fn load(id: &str) -> Result<SiteConfig> {
    config::load::<SiteConfig>(id)
}

pub fn list() -> Result<Vec<SiteConfig>> {
    config::list::<SiteConfig>()
}

pub fn delete(id: &str) -> Result<()> {
    config::delete::<SiteConfig>(id)
}

/// `marketing_site` -> `marketing-site`.
fn id_from_application(application: &str) -> String {
    application
        .trim()
        .to_ascii_lowercase()
        .replace(['_', '.'], "-")
}

/// Create a site from a JSON spec. Without an `id` field the ID is derived
/// from the application name.
pub fn create(json_spec: &str) -> Result<SiteConfig> {
    let raw = config::read_json_spec_to_string(json_spec)?;
    let value: serde_json::Value = config::from_str(&raw)?;
    let fallback = match value.get("application").and_then(|v| v.as_str()) {
        Some(application) => Some(id_from_application(application)),
        None => None,
    };
    config::create::<SiteConfig>(&raw, fallback)
}

pub fn merge(id: &str, json_spec: &str) -> Result<MergeResult> {
    config::merge::<SiteConfig>(id, json_spec)
}

pub fn remove_from_json(id: &str, json_spec: &str) -> Result<RemoveResult> {
    config::remove_from_json::<SiteConfig>(id, json_spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_json_applies_defaults() {
        let site: SiteConfig =
            serde_json::from_str(r#"{"application":"blog","user":"deploy"}"#).unwrap();

        assert_eq!(site.branch, "master");
        assert_eq!(site.scm, Scm::Git);
        assert_eq!(site.deploy_via, DeployStrategy::RemoteCache);
        assert!(site.git_enable_submodules);
        assert_eq!(site.drush_cmd, "drush");
        assert_eq!(site.runner_group, "www-data");
        assert!(!site.group_writable);
        assert_eq!(site.shared_children, vec!["files", "private"]);
        assert!(site.additional_shared_assets.is_empty());
        assert_eq!(site.domains, vec!["default"]);
        assert_eq!(site.deploy_to(), "/var/www/blog");
        assert_eq!(site.keep_releases, 5);
        assert!(site.check().is_ok());
    }

    #[test]
    fn json_uses_camel_case_keys() {
        let site: SiteConfig = serde_json::from_str(
            r#"{
                "application": "blog",
                "user": "deploy",
                "deployTo": "/srv/blog/",
                "drushCmd": "vendor/bin/drush",
                "additionalSharedAssets": ["robots.txt"],
                "deployVia": "remote_cache"
            }"#,
        )
        .unwrap();

        assert_eq!(site.deploy_to(), "/srv/blog");
        assert_eq!(site.drush_argv(), vec!["vendor/bin/drush"]);
        assert_eq!(site.additional_shared_assets, vec!["robots.txt"]);
    }

    #[test]
    fn check_rejects_unsafe_values() {
        let mut site = SiteConfig::new("blog", "deploy");
        site.domains = vec!["default".to_string(), "x; rm -rf /".to_string()];
        assert!(site.check().is_err());

        let mut site = SiteConfig::new("blog", "deploy");
        site.deploy_to = Some("relative/path".to_string());
        assert!(site.check().is_err());

        let mut site = SiteConfig::new("blog", "deploy");
        site.additional_shared_assets = vec!["../../etc".to_string()];
        assert!(site.check().is_err());

        let mut site = SiteConfig::new("blog", "deploy");
        site.keep_releases = 0;
        assert!(site.check().is_err());
    }

    #[test]
    fn check_allows_empty_domain_list() {
        let mut site = SiteConfig::new("blog", "deploy");
        site.domains.clear();
        assert!(site.check().is_ok());
    }

    #[test]
    fn require_repository_reports_missing_key() {
        let site = SiteConfig::new("blog", "deploy");
        let err = site.require_repository().unwrap_err();
        assert_eq!(err.code.as_str(), "config.missing_key");
    }

    #[test]
    fn load_servers_requires_at_least_one() {
        let site = SiteConfig::new("blog", "deploy");
        let err = site.load_servers().unwrap_err();
        assert_eq!(err.details["key"], "servers");
        assert_eq!(err.hints.len(), 1);
    }

    #[test]
    fn site_id_derives_from_application() {
        assert_eq!(id_from_application("marketing_site"), "marketing-site");
        assert_eq!(id_from_application("Intranet.v2"), "intranet-v2");
    }

    #[test]
    fn unsupported_scm_or_strategy_is_rejected() {
        for json in [
            r#"{"application":"blog","user":"deploy","scm":"svn"}"#,
            r#"{"application":"blog","user":"deploy","deployVia":"copy"}"#,
        ] {
            assert!(serde_json::from_str::<SiteConfig>(json).is_err(), "{}", json);
        }
        let site: SiteConfig = serde_json::from_str(
            r#"{"application":"blog","user":"deploy","scm":"git","deployVia":"remote_cache"}"#,
        )
        .unwrap();
        assert_eq!(site.deploy_via, DeployStrategy::RemoteCache);
    }
}
