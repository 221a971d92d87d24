//! Release identity and the remote directory layout derived from it.
//!
//! ```text
//! <deploy_to>/
//!   releases/<release_name>/      one checkout per deploy
//!   shared/<domain>/<child>/      persistent per-domain storage
//!   shared/cached-copy/           remote_cache clone
//!   current -> releases/<name>
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::site::SiteConfig;
use crate::utils::validation;

/// Capistrano-compatible release name format.
pub const RELEASE_NAME_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub name: String,
    pub path: String,
}

impl Release {
    /// A release under `releases_path` named after `now`.
    pub fn at(releases_path: &str, now: DateTime<Utc>) -> Self {
        let name = now.format(RELEASE_NAME_FORMAT).to_string();
        Self {
            path: format!("{}/{}", releases_path, name),
            name,
        }
    }

    /// An existing release, named explicitly (e.g. from the CLI or `current`).
    pub fn named(releases_path: &str, name: &str) -> Result<Self> {
        validate_release_name(name)?;
        Ok(Self {
            name: name.to_string(),
            path: format!("{}/{}", releases_path, name),
        })
    }
}

pub fn validate_release_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        && !name.starts_with('.')
        && !name.starts_with('-');
    if valid {
        Ok(())
    } else {
        Err(Error::validation_invalid_argument(
            "release",
            "Release name must be alphanumeric (dashes, dots and underscores allowed)",
            Some(name.to_string()),
            None,
        ))
    }
}

/// Every path a task needs, resolved once from a site and a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployLayout {
    pub deploy_to: String,
    pub releases_path: String,
    pub shared_path: String,
    pub current_path: String,
    pub cached_copy_path: String,
    pub release: Release,
    /// Drupal root inside the release (`-r` for drush).
    pub app_path: String,
}

impl DeployLayout {
    pub fn new(site: &SiteConfig, release: Release) -> Result<Self> {
        let deploy_to = site.deploy_to();
        validation::require_absolute_path(&deploy_to, "deployTo")?;

        let app_path = match site.app_root.as_deref() {
            Some(root) => format!("{}/{}", release.path, root.trim_matches('/')),
            None => release.path.clone(),
        };

        Ok(Self {
            releases_path: releases_path(site),
            shared_path: format!("{}/shared", deploy_to),
            current_path: format!("{}/current", deploy_to),
            cached_copy_path: format!("{}/shared/cached-copy", deploy_to),
            deploy_to,
            release,
            app_path,
        })
    }

    /// `<shared_path>/<domain>/<child>`
    pub fn shared_domain_path(&self, domain: &str, child: &str) -> String {
        format!("{}/{}/{}", self.shared_path, domain, child)
    }

    /// `<app_path>/sites/<domain>/<asset>`
    pub fn release_domain_path(&self, domain: &str, asset: &str) -> String {
        format!("{}/sites/{}/{}", self.app_path, domain, asset)
    }
}

pub fn releases_path(site: &SiteConfig) -> String {
    format!("{}/releases", site.deploy_to())
}

/// Extract the release name from a `current` symlink target.
pub fn release_name_from_link(target: &str) -> Result<String> {
    let name = target
        .trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();
    validate_release_name(&name)?;
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn site() -> SiteConfig {
        SiteConfig::new("blog", "deploy")
    }

    #[test]
    fn release_name_is_utc_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let release = Release::at("/var/www/blog/releases", now);
        assert_eq!(release.name, "20240309140507");
        assert_eq!(release.path, "/var/www/blog/releases/20240309140507");
    }

    #[test]
    fn named_rejects_traversal() {
        assert!(Release::named("/var/www/blog/releases", "../../etc").is_err());
        assert!(Release::named("/var/www/blog/releases", "").is_err());
        assert!(Release::named("/var/www/blog/releases", "20240309140507").is_ok());
    }

    #[test]
    fn layout_paths_follow_deploy_to() {
        let release = Release::named("/var/www/blog/releases", "20240309140507").unwrap();
        let layout = DeployLayout::new(&site(), release).unwrap();

        assert_eq!(layout.releases_path, "/var/www/blog/releases");
        assert_eq!(layout.shared_path, "/var/www/blog/shared");
        assert_eq!(layout.current_path, "/var/www/blog/current");
        assert_eq!(layout.cached_copy_path, "/var/www/blog/shared/cached-copy");
        assert_eq!(layout.app_path, "/var/www/blog/releases/20240309140507");
        assert_eq!(
            layout.shared_domain_path("default", "files"),
            "/var/www/blog/shared/default/files"
        );
        assert_eq!(
            layout.release_domain_path("example.com", "settings.php"),
            "/var/www/blog/releases/20240309140507/sites/example.com/settings.php"
        );
    }

    #[test]
    fn app_root_nests_drupal_inside_release() {
        let mut site = site();
        site.app_root = Some("docroot/".to_string());
        let release = Release::named("/var/www/blog/releases", "r1").unwrap();
        let layout = DeployLayout::new(&site, release).unwrap();
        assert_eq!(layout.app_path, "/var/www/blog/releases/r1/docroot");
    }

    #[test]
    fn release_name_from_link_takes_basename() {
        assert_eq!(
            release_name_from_link("/var/www/blog/releases/20240309140507\n").unwrap(),
            "20240309140507"
        );
        assert!(release_name_from_link("").is_err());
    }
}
