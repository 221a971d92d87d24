use std::sync::OnceLock;

use dropship::deploy::{self, DeployConfig};
use dropship::pipeline::PipelineRunStatus;
use dropship::{server, site};

const REVISION: &str = "0123456789abcdef0123456789abcdef01234567";

/// Every test in this binary shares one config dir.
fn config_dir() {
    static DIR: OnceLock<tempfile::TempDir> = OnceLock::new();
    let dir = DIR.get_or_init(|| tempfile::tempdir().unwrap());
    std::env::set_var("DROPSHIP_CONFIG_DIR", dir.path());
}

#[test]
fn site_create_applies_defaults_and_derives_id() {
    config_dir();

    let created = site::create(r#"{"application":"marketing_site","user":"deploy"}"#).unwrap();

    assert_eq!(created.id, "marketing-site");
    let loaded = site::load("marketing-site").unwrap();
    assert_eq!(loaded.domains, vec!["default"]);
    assert_eq!(loaded.runner_group, "www-data");

    let err = site::create(r#"{"application":"marketing_site","user":"deploy"}"#).unwrap_err();
    assert_eq!(err.code.as_str(), "validation.invalid_argument");
}

#[test]
fn site_set_merges_and_validates() {
    config_dir();
    site::create(r#"{"id":"shop","application":"shop","user":"deploy"}"#).unwrap();

    let result = site::merge("shop", r#"{"domains":["shop.example.com"],"stage":"staging"}"#)
        .unwrap();
    assert!(result.updated_fields.contains(&"domains".to_string()));
    assert_eq!(site::load("shop").unwrap().stage.as_deref(), Some("staging"));

    let err = site::merge("shop", r#"{"deployTo":"relative/path"}"#).unwrap_err();
    assert_eq!(err.code.as_str(), "validation.invalid_argument");
}

#[test]
fn missing_site_suggests_close_ids() {
    config_dir();
    site::create(r#"{"id":"intranet","application":"intranet","user":"deploy"}"#).unwrap();

    let err = site::load("intranett").unwrap_err();

    assert_eq!(err.code.as_str(), "site.not_found");
    assert_eq!(err.details["suggestions"][0], "intranet");
}

#[test]
fn server_from_flags_round_trips() {
    config_dir();

    let created = server::create_from_flags(
        None,
        "web1.example.com".to_string(),
        "deploy".to_string(),
        Some(2222),
        None,
    )
    .unwrap();

    assert_eq!(created.id, "server-web1-example-com");
    let loaded = server::load(&created.id).unwrap();
    assert_eq!(loaded.port, 2222);
    server::delete(&created.id).unwrap();
    assert!(!server::exists(&created.id));
}

#[test]
fn dry_run_deploy_needs_no_servers() {
    config_dir();
    site::create(
        r#"{
            "id": "news",
            "application": "news",
            "user": "deploy",
            "repository": "git@example.com:news.git",
            "domains": ["default", "news.example.com"],
            "additionalSharedAssets": ["robots.txt"]
        }"#,
    )
    .unwrap();

    let output = deploy::run(
        "news",
        &DeployConfig {
            dry_run: true,
            revision: Some(REVISION.to_string()),
            tag: false,
        },
    )
    .unwrap();

    assert!(output.dry_run);
    assert_eq!(output.result.status, PipelineRunStatus::Success);
    assert_eq!(output.result.tasks.len(), 7);
    assert_eq!(
        output
            .planned_commands
            .iter()
            .filter(|c| c.contains(" && ln -nfs "))
            .count(),
        7
    );
    assert!(output.planned_commands[0].contains("/var/www/news/shared/cached-copy"));
    assert!(output.tag.is_none());
}

#[test]
fn remote_tasks_without_servers_are_config_errors() {
    config_dir();
    site::create(r#"{"id":"wiki","application":"wiki","user":"deploy"}"#).unwrap();

    let err = deploy::setup("wiki", false).unwrap_err();

    assert_eq!(err.code.as_str(), "config.missing_key");
    assert!(!err.hints.is_empty());
}

#[test]
fn dry_run_task_against_named_release() {
    config_dir();
    site::create(r#"{"id":"docs","application":"docs","user":"deploy"}"#).unwrap();

    let output = deploy::run_task("docs", "drush:cache_clear", Some("20240101000000"), None, true)
        .unwrap();

    assert_eq!(
        output.planned_commands,
        vec!["drush -r /var/www/docs/releases/20240101000000 -l default cc all"]
    );
}
