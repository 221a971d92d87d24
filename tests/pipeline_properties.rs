use dropship::hooks::{self, events};
use dropship::pipeline::{self, PipelineRunStatus};
use dropship::release::{DeployLayout, Release};
use dropship::site::SiteConfig;
use dropship::ssh::RecordingRunner;
use dropship::tasks::{self, names, TaskContext};

fn site(domains: &[&str]) -> SiteConfig {
    let mut site = SiteConfig::new("blog", "deploy");
    site.id = "blog".to_string();
    site.domains = domains.iter().map(|d| d.to_string()).collect();
    site
}

fn layout(site: &SiteConfig) -> DeployLayout {
    let release = Release::named("/var/www/blog/releases", "20240309140507").unwrap();
    DeployLayout::new(site, release).unwrap()
}

fn run(name: &str, site: &SiteConfig, runner: &RecordingRunner) -> pipeline::TaskRunResult {
    let layout = layout(site);
    let ctx = TaskContext {
        site,
        layout: &layout,
        revision: None,
    };
    pipeline::run_task(tasks::find(name).unwrap(), &ctx, runner).unwrap()
}

#[test]
fn setup_creates_one_shared_set_per_domain() {
    let all = ["default", "example.com", "shop.example.com"];
    for n in 0..=all.len() {
        let site = site(&all[..n]);
        let runner = RecordingRunner::new();
        run(names::SETUP, &site, &runner);

        let commands = runner.commands();
        let chmods: Vec<&String> = commands.iter().filter(|c| c.starts_with("chmod 2775")).collect();
        assert_eq!(chmods.len(), n, "domains: {:?}", &all[..n]);
        for (chmod, domain) in chmods.iter().zip(&all[..n]) {
            assert_eq!(
                chmod.as_str(),
                format!(
                    "chmod 2775 /var/www/blog/shared/{d}/files /var/www/blog/shared/{d}/private",
                    d = domain
                )
            );
        }
        // mkdir for releases/shared plus one per domain
        assert_eq!(commands.iter().filter(|c| c.starts_with("mkdir -p")).count(), n + 1);
    }
}

#[test]
fn symlink_shared_is_idempotent() {
    let mut site = site(&["default", "example.com"]);
    site.additional_shared_assets = vec!["robots.txt".to_string(), ".htaccess".to_string()];

    let first = RecordingRunner::new();
    run(names::SYMLINK_SHARED, &site, &first);
    let second = RecordingRunner::new();
    run(names::SYMLINK_SHARED, &site, &second);

    assert_eq!(first.commands(), second.commands());
}

#[cfg(unix)]
#[test]
fn symlink_shared_replaces_existing_targets_on_disk() {
    use std::fs;
    use std::os::unix::fs::symlink;
    use std::path::Path;

    let dir = tempfile::tempdir().unwrap();
    let mut site = site(&["default"]);
    site.deploy_to = Some(dir.path().to_string_lossy().to_string());
    site.additional_shared_assets = vec!["robots.txt".to_string()];

    let release = Release::named(&dropship::release::releases_path(&site), "20240309140507").unwrap();
    let layout = DeployLayout::new(&site, release).unwrap();

    for child in ["files", "private"] {
        fs::create_dir_all(layout.shared_domain_path("default", child)).unwrap();
    }
    fs::write(layout.shared_domain_path("default", "settings.php"), "<?php").unwrap();
    fs::write(format!("{}/robots.txt", layout.shared_path), "User-agent: *").unwrap();

    // a real directory, a plain file and a stale link already sit at the targets
    let files = layout.release_domain_path("default", "files");
    fs::create_dir_all(Path::new(&files).join("styles")).unwrap();
    fs::write(layout.release_domain_path("default", "private"), "stale").unwrap();
    symlink("/nonexistent/settings.php", layout.release_domain_path("default", "settings.php")).unwrap();
    fs::write(format!("{}/robots.txt", layout.app_path), "stale").unwrap();

    let expected = [
        (
            layout.release_domain_path("default", "files"),
            layout.shared_domain_path("default", "files"),
        ),
        (
            layout.release_domain_path("default", "private"),
            layout.shared_domain_path("default", "private"),
        ),
        (
            layout.release_domain_path("default", "settings.php"),
            layout.shared_domain_path("default", "settings.php"),
        ),
        (
            format!("{}/robots.txt", layout.app_path),
            format!("{}/robots.txt", layout.shared_path),
        ),
    ];

    let ctx = TaskContext {
        site: &site,
        layout: &layout,
        revision: None,
    };
    let planned = tasks::find(names::SYMLINK_SHARED).unwrap().plan(&ctx).unwrap();

    for pass in 1..=2 {
        for command in &planned {
            let output = dropship::ssh::execute_local_command(&command.render());
            assert!(output.success, "pass {}: {} failed: {}", pass, command.render(), output.stderr);
        }
        for (target, shared) in &expected {
            assert_eq!(
                fs::read_link(target).unwrap(),
                Path::new(shared),
                "pass {}: {}",
                pass,
                target
            );
        }
    }
}

#[test]
fn two_domains_and_one_asset_issue_seven_relinks() {
    let mut site = site(&["default", "example.com"]);
    site.additional_shared_assets = vec!["robots.txt".to_string()];
    let runner = RecordingRunner::new();

    run(names::SYMLINK_SHARED, &site, &runner);

    let commands = runner.commands();
    assert_eq!(commands.len(), 7);
    assert!(commands
        .iter()
        .all(|c| c.starts_with("rm -rf ") && c.contains(" && ln -nfs ")));
    assert_eq!(
        commands[3],
        "rm -rf /var/www/blog/releases/20240309140507/sites/example.com/files && ln -nfs /var/www/blog/shared/example.com/files /var/www/blog/releases/20240309140507/sites/example.com/files"
    );
}

#[test]
fn updatedb_failure_on_one_domain_does_not_stop_the_rest() {
    let site = site(&["a.example.com", "b.example.com"]);
    let layout = layout(&site);
    let ctx = TaskContext {
        site: &site,
        layout: &layout,
        revision: None,
    };
    let runner = RecordingRunner::new().failing_on("-l a.example.com updatedb");

    let result = hooks::fire(&hooks::default_hooks(), events::POST_UPDATE_CODE, &ctx, &runner)
        .unwrap();

    assert!(!result.all_succeeded);
    let commands = runner.commands();
    for domain in ["a.example.com", "b.example.com"] {
        assert!(commands
            .iter()
            .any(|c| c.contains(&format!("-l {} updatedb -y", domain))));
        assert!(commands
            .iter()
            .any(|c| c.contains(&format!("-l {} cc all", domain))));
        assert!(commands
            .iter()
            .any(|c| c.contains(&format!("-l {} vset maintenance_mode 0 -y", domain))));
    }

    let updatedb = result
        .tasks
        .iter()
        .find(|t| t.task == names::UPDATEDB)
        .unwrap();
    assert_eq!(updatedb.status, PipelineRunStatus::PartialSuccess);
    assert_eq!(updatedb.failed_commands().len(), 1);
}

#[test]
fn update_code_hook_runs_five_tasks_in_order_for_any_domain_count() {
    let expected = vec![
        "drupal:symlink_shared",
        "drush:site_offline",
        "drush:updatedb",
        "drush:cache_clear",
        "drush:site_online",
    ];

    for domains in [vec!["default"], vec!["default", "a.example.com", "b.example.com"]] {
        let site = site(&domains);
        let layout = layout(&site);
        let ctx = TaskContext {
            site: &site,
            layout: &layout,
            revision: None,
        };
        let runner = RecordingRunner::new();

        let result =
            hooks::fire(&hooks::default_hooks(), events::POST_UPDATE_CODE, &ctx, &runner).unwrap();

        let order: Vec<&str> = result.tasks.iter().map(|t| t.task.as_str()).collect();
        assert_eq!(order, expected);
        assert!(result.all_succeeded);
    }
}

#[test]
fn setup_failure_aborts_the_run() {
    let site = site(&["default", "example.com"]);
    let runner = RecordingRunner::new().failing_on("/shared/default/files");
    let layout = layout(&site);
    let ctx = TaskContext {
        site: &site,
        layout: &layout,
        revision: None,
    };

    let err = pipeline::run(
        &[
            tasks::find(names::SETUP).unwrap(),
            tasks::find(names::CACHE_CLEAR).unwrap(),
        ],
        &ctx,
        &runner,
    )
    .unwrap_err();

    assert_eq!(err.code.as_str(), "remote.command_failed");
    // mkdir base, chown, then the failing per-domain mkdir; nothing after it
    assert_eq!(runner.commands().len(), 3);
    assert!(runner.commands().iter().all(|c| !c.contains(" cc all")));
}

#[test]
fn backupdb_runs_per_domain_and_tolerates_failures() {
    let site = site(&["default", "example.com"]);
    let runner = RecordingRunner::new().failing_on("bam-backup");

    let result = run(names::BACKUPDB, &site, &runner);

    assert_eq!(result.status, PipelineRunStatus::Failed);
    assert_eq!(
        runner.commands(),
        vec![
            "drush -r /var/www/blog/releases/20240309140507 -l default bam-backup",
            "drush -r /var/www/blog/releases/20240309140507 -l example.com bam-backup",
        ]
    );
}
