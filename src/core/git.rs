use serde::Serialize;
use std::path::Path;
use std::process::Command;

use crate::error::{Error, Result};
use crate::utils::validation;

// ============================================================================
// Low-level Git Primitives (local, path-based)
// ============================================================================

fn execute_git(path: &Path, args: &[&str]) -> Result<std::process::Output> {
    Command::new("git")
        .args(args)
        .current_dir(path)
        .output()
        .map_err(|e| {
            Error::git_command_failed(format!("Failed to run git {}: {}", args.join(" "), e))
        })
}

fn require_success(action: &str, output: &std::process::Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(Error::git_command_failed(format!(
        "git {} failed: {}",
        action,
        stderr.trim()
    )))
}

/// `git config --get <key>`, trimmed. Empty when unset.
fn config_value(path: &Path, key: &str) -> Result<String> {
    let output = execute_git(path, &["config", "--get", key])?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

// ============================================================================
// Revision resolution
// ============================================================================

/// Resolve `branch` in `repository` to a commit id with `git ls-remote`.
pub fn resolve_revision(repository: &str, branch: &str) -> Result<String> {
    if is_commit_id(branch) {
        return Ok(branch.to_ascii_lowercase());
    }

    let cwd = std::env::current_dir()
        .map_err(|e| Error::internal_io(e.to_string(), Some("current directory".to_string())))?;
    let output = execute_git(&cwd, &["ls-remote", "--", repository, branch])?;
    require_success("ls-remote", &output)?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_ls_remote(&stdout, branch).ok_or_else(|| {
        Error::git_command_failed(format!(
            "Unable to resolve '{}' in {}",
            branch, repository
        ))
        .with_hint("Check the site's branch and repository settings")
    })
}

/// Pick the commit for `branch` out of `git ls-remote` output.
/// Branch heads win over tags; annotated tags resolve through `^{}`.
pub fn parse_ls_remote(output: &str, branch: &str) -> Option<String> {
    let refs: Vec<(&str, &str)> = output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            Some((parts.next()?, parts.next()?))
        })
        .collect();

    let wanted = [
        format!("refs/heads/{}", branch),
        format!("refs/tags/{}^{{}}", branch),
        format!("refs/tags/{}", branch),
        branch.to_string(),
    ];

    wanted.iter().find_map(|name| {
        refs.iter()
            .find(|(_, r)| r == name)
            .map(|(sha, _)| sha.to_string())
    })
}

fn is_commit_id(value: &str) -> bool {
    value.len() == 40 && value.chars().all(|c| c.is_ascii_hexdigit())
}

// ============================================================================
// Deploy tags
// ============================================================================

/// `release_<name>`, or `<stage>_release_<name>` when a stage is configured.
pub fn deploy_tag_name(release_name: &str, stage: Option<&str>) -> String {
    match stage {
        Some(stage) if !stage.is_empty() => format!("{}_release_{}", stage, release_name),
        _ => format!("release_{}", release_name),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployTagOutput {
    pub tag: String,
    pub revision: String,
    pub message: String,
    pub pushed: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Tag `revision` in the repository at `path` and push the tag to origin.
pub fn push_deploy_tag(
    path: &Path,
    release_name: &str,
    stage: Option<&str>,
    revision: &str,
) -> Result<DeployTagOutput> {
    let revision = validation::require_revision(revision, "revision")?;
    if !is_git_repo(path) {
        return Err(Error::git_command_failed(format!(
            "{} is not a git repository",
            path.display()
        ))
        .with_hint("Run 'dropship tag' from a checkout of the site's repository"));
    }

    let user = config_value(path, "user.name")?;
    let email = config_value(path, "user.email")?;
    let tag = deploy_tag_name(release_name, stage);
    let message = format!("Deployed by {} <{}>", user, email);

    log_status!("git", "Tagging {} as {}", revision, tag);
    let output = execute_git(path, &["tag", &tag, &revision, "-m", &message])?;
    require_success("tag", &output)?;

    log_status!("git", "Pushing {} to origin", tag);
    let output = execute_git(path, &["push", "origin", "tag", &tag])?;
    require_success("push", &output)?;

    Ok(DeployTagOutput {
        tag,
        revision,
        message,
        pushed: true,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

fn is_git_repo(path: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--git-dir"])
        .current_dir(path)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
