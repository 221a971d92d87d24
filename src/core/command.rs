//! Typed remote commands.
//!
//! Every shell string dropship sends to a server is built here. Constructors
//! validate their inputs; `render` is infallible and only quotes arguments
//! that contain shell metacharacters, so ordinary paths render verbatim
//! (`mkdir -p /var/www/blog/releases /var/www/blog/shared`).

use serde::Serialize;

use crate::error::{Error, Result};
use crate::utils::shell::{quote_arg, quote_args};
use crate::utils::validation;

/// Drush variables toggled around a deploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrushVariable {
    SiteOffline,
    MaintenanceMode,
}

impl DrushVariable {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrushVariable::SiteOffline => "site_offline",
            DrushVariable::MaintenanceMode => "maintenance_mode",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum DrushCommand {
    BamBackup,
    UpdateDb,
    CacheClearAll,
    VariableSet { variable: DrushVariable, enabled: bool },
}

impl DrushCommand {
    fn args(&self) -> Vec<&'static str> {
        match self {
            DrushCommand::BamBackup => vec!["bam-backup"],
            DrushCommand::UpdateDb => vec!["updatedb", "-y"],
            DrushCommand::CacheClearAll => vec!["cc", "all"],
            DrushCommand::VariableSet { variable, enabled } => vec![
                "vset",
                variable.as_str(),
                if *enabled { "1" } else { "0" },
                "-y",
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandKind {
    Mkdir {
        dirs: Vec<String>,
    },
    Chown {
        user: String,
        group: String,
        path: String,
    },
    /// `chmod 2775`: group-writable with setgid so new files inherit the group.
    ChmodShared {
        dirs: Vec<String>,
    },
    ChmodGroupWritable {
        dirs: Vec<String>,
    },
    RelinkShared {
        shared: String,
        target: String,
    },
    Drush {
        program: Vec<String>,
        root: String,
        domain: String,
        command: DrushCommand,
    },
    SyncCachedCopy {
        repository: String,
        revision: String,
        cached_copy: String,
        submodules: bool,
    },
    CopyRelease {
        from: String,
        to: String,
    },
    WriteRevision {
        release: String,
        revision: String,
    },
    LinkCurrent {
        release: String,
        current: String,
    },
    ReadLink {
        path: String,
    },
    ReadRevision {
        release: String,
    },
    PruneReleases {
        releases: String,
        keep: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCommand {
    #[serde(flatten)]
    pub kind: CommandKind,
    pub sudo: bool,
}

fn abs(path: &str, field: &str) -> Result<String> {
    Ok(validation::require_absolute_path(path, field)?.to_string())
}

fn require_dirs(dirs: &[String], field: &str) -> Result<Vec<String>> {
    validation::require_non_empty_vec(dirs, field, "At least one directory is required")?;
    dirs.iter().map(|dir| abs(dir, field)).collect()
}

impl RemoteCommand {
    fn new(kind: CommandKind) -> Self {
        Self { kind, sudo: false }
    }

    /// Run the command under `sudo` when `enabled`. Release pruning elevates
    /// only its `rm`.
    pub fn with_sudo(mut self, enabled: bool) -> Self {
        self.sudo = enabled;
        self
    }

    pub fn mkdir(dirs: &[String]) -> Result<Self> {
        Ok(Self::new(CommandKind::Mkdir {
            dirs: require_dirs(dirs, "mkdir")?,
        }))
    }

    pub fn chown(user: &str, group: &str, path: &str) -> Result<Self> {
        Ok(Self::new(CommandKind::Chown {
            user: validation::require_identifier(user, "user")?.to_string(),
            group: validation::require_identifier(group, "runnerGroup")?.to_string(),
            path: abs(path, "chown")?,
        }))
    }

    pub fn chmod_shared(dirs: &[String]) -> Result<Self> {
        Ok(Self::new(CommandKind::ChmodShared {
            dirs: require_dirs(dirs, "chmod")?,
        }))
    }

    pub fn chmod_group_writable(dirs: &[String]) -> Result<Self> {
        Ok(Self::new(CommandKind::ChmodGroupWritable {
            dirs: require_dirs(dirs, "chmod")?,
        }))
    }

    pub fn relink_shared(shared: &str, target: &str) -> Result<Self> {
        Ok(Self::new(CommandKind::RelinkShared {
            shared: abs(shared, "shared")?,
            target: abs(target, "target")?,
        }))
    }

    pub fn drush(
        program: &[String],
        root: &str,
        domain: &str,
        command: DrushCommand,
    ) -> Result<Self> {
        validation::require_non_empty_vec(program, "drushCmd", "Drush command cannot be empty")?;
        if program.iter().any(|word| word.contains(|c: char| c.is_control())) {
            return Err(Error::validation_invalid_argument(
                "drushCmd",
                "Drush command contains control characters",
                None,
                None,
            ));
        }
        Ok(Self::new(CommandKind::Drush {
            program: program.to_vec(),
            root: abs(root, "appPath")?,
            domain: validation::require_domain(domain, "domain")?.to_string(),
            command,
        }))
    }

    pub fn sync_cached_copy(
        repository: &str,
        revision: &str,
        cached_copy: &str,
        submodules: bool,
    ) -> Result<Self> {
        let repository =
            validation::require_non_empty(repository, "repository", "Repository cannot be empty")?;
        if repository.contains(|c: char| c.is_control()) || repository.starts_with('-') {
            return Err(Error::validation_invalid_argument(
                "repository",
                "Repository URL is not valid",
                Some(repository.to_string()),
                None,
            ));
        }
        Ok(Self::new(CommandKind::SyncCachedCopy {
            repository: repository.to_string(),
            revision: validation::require_revision(revision, "revision")?,
            cached_copy: abs(cached_copy, "cachedCopy")?,
            submodules,
        }))
    }

    pub fn copy_release(from: &str, to: &str) -> Result<Self> {
        Ok(Self::new(CommandKind::CopyRelease {
            from: abs(from, "cachedCopy")?,
            to: abs(to, "release")?,
        }))
    }

    pub fn write_revision(release: &str, revision: &str) -> Result<Self> {
        Ok(Self::new(CommandKind::WriteRevision {
            release: abs(release, "release")?,
            revision: validation::require_revision(revision, "revision")?,
        }))
    }

    pub fn link_current(release: &str, current: &str) -> Result<Self> {
        Ok(Self::new(CommandKind::LinkCurrent {
            release: abs(release, "release")?,
            current: abs(current, "current")?,
        }))
    }

    pub fn read_link(path: &str) -> Result<Self> {
        Ok(Self::new(CommandKind::ReadLink {
            path: abs(path, "path")?,
        }))
    }

    pub fn read_revision(release: &str) -> Result<Self> {
        Ok(Self::new(CommandKind::ReadRevision {
            release: abs(release, "release")?,
        }))
    }

    pub fn prune_releases(releases: &str, keep: usize) -> Result<Self> {
        if keep == 0 {
            return Err(Error::validation_invalid_argument(
                "keepReleases",
                "Must keep at least one release",
                None,
                None,
            ));
        }
        Ok(Self::new(CommandKind::PruneReleases {
            releases: abs(releases, "releases")?,
            keep,
        }))
    }

    /// True for the remove-then-link shape counted by symlink tasks.
    pub fn is_relink(&self) -> bool {
        matches!(self.kind, CommandKind::RelinkShared { .. })
    }

    pub fn render(&self) -> String {
        let body = match &self.kind {
            CommandKind::Mkdir { dirs } => format!("mkdir -p {}", quote_args(dirs)),
            CommandKind::Chown { user, group, path } => format!(
                "chown -R {}:{} {}",
                quote_arg(user),
                quote_arg(group),
                quote_arg(path)
            ),
            CommandKind::ChmodShared { dirs } => format!("chmod 2775 {}", quote_args(dirs)),
            CommandKind::ChmodGroupWritable { dirs } => format!("chmod g+w {}", quote_args(dirs)),
            CommandKind::RelinkShared { shared, target } => format!(
                "rm -rf {target} && ln -nfs {shared} {target}",
                shared = quote_arg(shared),
                target = quote_arg(target)
            ),
            CommandKind::Drush {
                program,
                root,
                domain,
                command,
            } => format!(
                "{} -r {} -l {} {}",
                quote_args(program),
                quote_arg(root),
                quote_arg(domain),
                command.args().join(" ")
            ),
            CommandKind::SyncCachedCopy {
                repository,
                revision,
                cached_copy,
                submodules,
            } => {
                let repo = quote_arg(repository);
                let dir = quote_arg(cached_copy);
                let mut script = format!(
                    "if [ -d {dir} ]; then cd {dir} && git fetch -q origin && git fetch --tags -q origin && git reset -q --hard {rev} && git clean -q -d -x -f; \
                     else git clone -q {repo} {dir} && cd {dir} && git checkout -q -b deploy {rev}; fi",
                    dir = dir,
                    repo = repo,
                    rev = revision
                );
                if *submodules {
                    script.push_str(&format!(
                        " && cd {} && git submodule -q init && git submodule -q sync && git submodule -q update --init --recursive",
                        dir
                    ));
                }
                script
            }
            CommandKind::CopyRelease { from, to } => {
                format!("cp -RPp {} {}", quote_arg(from), quote_arg(to))
            }
            CommandKind::WriteRevision { release, revision } => {
                format!("echo {} > {}/REVISION", revision, quote_arg(release))
            }
            CommandKind::LinkCurrent { release, current } => format!(
                "rm -f {current} && ln -s {release} {current}",
                release = quote_arg(release),
                current = quote_arg(current)
            ),
            CommandKind::ReadLink { path } => format!("readlink {}", quote_arg(path)),
            CommandKind::ReadRevision { release } => {
                format!("cat {}/REVISION", quote_arg(release))
            }
            // sudo cannot run the `cd` builtin, so it goes on the removal
            CommandKind::PruneReleases { releases, keep } => {
                return format!(
                    "cd {} && ls -1 | sort -r | tail -n +{} | xargs -r {}rm -rf",
                    quote_arg(releases),
                    keep + 1,
                    if self.sudo { "sudo " } else { "" }
                );
            }
        };

        if self.sudo {
            format!("sudo {}", body)
        } else {
            body
        }
    }
}
