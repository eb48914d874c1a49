use tracing::{debug, warn};

use crate::process::CommandRunner;

/// A commit as seen from a branch's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: String,
    pub parents: Vec<String>,
    pub message: String,
    pub author: String,
}

impl Commit {
    /// Two or more parents: the result of reconciling diverged histories.
    pub fn is_merge(&self) -> bool {
        self.parents.len() >= 2
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }
}

pub fn is_merge_commit(commit: &Commit) -> bool {
    commit.is_merge()
}

/// Read-only queries over a local repository.
///
/// Lookups that fail (missing branch, git error) answer `false`, `None` or an
/// empty history. The rules turn those answers into diagnostics.
pub trait RepoInspector {
    fn has_branch(&self, name: &str) -> bool;

    /// Upstream of a local branch as `<remote>/<branch>`, e.g. `origin/STU`.
    fn tracking_target(&self, name: &str) -> Option<String>;

    /// Commits reachable from the branch tip, tip first.
    fn commits_of(&self, name: &str) -> Vec<Commit>;

    /// Commit id a revision (commit id, `origin/ABC`, ...) points at.
    fn resolve(&self, rev: &str) -> Option<String>;

    /// Whether the tip of `remote` is among the commits of `local`, i.e. the
    /// local branch has pulled the remote's latest commit, not necessarily as
    /// its own tip.
    fn remote_tip_matches(&self, local: &str, remote: &str) -> bool {
        let Some(tip) = self.resolve(remote) else {
            debug!(remote, "remote revision does not resolve");
            return false;
        };
        self.commits_of(local).iter().any(|c| c.id == tip)
    }
}

const FIELD_SEP: char = '\x1f';
const RECORD_SEP: char = '\x1e';
const LOG_FORMAT: &str = "--format=%H%x1f%P%x1f%an%x1f%B%x1e";

/// [`RepoInspector`] backed by the `git` binary.
pub struct GitRepository<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> GitRepository<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Stdout of a successful git invocation, `None` otherwise.
    fn git(&self, args: &[&str]) -> Option<String> {
        match self.runner.run("git", args, &[]) {
            Ok(output) if output.success() => Some(output.stdout),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, ?args, "failed to run git");
                None
            }
        }
    }

    fn config_value(&self, key: &str) -> Option<String> {
        self.git(&["config", "--get", key])
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

impl<R: CommandRunner> RepoInspector for GitRepository<R> {
    fn has_branch(&self, name: &str) -> bool {
        let local_ref = format!("refs/heads/{name}");
        self.git(&["rev-parse", "--verify", "--quiet", &local_ref])
            .is_some()
    }

    fn tracking_target(&self, name: &str) -> Option<String> {
        let remote = self.config_value(&format!("branch.{name}.remote"))?;
        let merge = self.config_value(&format!("branch.{name}.merge"))?;
        let branch = merge.strip_prefix("refs/heads/").unwrap_or(&merge);
        if remote == "." {
            Some(branch.to_string())
        } else {
            Some(format!("{remote}/{branch}"))
        }
    }

    fn commits_of(&self, name: &str) -> Vec<Commit> {
        if !self.has_branch(name) {
            return Vec::new();
        }
        let local_ref = format!("refs/heads/{name}");
        match self.git(&["log", LOG_FORMAT, &local_ref, "--"]) {
            Some(stdout) => parse_log(&stdout),
            None => {
                warn!(branch = name, "git log failed");
                Vec::new()
            }
        }
    }

    fn resolve(&self, rev: &str) -> Option<String> {
        let spec = format!("{rev}^{{commit}}");
        self.git(&["rev-parse", "--verify", "--quiet", &spec])
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Asks git for ancestry instead of listing the branch history.
    fn remote_tip_matches(&self, local: &str, remote: &str) -> bool {
        let Some(tip) = self.resolve(remote) else {
            debug!(remote, "remote revision does not resolve");
            return false;
        };
        if !self.has_branch(local) {
            return false;
        }
        let local_ref = format!("refs/heads/{local}");
        self.git(&["merge-base", "--is-ancestor", &tip, &local_ref])
            .is_some()
    }
}

/// Parse `git log` output produced with [`LOG_FORMAT`].
fn parse_log(stdout: &str) -> Vec<Commit> {
    stdout
        .split(RECORD_SEP)
        .map(|record| record.trim_start_matches('\n'))
        .filter(|record| !record.is_empty())
        .filter_map(|record| {
            let mut fields = record.splitn(4, FIELD_SEP);
            let id = fields.next()?.trim().to_string();
            let parents = fields
                .next()?
                .split_whitespace()
                .map(str::to_string)
                .collect();
            let author = fields.next()?.to_string();
            let message = fields.next().unwrap_or_default().trim_end().to_string();
            Some(Commit {
                id,
                parents,
                message,
                author,
            })
        })
        .collect()
}
