//! Actor operations and role-scoped tagging.
//!
//! Setup scripts simulate several collaborators through one [`ActionExecutor`].
//! Wrapping it in a [`RoleScope`] tags every free-text argument (commit and
//! merge messages, PR titles and bodies, comments, reviews) with the scope's
//! role marker before delegating. The scope is a plain value borrowing the base
//! executor: nothing is patched, so once the scope is gone the base executor
//! behaves exactly as it did before.

use std::borrow::Cow;
use std::fmt;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::process::{CommandOutput, CommandRunner};
use crate::roles::{Role, format_marker, has_marker};

/// Verdict submitted with `gh pr review`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReviewAction {
    Approve,
    RequestChanges,
    Comment,
}

impl ReviewAction {
    fn flag(self) -> &'static str {
        match self {
            ReviewAction::Approve => "--approve",
            ReviewAction::RequestChanges => "--request-changes",
            ReviewAction::Comment => "--comment",
        }
    }
}

/// Strategy passed to `gh pr merge`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MergeMethod {
    Merge,
    Squash,
    Rebase,
}

impl MergeMethod {
    fn flag(self) -> &'static str {
        match self {
            MergeMethod::Merge => "--merge",
            MergeMethod::Squash => "--squash",
            MergeMethod::Rebase => "--rebase",
        }
    }
}

impl fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.flag()[2..])
    }
}

/// The git/PR operations a simulated collaborator can perform.
pub trait ActionExecutor {
    /// Commit staged changes.
    fn commit(&self, message: &str) -> Result<()>;

    /// Merge `target` into the current branch with an explicit message.
    fn merge_with_message(&self, target: &str, fast_forward: bool, message: &str) -> Result<()>;

    /// Open a pull request. Returns its URL when the backend reports one.
    fn create_pr(&self, title: &str, body: &str, base: &str, head: &str) -> Result<Option<String>>;

    fn comment_on_pr(&self, number: u64, body: &str) -> Result<()>;

    fn review_pr(&self, number: u64, body: &str, action: ReviewAction) -> Result<()>;

    /// Close a pull request without merging, optionally leaving a comment.
    fn close_pr(&self, number: u64, comment: Option<&str>) -> Result<()>;

    fn merge_pr(&self, number: u64, method: MergeMethod, delete_branch: bool) -> Result<()>;
}

/// An [`ActionExecutor`] acting as one role.
///
/// Created by [`RoleScope::enter`], released by [`RoleScope::exit`] or by
/// going out of scope. Text that already carries a marker is passed through
/// unchanged, so nesting scopes keeps the innermost role.
pub struct RoleScope<'a, E: ActionExecutor + ?Sized> {
    inner: &'a E,
    role: Role,
}

impl<'a, E: ActionExecutor + ?Sized> RoleScope<'a, E> {
    pub fn enter(inner: &'a E, role: Role) -> Self {
        debug!(role = %role, "entering role scope");
        Self { inner, role }
    }

    pub fn active_role(&self) -> &Role {
        &self.role
    }

    /// End the scope. Equivalent to dropping it.
    pub fn exit(self) {}

    fn tag<'t>(&self, text: &'t str) -> Cow<'t, str> {
        if has_marker(text) {
            Cow::Borrowed(text)
        } else {
            Cow::Owned(format_marker(&self.role, text))
        }
    }
}

impl<E: ActionExecutor + ?Sized> Drop for RoleScope<'_, E> {
    fn drop(&mut self) {
        debug!(role = %self.role, "leaving role scope");
    }
}

impl<E: ActionExecutor + ?Sized> ActionExecutor for RoleScope<'_, E> {
    fn commit(&self, message: &str) -> Result<()> {
        self.inner.commit(&self.tag(message))
    }

    fn merge_with_message(&self, target: &str, fast_forward: bool, message: &str) -> Result<()> {
        self.inner
            .merge_with_message(target, fast_forward, &self.tag(message))
    }

    fn create_pr(&self, title: &str, body: &str, base: &str, head: &str) -> Result<Option<String>> {
        self.inner
            .create_pr(&self.tag(title), &self.tag(body), base, head)
    }

    fn comment_on_pr(&self, number: u64, body: &str) -> Result<()> {
        self.inner.comment_on_pr(number, &self.tag(body))
    }

    fn review_pr(&self, number: u64, body: &str, action: ReviewAction) -> Result<()> {
        self.inner.review_pr(number, &self.tag(body), action)
    }

    fn close_pr(&self, number: u64, comment: Option<&str>) -> Result<()> {
        // Empty comments stay empty.
        let tagged = comment.map(|c| {
            if c.is_empty() {
                Cow::Borrowed(c)
            } else {
                self.tag(c)
            }
        });
        self.inner.close_pr(number, tagged.as_deref())
    }

    fn merge_pr(&self, number: u64, method: MergeMethod, delete_branch: bool) -> Result<()> {
        self.inner.merge_pr(number, method, delete_branch)
    }
}

/// Run `body` with `executor` acting as `role`.
///
/// The scope is dropped on every way out of `body`: a normal return, an
/// `Err` the closure hands back, or a panic unwinding through it.
pub fn with_role<E, T, F>(executor: &E, role: Role, body: F) -> T
where
    E: ActionExecutor + ?Sized,
    F: FnOnce(&RoleScope<'_, E>) -> T,
{
    let scope = RoleScope::enter(executor, role);
    body(&scope)
}

/// A named collaborator in an exercise, e.g. `teammate-alice`.
#[derive(Debug, Clone, PartialEq)]
pub struct Teammate {
    role: Role,
}

impl Teammate {
    pub fn new(id: &str) -> Result<Self> {
        Ok(Self {
            role: Role::new(id)?,
        })
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    /// A scope for this teammate over `executor`.
    pub fn acting<'a, E: ActionExecutor + ?Sized>(&self, executor: &'a E) -> RoleScope<'a, E> {
        RoleScope::enter(executor, self.role.clone())
    }

    pub fn act<E, T, F>(&self, executor: &E, body: F) -> T
    where
        E: ActionExecutor + ?Sized,
        F: FnOnce(&RoleScope<'_, E>) -> T,
    {
        with_role(executor, self.role.clone(), body)
    }
}

/// [`ActionExecutor`] that shells out to `git` and `gh`.
pub struct CliActions<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> CliActions<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    fn git(&self, args: &[&str]) -> Result<CommandOutput> {
        self.checked("git", args, &[])
    }

    fn gh(&self, args: &[&str]) -> Result<CommandOutput> {
        self.checked("gh", args, &[("GH_PAGER", "cat")])
    }

    fn checked(&self, program: &str, args: &[&str], env: &[(&str, &str)]) -> Result<CommandOutput> {
        let output = self.runner.run(program, args, env)?;
        if output.success() {
            Ok(output)
        } else {
            let what = args.iter().take(2).copied().collect::<Vec<_>>().join(" ");
            Err(Error::Action(format!(
                "{program} {what} failed: {}",
                output.stderr.trim()
            )))
        }
    }
}

impl<R: CommandRunner> ActionExecutor for CliActions<R> {
    fn commit(&self, message: &str) -> Result<()> {
        self.git(&["commit", "-m", message])?;
        Ok(())
    }

    fn merge_with_message(&self, target: &str, fast_forward: bool, message: &str) -> Result<()> {
        let mut args = vec!["merge", target, "-m", message];
        if !fast_forward {
            args.push("--no-ff");
        }
        self.git(&args)?;
        Ok(())
    }

    fn create_pr(&self, title: &str, body: &str, base: &str, head: &str) -> Result<Option<String>> {
        let output = self.gh(&[
            "pr", "create", "--title", title, "--body", body, "--base", base, "--head", head,
        ])?;
        let url = parse_pr_url(&output.stdout);
        match &url {
            Some(url) => info!(url = %url, "created PR"),
            None => info!("created PR but gh reported no URL"),
        }
        Ok(url)
    }

    fn comment_on_pr(&self, number: u64, body: &str) -> Result<()> {
        let number = number.to_string();
        self.gh(&["pr", "comment", &number, "--body", body])?;
        Ok(())
    }

    fn review_pr(&self, number: u64, body: &str, action: ReviewAction) -> Result<()> {
        let number = number.to_string();
        self.gh(&["pr", "review", &number, "--body", body, action.flag()])?;
        Ok(())
    }

    fn close_pr(&self, number: u64, comment: Option<&str>) -> Result<()> {
        let number = number.to_string();
        let mut args = vec!["pr", "close", number.as_str()];
        if let Some(comment) = comment
            && !comment.is_empty()
        {
            args.extend(["--comment", comment]);
        }
        self.gh(&args)?;
        Ok(())
    }

    fn merge_pr(&self, number: u64, method: MergeMethod, delete_branch: bool) -> Result<()> {
        let number = number.to_string();
        let mut args = vec!["pr", "merge", number.as_str(), method.flag()];
        if delete_branch {
            args.push("--delete-branch");
        }
        self.gh(&args)?;
        Ok(())
    }
}

/// First URL line printed by `gh pr create`.
pub fn parse_pr_url(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("https://"))
        .map(str::to_string)
}

/// PR number from a URL such as `https://github.com/o/r/pull/7`.
pub fn pr_number_from_url(url: &str) -> Option<u64> {
    let mut segments = url.trim().trim_end_matches('/').rsplit('/');
    let number = segments.next()?.parse().ok()?;
    (segments.next()? == "pull").then_some(number)
}
