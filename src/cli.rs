use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::actions::{ActionExecutor, MergeMethod, ReviewAction, pr_number_from_url, with_role};
use crate::error::Result;
use crate::roles::Role;
use crate::store::{ConfigStore, PR_NUMBER, PR_URL, TEAMMATE_ROLE};

/// gitdrill: grade git exercises and act as simulated teammates
#[derive(Parser, Debug, Clone)]
#[command(name = "gitdrill", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CliCommand {
    /// Check a local repository against an exercise definition
    Verify(VerifyArgs),

    /// Run one git or pull request operation as a role
    Act(ActArgs),

    /// Role marker utilities for setup scripts
    Marker {
        #[command(subcommand)]
        command: MarkerCommand,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct VerifyArgs {
    /// Exercise definition file (default: exercise.toml)
    #[arg(long)]
    pub exercise: Option<String>,

    /// Repository to inspect (default: current directory)
    #[arg(long)]
    pub repo: Option<String>,

    /// Persisted exercise configuration (default: <repo>/.gitmastery-exercise.json)
    #[arg(long)]
    pub store: Option<String>,

    /// Remote name used for tracking and merge checks
    #[arg(long)]
    pub remote: Option<String>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ActArgs {
    /// Role to tag messages with, e.g. teammate-bob
    #[arg(long)]
    pub role: Role,

    /// Repository to act in (default: current directory)
    #[arg(long)]
    pub repo: Option<String>,

    /// Where create-pr records the new pull request
    #[arg(long)]
    pub store: Option<String>,

    #[command(subcommand)]
    pub action: ActCommand,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ActCommand {
    /// Commit staged changes
    Commit {
        #[arg(short, long)]
        message: String,
    },

    /// Merge TARGET into the current branch
    Merge {
        target: String,

        #[arg(short, long)]
        message: String,

        /// Always create a merge commit
        #[arg(long)]
        no_ff: bool,
    },

    /// Open a pull request and record it
    CreatePr {
        #[arg(long)]
        title: String,

        #[arg(long)]
        body: String,

        #[arg(long, default_value = "main")]
        base: String,

        #[arg(long)]
        head: String,
    },

    /// Comment on a pull request
    Comment {
        number: u64,

        #[arg(long)]
        body: String,
    },

    /// Review a pull request
    Review {
        number: u64,

        #[arg(long)]
        body: String,

        #[arg(long, value_enum, default_value_t = ReviewAction::Comment)]
        action: ReviewAction,
    },

    /// Close a pull request without merging
    Close {
        number: u64,

        #[arg(long)]
        comment: Option<String>,
    },

    /// Merge a pull request
    MergePr {
        number: u64,

        #[arg(long, value_enum, default_value_t = MergeMethod::Merge)]
        method: MergeMethod,

        #[arg(long)]
        delete_branch: bool,
    },
}

impl ActCommand {
    /// Run the operation through `executor` acting as `role`.
    ///
    /// A created pull request is recorded in `store` (URL, number and the
    /// acting role) so a later `verify` can find it. Returns the PR URL.
    pub fn perform<E: ActionExecutor + ?Sized>(
        &self,
        executor: &E,
        role: Role,
        store: &ConfigStore,
    ) -> Result<Option<String>> {
        let acting = role.clone();
        let url = with_role(executor, role, |scope| -> Result<Option<String>> {
            match self {
                ActCommand::Commit { message } => scope.commit(message)?,
                ActCommand::Merge {
                    target,
                    message,
                    no_ff,
                } => scope.merge_with_message(target, !no_ff, message)?,
                ActCommand::CreatePr {
                    title,
                    body,
                    base,
                    head,
                } => return scope.create_pr(title, body, base, head),
                ActCommand::Comment { number, body } => scope.comment_on_pr(*number, body)?,
                ActCommand::Review {
                    number,
                    body,
                    action,
                } => scope.review_pr(*number, body, *action)?,
                ActCommand::Close { number, comment } => {
                    scope.close_pr(*number, comment.as_deref())?
                }
                ActCommand::MergePr {
                    number,
                    method,
                    delete_branch,
                } => scope.merge_pr(*number, *method, *delete_branch)?,
            }
            Ok(None)
        })?;

        if let Some(url) = &url {
            store.write(PR_URL, url.as_str())?;
            if let Some(number) = pr_number_from_url(url) {
                store.write(PR_NUMBER, number)?;
            }
            store.write(TEAMMATE_ROLE, acting.as_str())?;
            info!(url = %url, role = %acting, path = %store.path().display(), "recorded pull request");
        }
        Ok(url)
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum MarkerCommand {
    /// Print TEXT prefixed with the marker for ROLE
    Format {
        #[arg(long)]
        role: Role,

        text: String,
    },

    /// Print TEXT without its leading marker
    Strip { text: String },

    /// Print the role of TEXT's marker; exits 1 when there is none
    Extract { text: String },

    /// Exit 0 when TEXT starts with a marker, 1 otherwise
    Check { text: String },
}
