//! In-memory collaborators for unit and integration tests.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::actions::{ActionExecutor, MergeMethod, ReviewAction};
use crate::error::{Error, Result};
use crate::process::{CommandOutput, CommandRunner};
use crate::pulls::{PrComment, PrInspector, PrState, PrStateFilter, PullRequest};
use crate::repo::{Commit, RepoInspector};

/// One call observed by [`RecordingExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedAction {
    Commit {
        message: String,
    },
    Merge {
        target: String,
        fast_forward: bool,
        message: String,
    },
    CreatePr {
        title: String,
        body: String,
        base: String,
        head: String,
    },
    Comment {
        number: u64,
        body: String,
    },
    Review {
        number: u64,
        body: String,
        action: ReviewAction,
    },
    Close {
        number: u64,
        comment: Option<String>,
    },
    MergePr {
        number: u64,
        method: MergeMethod,
        delete_branch: bool,
    },
}

/// [`ActionExecutor`] that records every call and always succeeds.
#[derive(Default)]
pub struct RecordingExecutor {
    calls: RefCell<Vec<RecordedAction>>,
}

impl RecordingExecutor {
    pub fn calls(&self) -> Vec<RecordedAction> {
        self.calls.borrow().clone()
    }

    fn record(&self, action: RecordedAction) {
        self.calls.borrow_mut().push(action);
    }
}

impl ActionExecutor for RecordingExecutor {
    fn commit(&self, message: &str) -> Result<()> {
        self.record(RecordedAction::Commit {
            message: message.to_string(),
        });
        Ok(())
    }

    fn merge_with_message(&self, target: &str, fast_forward: bool, message: &str) -> Result<()> {
        self.record(RecordedAction::Merge {
            target: target.to_string(),
            fast_forward,
            message: message.to_string(),
        });
        Ok(())
    }

    fn create_pr(&self, title: &str, body: &str, base: &str, head: &str) -> Result<Option<String>> {
        self.record(RecordedAction::CreatePr {
            title: title.to_string(),
            body: body.to_string(),
            base: base.to_string(),
            head: head.to_string(),
        });
        let number = self.calls.borrow().len();
        Ok(Some(format!("https://github.com/test/repo/pull/{number}")))
    }

    fn comment_on_pr(&self, number: u64, body: &str) -> Result<()> {
        self.record(RecordedAction::Comment {
            number,
            body: body.to_string(),
        });
        Ok(())
    }

    fn review_pr(&self, number: u64, body: &str, action: ReviewAction) -> Result<()> {
        self.record(RecordedAction::Review {
            number,
            body: body.to_string(),
            action,
        });
        Ok(())
    }

    fn close_pr(&self, number: u64, comment: Option<&str>) -> Result<()> {
        self.record(RecordedAction::Close {
            number,
            comment: comment.map(str::to_string),
        });
        Ok(())
    }

    fn merge_pr(&self, number: u64, method: MergeMethod, delete_branch: bool) -> Result<()> {
        self.record(RecordedAction::MergePr {
            number,
            method,
            delete_branch,
        });
        Ok(())
    }
}

/// [`CommandRunner`] that replays canned outputs in order and records the
/// command lines it was given. Running out of outputs is a spawn error.
pub struct ScriptedRunner {
    responses: RefCell<Vec<CommandOutput>>,
    calls: RefCell<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn new(responses: Vec<CommandOutput>) -> Self {
        Self {
            responses: RefCell::new(responses),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// `count` successful runs with empty output.
    pub fn succeeding(count: usize) -> Self {
        Self::new((0..count).map(|_| Self::ok("")).collect())
    }

    pub fn ok(stdout: &str) -> CommandOutput {
        CommandOutput {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn failed(stderr: &str) -> CommandOutput {
        CommandOutput {
            exit_code: 1,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    /// Program plus arguments of every call, in order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[&str], _env: &[(&str, &str)]) -> Result<CommandOutput> {
        let mut line = vec![program.to_string()];
        line.extend(args.iter().map(|a| a.to_string()));
        self.calls.borrow_mut().push(line);

        let mut responses = self.responses.borrow_mut();
        if responses.is_empty() {
            Err(Error::Process("no more scripted responses".to_string()))
        } else {
            Ok(responses.remove(0))
        }
    }
}

/// A commit with empty message and author.
pub fn commit(id: &str, parents: &[&str]) -> Commit {
    Commit {
        id: id.to_string(),
        parents: parents.iter().map(|p| p.to_string()).collect(),
        message: String::new(),
        author: String::new(),
    }
}

#[derive(Debug, Clone, Default)]
struct FakeBranch {
    tracking: Option<String>,
    commits: Vec<Commit>,
}

/// In-memory [`RepoInspector`].
#[derive(Debug, Clone, Default)]
pub struct FakeRepo {
    branches: HashMap<String, FakeBranch>,
    refs: HashMap<String, String>,
}

impl FakeRepo {
    /// Add a local branch; `commits` are tip first.
    pub fn branch(mut self, name: &str, tracking: Option<&str>, commits: Vec<Commit>) -> Self {
        self.branches.insert(
            name.to_string(),
            FakeBranch {
                tracking: tracking.map(str::to_string),
                commits,
            },
        );
        self
    }

    /// Point a revision such as `origin/ABC` at a commit id.
    pub fn reference(mut self, rev: &str, id: &str) -> Self {
        self.refs.insert(rev.to_string(), id.to_string());
        self
    }
}

impl RepoInspector for FakeRepo {
    fn has_branch(&self, name: &str) -> bool {
        self.branches.contains_key(name)
    }

    fn tracking_target(&self, name: &str) -> Option<String> {
        self.branches.get(name)?.tracking.clone()
    }

    fn commits_of(&self, name: &str) -> Vec<Commit> {
        self.branches
            .get(name)
            .map(|b| b.commits.clone())
            .unwrap_or_default()
    }

    fn resolve(&self, rev: &str) -> Option<String> {
        if let Some(id) = self.refs.get(rev) {
            return Some(id.clone());
        }
        if let Some(branch) = self.branches.get(rev) {
            return branch.commits.first().map(|c| c.id.clone());
        }
        self.branches
            .values()
            .flat_map(|b| b.commits.iter())
            .find(|c| c.id == rev)
            .map(|c| c.id.clone())
    }
}

/// In-memory [`PrInspector`].
#[derive(Debug, Clone, Default)]
pub struct FakePulls {
    prs: Vec<PullRequest>,
}

impl FakePulls {
    pub fn with(mut self, pr: PullRequest) -> Self {
        self.prs.push(pr);
        self
    }
}

impl PrInspector for FakePulls {
    fn view(&self, number: u64) -> Option<PullRequest> {
        self.prs.iter().find(|pr| pr.number == number).cloned()
    }

    fn list(&self, state: PrStateFilter) -> Vec<PullRequest> {
        self.prs
            .iter()
            .filter(|pr| state.matches(pr.state))
            .cloned()
            .collect()
    }
}

/// A pull request from `PQR` into `main` with the given comment bodies.
pub fn make_pr(number: u64, state: PrState, comments: &[&str]) -> PullRequest {
    PullRequest {
        number,
        title: "Add refactoring glossary term".to_string(),
        body: "This PR adds the definition for refactoring.".to_string(),
        state,
        author: "student".to_string(),
        base: "main".to_string(),
        head: "PQR".to_string(),
        comments: comments
            .iter()
            .map(|body| PrComment {
                author: "student".to_string(),
                body: body.to_string(),
            })
            .collect(),
        reviews: Vec::new(),
    }
}
