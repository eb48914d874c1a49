use std::fmt;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::process::CommandRunner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    #[serde(alias = "OPEN")]
    Open,
    #[serde(alias = "CLOSED")]
    Closed,
    #[serde(alias = "MERGED")]
    Merged,
}

impl fmt::Display for PrState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrState::Open => write!(f, "open"),
            PrState::Closed => write!(f, "closed"),
            PrState::Merged => write!(f, "merged"),
        }
    }
}

/// State filter accepted by `gh pr list --state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrStateFilter {
    Open,
    Closed,
    Merged,
    All,
}

impl PrStateFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            PrStateFilter::Open => "open",
            PrStateFilter::Closed => "closed",
            PrStateFilter::Merged => "merged",
            PrStateFilter::All => "all",
        }
    }

    pub fn matches(self, state: PrState) -> bool {
        match self {
            PrStateFilter::Open => state == PrState::Open,
            PrStateFilter::Closed => state == PrState::Closed,
            PrStateFilter::Merged => state == PrState::Merged,
            PrStateFilter::All => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrComment {
    pub author: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrReview {
    pub author: String,
    pub body: String,
    pub state: ReviewState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub state: PrState,
    pub author: String,
    pub base: String,
    pub head: String,
    pub comments: Vec<PrComment>,
    pub reviews: Vec<PrReview>,
}

/// Read-only queries over pull requests.
///
/// Transport failures are reported as "not found" / "none": the rules decide
/// what that means for the exercise.
pub trait PrInspector {
    fn view(&self, number: u64) -> Option<PullRequest>;

    fn list(&self, state: PrStateFilter) -> Vec<PullRequest>;
}

// --- gh JSON shapes ---

#[derive(Debug, Deserialize)]
struct GhAuthor {
    #[serde(default)]
    login: String,
}

#[derive(Debug, Deserialize)]
struct GhComment {
    author: Option<GhAuthor>,
    #[serde(default)]
    body: String,
}

#[derive(Debug, Deserialize)]
struct GhReview {
    author: Option<GhAuthor>,
    #[serde(default)]
    body: String,
    state: ReviewState,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhPullRequest {
    number: u64,
    #[serde(default)]
    title: String,
    body: Option<String>,
    state: PrState,
    author: Option<GhAuthor>,
    #[serde(default)]
    head_ref_name: String,
    #[serde(default)]
    base_ref_name: String,
    #[serde(default)]
    comments: Vec<GhComment>,
    #[serde(default)]
    reviews: Vec<GhReview>,
}

fn login(author: Option<GhAuthor>) -> String {
    author.map(|a| a.login).unwrap_or_default()
}

impl From<GhPullRequest> for PullRequest {
    fn from(gh: GhPullRequest) -> Self {
        PullRequest {
            number: gh.number,
            title: gh.title,
            body: gh.body.unwrap_or_default(),
            state: gh.state,
            author: login(gh.author),
            base: gh.base_ref_name,
            head: gh.head_ref_name,
            comments: gh
                .comments
                .into_iter()
                .map(|c| PrComment {
                    author: login(c.author),
                    body: c.body,
                })
                .collect(),
            reviews: gh
                .reviews
                .into_iter()
                .map(|r| PrReview {
                    author: login(r.author),
                    body: r.body,
                    state: r.state,
                })
                .collect(),
        }
    }
}

const VIEW_FIELDS: &str = "number,title,body,state,author,headRefName,baseRefName,comments,reviews";
const LIST_FIELDS: &str = "number,title,body,state,author,headRefName,baseRefName";

/// [`PrInspector`] backed by the `gh` CLI in the current repository.
pub struct GhPullRequests<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> GhPullRequests<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    fn gh(&self, args: &[&str]) -> Option<String> {
        match self.runner.run("gh", args, &[("GH_PAGER", "cat")]) {
            Ok(output) if output.success() => Some(output.stdout),
            Ok(output) => {
                warn!(?args, stderr = %output.stderr.trim(), "gh failed");
                None
            }
            Err(e) => {
                warn!(error = %e, "failed to run gh");
                None
            }
        }
    }
}

impl<R: CommandRunner> PrInspector for GhPullRequests<R> {
    fn view(&self, number: u64) -> Option<PullRequest> {
        let number_arg = number.to_string();
        let json = self.gh(&["pr", "view", &number_arg, "--json", VIEW_FIELDS])?;
        match serde_json::from_str::<GhPullRequest>(&json) {
            Ok(pr) => {
                debug!(number, "fetched pull request");
                Some(pr.into())
            }
            Err(e) => {
                warn!(number, error = %e, "failed to parse gh pr view output");
                None
            }
        }
    }

    fn list(&self, state: PrStateFilter) -> Vec<PullRequest> {
        let Some(json) = self.gh(&[
            "pr",
            "list",
            "--state",
            state.as_str(),
            "--json",
            LIST_FIELDS,
        ]) else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<GhPullRequest>>(&json) {
            Ok(prs) => {
                let prs: Vec<PullRequest> = prs
                    .into_iter()
                    .map(PullRequest::from)
                    .filter(|pr| state.matches(pr.state))
                    .collect();
                debug!(count = prs.len(), state = state.as_str(), "listed pull requests");
                prs
            }
            Err(e) => {
                warn!(error = %e, "failed to parse gh pr list output");
                Vec::new()
            }
        }
    }
}
