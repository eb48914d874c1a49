use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::cli::VerifyArgs;
use crate::error::{Error, Result};
use crate::messages::MessageCatalog;
use crate::pulls::PrState;
use crate::store::ConfigStore;

pub const DEFAULT_EXERCISE_FILE: &str = "exercise.toml";
pub const DEFAULT_REMOTE: &str = "origin";

/// A local branch the student must end up with.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BranchExpectation {
    pub name: String,
    /// Require the branch to track `<remote>/<name>`.
    #[serde(default)]
    pub tracking: bool,
    /// Revision (commit id or remote ref) the branch must contain. Only
    /// checked for branches that are not required to track.
    pub contains: Option<String>,
}

/// A branch whose recent history must include a merge commit.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MergeExpectation {
    pub branch: String,
    /// How many commits from the tip to search.
    #[serde(default = "default_merge_depth")]
    pub depth: usize,
}

/// Expectations on the pull request recorded during setup.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CollaborationExpectation {
    pub state: Option<PrState>,
    /// Only count comments that carry no role marker.
    #[serde(default)]
    pub require_human_response: bool,
    #[serde(default)]
    pub require_review: bool,
}

impl Default for CollaborationExpectation {
    fn default() -> Self {
        Self {
            state: None,
            require_human_response: false,
            require_review: false,
        }
    }
}

fn default_merge_depth() -> usize {
    1
}

/// Contents of an exercise definition file.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExerciseFile {
    pub name: Option<String>,
    pub remote: Option<String>,
    #[serde(default)]
    pub branches: Vec<BranchExpectation>,
    #[serde(default)]
    pub merges: Vec<MergeExpectation>,
    pub collaboration: Option<CollaborationExpectation>,
    #[serde(default)]
    pub messages: HashMap<String, String>,
}

impl ExerciseFile {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        parse_exercise(&content)
    }

    pub fn message_catalog(&self) -> Result<MessageCatalog> {
        MessageCatalog::with_overrides(&self.messages)
    }
}

pub fn parse_exercise(content: &str) -> Result<ExerciseFile> {
    let exercise: ExerciseFile = toml::from_str(content)?;
    validate(&exercise)?;
    Ok(exercise)
}

fn validate(exercise: &ExerciseFile) -> Result<()> {
    let mut seen = HashSet::new();
    for branch in &exercise.branches {
        if branch.name.trim().is_empty() {
            return Err(Error::ConfigValidation(
                "branch name must not be empty".to_string(),
            ));
        }
        if !seen.insert(branch.name.as_str()) {
            return Err(Error::ConfigValidation(format!(
                "duplicate branch: {}",
                branch.name
            )));
        }
        if branch.tracking && branch.contains.is_some() {
            return Err(Error::ConfigValidation(format!(
                "branch {}: `contains` is only checked when `tracking` is false",
                branch.name
            )));
        }
    }
    for merge in &exercise.merges {
        if merge.branch.trim().is_empty() {
            return Err(Error::ConfigValidation(
                "merge branch name must not be empty".to_string(),
            ));
        }
        if merge.depth == 0 {
            return Err(Error::ConfigValidation(format!(
                "merge {}: depth must be > 0",
                merge.branch
            )));
        }
    }
    if let Some(remote) = &exercise.remote
        && remote.trim().is_empty()
    {
        return Err(Error::ConfigValidation(
            "remote must not be empty".to_string(),
        ));
    }
    exercise.message_catalog()?;
    Ok(())
}

/// Everything a verification run needs, after CLI flags are layered over the
/// exercise file.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub exercise: ExerciseFile,
    pub repo_dir: PathBuf,
    pub store_path: PathBuf,
    pub remote: String,
    pub json: bool,
}

impl Config {
    pub fn load(args: &VerifyArgs) -> Result<Self> {
        let exercise_path = args
            .exercise
            .clone()
            .unwrap_or_else(|| DEFAULT_EXERCISE_FILE.to_string());
        let file = ExerciseFile::load(Path::new(&exercise_path))?;
        Ok(merge(file, args))
    }
}

pub fn merge(file: ExerciseFile, args: &VerifyArgs) -> Config {
    let repo_dir = args
        .repo
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let store_path = args
        .store
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| ConfigStore::default_path(&repo_dir));
    let remote = args
        .remote
        .clone()
        .or_else(|| file.remote.clone())
        .unwrap_or_else(|| DEFAULT_REMOTE.to_string());
    Config {
        exercise: file,
        repo_dir,
        store_path,
        remote,
        json: args.json,
    }
}
