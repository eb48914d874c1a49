//! Verification rules and the pipeline that runs them.
//!
//! A rule inspects repository/PR state and returns diagnostics, one per unmet
//! expectation. Mismatches are never errors; only broken setup configuration
//! aborts a run.

use tracing::{debug, info};

use crate::actions::pr_number_from_url;
use crate::config::{BranchExpectation, CollaborationExpectation, Config, ExerciseFile};
use crate::error::{Error, Result};
use crate::messages::{MessageCatalog, MessageKey};
use crate::process::SystemRunner;
use crate::pulls::{GhPullRequests, PrComment, PrInspector};
use crate::repo::{GitRepository, RepoInspector, is_merge_commit};
use crate::report::{VerificationResult, report};
use crate::roles::{has_marker, strip_marker};
use crate::store::{ConfigSource, ConfigStore, PR_NUMBER, PR_URL};

/// What a rule can look at.
pub struct CheckContext<'a> {
    pub repo: &'a dyn RepoInspector,
    pub prs: &'a dyn PrInspector,
    pub store: &'a dyn ConfigSource,
    pub messages: &'a MessageCatalog,
    pub remote: &'a str,
}

pub trait Rule {
    fn name(&self) -> String;

    fn check(&self, ctx: &CheckContext<'_>) -> Result<Vec<String>>;
}

/// Existence, then tracking or containment, of one local branch.
pub struct BranchRule {
    expectation: BranchExpectation,
}

impl BranchRule {
    pub fn new(expectation: BranchExpectation) -> Self {
        Self { expectation }
    }

    /// Only require that the branch exists.
    pub fn exists(name: &str) -> Self {
        Self::new(BranchExpectation {
            name: name.to_string(),
            tracking: false,
            contains: None,
        })
    }
}

impl Rule for BranchRule {
    fn name(&self) -> String {
        format!("branch:{}", self.expectation.name)
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Result<Vec<String>> {
        let branch = self.expectation.name.as_str();
        if !ctx.repo.has_branch(branch) {
            let msg = ctx
                .messages
                .render(MessageKey::BranchNotCreated, &[("branch", branch)])?;
            return Ok(vec![msg]);
        }

        if self.expectation.tracking {
            let expected = format!("{}/{branch}", ctx.remote);
            let actual = ctx.repo.tracking_target(branch);
            if actual.as_deref() != Some(expected.as_str()) {
                debug!(branch, ?actual, expected, "tracking mismatch");
                let msg = ctx.messages.render(
                    MessageKey::BranchNotTracking,
                    &[("branch", branch), ("remote", ctx.remote)],
                )?;
                return Ok(vec![msg]);
            }
        } else if let Some(target) = &self.expectation.contains
            && !ctx.repo.remote_tip_matches(branch, target)
        {
            let msg = ctx.messages.render(
                MessageKey::BranchMissingCommit,
                &[("branch", branch), ("target", target.as_str())],
            )?;
            return Ok(vec![msg]);
        }

        Ok(Vec::new())
    }
}

/// One of the first `depth` commits of a branch must be a merge commit.
pub struct MergeShapeRule {
    branch: String,
    depth: usize,
}

impl MergeShapeRule {
    pub fn new(branch: &str, depth: usize) -> Self {
        Self {
            branch: branch.to_string(),
            depth: depth.max(1),
        }
    }
}

impl Rule for MergeShapeRule {
    fn name(&self) -> String {
        format!("merge:{}", self.branch)
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Result<Vec<String>> {
        // A missing branch is reported by its existence rule.
        if !ctx.repo.has_branch(&self.branch) {
            return Ok(Vec::new());
        }
        let merged = ctx
            .repo
            .commits_of(&self.branch)
            .iter()
            .take(self.depth)
            .any(is_merge_commit);
        if merged {
            return Ok(Vec::new());
        }
        let msg = ctx.messages.render(
            MessageKey::BranchNotMerged,
            &[("branch", self.branch.as_str()), ("remote", ctx.remote)],
        )?;
        Ok(vec![msg])
    }
}

/// State, comments and reviews of the pull request recorded during setup.
pub struct CollaborationRule {
    expectation: CollaborationExpectation,
}

impl CollaborationRule {
    pub fn new(expectation: CollaborationExpectation) -> Self {
        Self { expectation }
    }

    /// A comment counts as the student's response when something is left
    /// after removing any role marker. With `require_human_response` it must
    /// also not have been written through a role scope.
    fn is_response(&self, comment: &PrComment) -> bool {
        if strip_marker(&comment.body).trim().is_empty() {
            return false;
        }
        !(self.expectation.require_human_response && has_marker(&comment.body))
    }
}

impl Rule for CollaborationRule {
    fn name(&self) -> String {
        "collaboration".to_string()
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Result<Vec<String>> {
        let number = recorded_pr_number(ctx.store)?;
        let number_text = number.to_string();
        let vars = [("number", number_text.as_str())];

        let Some(pr) = ctx.prs.view(number) else {
            return Ok(vec![ctx.messages.render(MessageKey::PrNotFound, &vars)?]);
        };

        let mut diagnostics = Vec::new();

        if let Some(expected) = self.expectation.state
            && pr.state != expected
        {
            let actual = pr.state.to_string();
            let expected = expected.to_string();
            diagnostics.push(ctx.messages.render(
                MessageKey::PrWrongState,
                &[
                    ("number", number_text.as_str()),
                    ("actual", actual.as_str()),
                    ("expected", expected.as_str()),
                ],
            )?);
        }

        if pr.comments.is_empty() {
            diagnostics.push(ctx.messages.render(MessageKey::PrNoComments, &vars)?);
        } else if !pr.comments.iter().any(|c| self.is_response(c)) {
            diagnostics.push(ctx.messages.render(MessageKey::PrNoResponse, &vars)?);
        }

        if self.expectation.require_review && pr.reviews.is_empty() {
            diagnostics.push(ctx.messages.render(MessageKey::PrNoReviews, &vars)?);
        }

        Ok(diagnostics)
    }
}

/// PR number written during setup: `pr_number`, or the number at the end of
/// `pr_url` when only the URL was recorded.
pub fn recorded_pr_number(store: &dyn ConfigSource) -> Result<u64> {
    if let Some(raw) = store.read(PR_NUMBER)? {
        return match raw.trim().parse::<u64>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(Error::Store(format!("{PR_NUMBER} is not a valid PR number: {raw}"))),
        };
    }
    if let Some(url) = store.read(PR_URL)? {
        return pr_number_from_url(&url)
            .filter(|n| *n > 0)
            .ok_or_else(|| Error::Store(format!("{PR_URL} is not a pull request URL: {url}")));
    }
    Err(Error::ConfigurationMissing(PR_NUMBER.to_string()))
}

/// Ordered rules for one exercise.
#[derive(Default)]
pub struct Pipeline {
    rules: Vec<Box<dyn Rule>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Branch rules in file order, then existence rules for merge branches
    /// not listed as branches, then merge-shape rules, then the
    /// collaboration rule.
    pub fn for_exercise(exercise: &ExerciseFile) -> Self {
        let mut pipeline = Self::new();
        for branch in &exercise.branches {
            pipeline = pipeline.with_rule(BranchRule::new(branch.clone()));
        }
        for (i, merge) in exercise.merges.iter().enumerate() {
            let listed = exercise.branches.iter().any(|b| b.name == merge.branch);
            let earlier = exercise.merges[..i].iter().any(|m| m.branch == merge.branch);
            if !listed && !earlier {
                pipeline = pipeline.with_rule(BranchRule::exists(&merge.branch));
            }
        }
        for merge in &exercise.merges {
            pipeline = pipeline.with_rule(MergeShapeRule::new(&merge.branch, merge.depth));
        }
        if let Some(collaboration) = &exercise.collaboration {
            pipeline = pipeline.with_rule(CollaborationRule::new(collaboration.clone()));
        }
        pipeline
    }

    pub fn rule_names(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Run every rule in order, concatenating their diagnostics.
    pub fn run(&self, ctx: &CheckContext<'_>) -> Result<Vec<String>> {
        let mut diagnostics = Vec::new();
        for rule in &self.rules {
            let found = rule.check(ctx)?;
            debug!(rule = %rule.name(), count = found.len(), "rule checked");
            diagnostics.extend(found);
        }
        Ok(diagnostics)
    }
}

/// Run `pipeline` and report the outcome.
pub fn verify(pipeline: &Pipeline, ctx: &CheckContext<'_>) -> Result<VerificationResult> {
    let diagnostics = pipeline.run(ctx)?;
    let success = ctx.messages.render(MessageKey::Success, &[])?;
    let result = report(diagnostics, &success);
    info!(
        status = %result.status,
        messages = result.messages.len(),
        "verification finished"
    );
    Ok(result)
}

/// Verify a local checkout against an exercise using `git`, `gh` and the
/// persisted store named in `config`.
pub fn verify_config(config: &Config) -> Result<VerificationResult> {
    let runner = SystemRunner::new(&config.repo_dir);
    let repo = GitRepository::new(&runner);
    let prs = GhPullRequests::new(&runner);
    let store = ConfigStore::new(&config.store_path);
    let messages = config.exercise.message_catalog()?;
    let ctx = CheckContext {
        repo: &repo,
        prs: &prs,
        store: &store,
        messages: &messages,
        remote: &config.remote,
    };
    verify(&Pipeline::for_exercise(&config.exercise), &ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MergeExpectation, parse_exercise};
    use crate::pulls::PrState;
    use crate::report::VerificationStatus;
    use crate::store::MemoryStore;
    use crate::test_helpers::{FakePulls, FakeRepo, commit, make_pr};

    struct Env {
        repo: FakeRepo,
        prs: FakePulls,
        store: MemoryStore,
        messages: MessageCatalog,
    }

    impl Env {
        fn new(repo: FakeRepo) -> Self {
            Self {
                repo,
                prs: FakePulls::default(),
                store: MemoryStore::new(),
                messages: MessageCatalog::new(),
            }
        }

        fn ctx(&self) -> CheckContext<'_> {
            CheckContext {
                repo: &self.repo,
                prs: &self.prs,
                store: &self.store,
                messages: &self.messages,
                remote: "origin",
            }
        }
    }

    fn tracked(name: &str) -> BranchExpectation {
        BranchExpectation {
            name: name.to_string(),
            tracking: true,
            contains: None,
        }
    }

    #[test]
    fn test_missing_branch() {
        let env = Env::new(FakeRepo::default());
        let pipeline = Pipeline::new().with_rule(BranchRule::new(tracked("STU")));
        let result = verify(&pipeline, &env.ctx()).unwrap();
        assert_eq!(result.status, VerificationStatus::Unsuccessful);
        assert_eq!(result.messages, vec!["The local STU branch is not created."]);
    }

    #[test]
    fn test_tracking_mismatch_names_branch() {
        let repo = FakeRepo::default().branch("STU", Some("origin/other"), vec![commit("s1", &[])]);
        let env = Env::new(repo);
        let diags = BranchRule::new(tracked("STU")).check(&env.ctx()).unwrap();
        assert_eq!(diags, vec!["The local STU branch does not track origin/STU."]);
    }

    #[test]
    fn test_no_upstream_is_tracking_mismatch() {
        let repo = FakeRepo::default().branch("VWX", None, vec![commit("v1", &[])]);
        let env = Env::new(repo);
        let diags = BranchRule::new(tracked("VWX")).check(&env.ctx()).unwrap();
        assert_eq!(diags.len(), 1);
        assert!(diags[0].contains("VWX"));
    }

    #[test]
    fn test_tracking_correct() {
        let repo = FakeRepo::default().branch("STU", Some("origin/STU"), vec![commit("s1", &[])]);
        let env = Env::new(repo);
        assert!(BranchRule::new(tracked("STU")).check(&env.ctx()).unwrap().is_empty());
    }

    #[test]
    fn test_contains_remote_tip() {
        let repo = FakeRepo::default()
            .branch("ABC", None, vec![commit("a3", &["a2"]), commit("a2", &["a1"]), commit("a1", &[])])
            .reference("origin/ABC", "a2");
        let env = Env::new(repo);
        let rule = BranchRule::new(BranchExpectation {
            name: "ABC".to_string(),
            tracking: false,
            contains: Some("origin/ABC".to_string()),
        });
        assert!(rule.check(&env.ctx()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_remote_tip() {
        let repo = FakeRepo::default()
            .branch("ABC", None, vec![commit("a1", &[])])
            .reference("origin/ABC", "a2");
        let env = Env::new(repo);
        let rule = BranchRule::new(BranchExpectation {
            name: "ABC".to_string(),
            tracking: false,
            contains: Some("origin/ABC".to_string()),
        });
        assert_eq!(
            rule.check(&env.ctx()).unwrap(),
            vec!["The local ABC branch does not contain the latest commit from origin/ABC."]
        );
    }

    #[test]
    fn test_merge_shape_tip_is_merge() {
        let repo = FakeRepo::default()
            .branch(
                "DEF",
                Some("origin/DEF"),
                vec![commit("m", &["d2", "r1"]), commit("d2", &["d1"]), commit("r1", &["d1"]), commit("d1", &[])],
            )
            .reference("origin/DEF", "r1");
        let env = Env::new(repo);
        let exercise = ExerciseFile {
            branches: vec![tracked("DEF")],
            merges: vec![MergeExpectation {
                branch: "DEF".to_string(),
                depth: 1,
            }],
            ..Default::default()
        };
        let diags = Pipeline::for_exercise(&exercise).run(&env.ctx()).unwrap();
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn test_merge_shape_linear_history() {
        let repo = FakeRepo::default().branch("DEF", None, vec![commit("d2", &["d1"]), commit("d1", &[])]);
        let env = Env::new(repo);
        let diags = MergeShapeRule::new("DEF", 5).check(&env.ctx()).unwrap();
        assert_eq!(diags.len(), 1);
        assert!(diags[0].contains("has no merge commit"));
    }

    #[test]
    fn test_merge_shape_respects_depth() {
        let repo = FakeRepo::default().branch(
            "DEF",
            None,
            vec![commit("d3", &["m"]), commit("m", &["d1", "r1"]), commit("r1", &["d1"]), commit("d1", &[])],
        );
        let env = Env::new(repo);
        assert_eq!(MergeShapeRule::new("DEF", 1).check(&env.ctx()).unwrap().len(), 1);
        assert!(MergeShapeRule::new("DEF", 2).check(&env.ctx()).unwrap().is_empty());
    }

    #[test]
    fn test_merge_branch_missing_reported_once() {
        let env = Env::new(FakeRepo::default());
        let exercise = parse_exercise("[[merges]]\nbranch = \"DEF\"\n").unwrap();
        let diags = Pipeline::for_exercise(&exercise).run(&env.ctx()).unwrap();
        assert_eq!(diags, vec!["The local DEF branch is not created."]);
    }

    #[test]
    fn test_pipeline_order() {
        let toml = r#"
[[merges]]
branch = "DEF"
[[branches]]
name = "STU"
tracking = true
[[branches]]
name = "ABC"
[collaboration]
"#;
        let exercise = parse_exercise(toml).unwrap();
        assert_eq!(
            Pipeline::for_exercise(&exercise).rule_names(),
            vec!["branch:STU", "branch:ABC", "branch:DEF", "merge:DEF", "collaboration"]
        );
    }

    #[test]
    fn test_diagnostics_follow_rule_order() {
        let repo = FakeRepo::default().branch("DEF", None, vec![commit("d1", &[])]);
        let mut env = Env::new(repo);
        env.store = MemoryStore::new().with(PR_NUMBER, 1);
        env.prs = FakePulls::default().with(make_pr(1, PrState::Open, &[]));
        let toml = r#"
[[branches]]
name = "STU"
[[merges]]
branch = "DEF"
[collaboration]
"#;
        let exercise = parse_exercise(toml).unwrap();
        let result = verify(&Pipeline::for_exercise(&exercise), &env.ctx()).unwrap();
        assert_eq!(
            result.messages,
            vec![
                "The local STU branch is not created.",
                "The local DEF branch has no merge commit. Pull origin/DEF to merge the diverged histories.",
                "Pull request #1 has no comments.",
            ]
        );
    }

    #[test]
    fn test_collaboration_no_comments() {
        let mut env = Env::new(FakeRepo::default());
        env.store = MemoryStore::new().with(PR_NUMBER, 1);
        env.prs = FakePulls::default().with(make_pr(1, PrState::Open, &[]));
        let rule = CollaborationRule::new(CollaborationExpectation::default());
        assert_eq!(
            rule.check(&env.ctx()).unwrap(),
            vec!["Pull request #1 has no comments."]
        );
    }

    #[test]
    fn test_collaboration_human_comment_passes() {
        let mut env = Env::new(FakeRepo::default());
        env.store = MemoryStore::new().with(PR_NUMBER, 1);
        env.prs = FakePulls::default().with(make_pr(
            1,
            PrState::Open,
            &["[ROLE:teammate-bob] Thanks for the review!", "Happy to help!"],
        ));
        let rule = CollaborationRule::new(CollaborationExpectation::default());
        assert!(rule.check(&env.ctx()).unwrap().is_empty());
    }

    #[test]
    fn test_collaboration_single_tagged_comment_passes_by_default() {
        let mut env = Env::new(FakeRepo::default());
        env.store = MemoryStore::new().with(PR_NUMBER, 1);
        env.prs = FakePulls::default().with(make_pr(
            1,
            PrState::Open,
            &["[ROLE:teammate-bob] Thanks for the review!"],
        ));
        let rule = CollaborationRule::new(CollaborationExpectation::default());
        assert!(rule.check(&env.ctx()).unwrap().is_empty());

        let file = parse_exercise("[collaboration]\n").unwrap();
        let result = verify(&Pipeline::for_exercise(&file), &env.ctx()).unwrap();
        assert_eq!(result.status, VerificationStatus::Successful);
    }

    #[test]
    fn test_collaboration_strict_rejects_role_comments() {
        let mut env = Env::new(FakeRepo::default());
        env.store = MemoryStore::new().with(PR_NUMBER, 1);
        env.prs = FakePulls::default().with(make_pr(
            1,
            PrState::Open,
            &["[ROLE:teammate-bob] Thanks for the review!", "   "],
        ));
        let strict = CollaborationRule::new(CollaborationExpectation {
            require_human_response: true,
            ..Default::default()
        });
        assert_eq!(
            strict.check(&env.ctx()).unwrap(),
            vec!["Pull request #1 has no response comment from you."]
        );
    }

    #[test]
    fn test_collaboration_marker_only_comment_does_not_count() {
        let mut env = Env::new(FakeRepo::default());
        env.store = MemoryStore::new().with(PR_NUMBER, 1);
        env.prs = FakePulls::default().with(make_pr(1, PrState::Open, &["[ROLE:bob] "]));
        let rule = CollaborationRule::new(CollaborationExpectation::default());
        assert_eq!(
            rule.check(&env.ctx()).unwrap(),
            vec!["Pull request #1 has no response comment from you."]
        );
    }

    #[test]
    fn test_collaboration_state_and_review() {
        let mut env = Env::new(FakeRepo::default());
        env.store = MemoryStore::new().with(PR_NUMBER, 4);
        env.prs = FakePulls::default().with(make_pr(4, PrState::Open, &["done"]));
        let rule = CollaborationRule::new(CollaborationExpectation {
            state: Some(PrState::Merged),
            require_human_response: true,
            require_review: true,
        });
        assert_eq!(
            rule.check(&env.ctx()).unwrap(),
            vec![
                "Pull request #4 is open, expected merged.",
                "Pull request #4 has no reviews.",
            ]
        );
    }

    #[test]
    fn test_collaboration_pr_not_found() {
        let mut env = Env::new(FakeRepo::default());
        env.store = MemoryStore::new().with(PR_NUMBER, 9);
        let rule = CollaborationRule::new(CollaborationExpectation::default());
        assert_eq!(
            rule.check(&env.ctx()).unwrap(),
            vec!["Pull request #9 could not be found."]
        );
    }

    #[test]
    fn test_collaboration_missing_config_cannot_grade() {
        let env = Env::new(FakeRepo::default());
        let pipeline = Pipeline::new()
            .with_rule(BranchRule::exists("STU"))
            .with_rule(CollaborationRule::new(CollaborationExpectation::default()));
        let err = verify(&pipeline, &env.ctx()).unwrap_err();
        assert!(matches!(err, Error::ConfigurationMissing(ref key) if key == "pr_number"));
        assert!(err.is_cannot_grade());
    }

    #[test]
    fn test_pr_number_falls_back_to_url() {
        let store = MemoryStore::new().with(PR_URL, "https://github.com/me/glossary/pull/3");
        assert_eq!(recorded_pr_number(&store).unwrap(), 3);
    }

    #[test]
    fn test_pr_number_invalid() {
        let store = MemoryStore::new().with(PR_NUMBER, "abc");
        assert!(recorded_pr_number(&store).unwrap_err().is_cannot_grade());
        let store = MemoryStore::new().with(PR_NUMBER, 0);
        assert!(recorded_pr_number(&store).is_err());
    }

    #[test]
    fn test_empty_pipeline_succeeds() {
        let env = Env::new(FakeRepo::default());
        let result = verify(&Pipeline::new(), &env.ctx()).unwrap();
        assert!(result.is_successful());
        assert_eq!(
            result.messages,
            vec!["Great work! All required branches are present and correctly set up."]
        );
    }

    #[test]
    fn test_verify_is_repeatable() {
        let repo = FakeRepo::default().branch("STU", Some("origin/x"), vec![commit("s", &[])]);
        let env = Env::new(repo);
        let pipeline = Pipeline::new()
            .with_rule(BranchRule::new(tracked("STU")))
            .with_rule(BranchRule::exists("VWX"));
        let first = verify(&pipeline, &env.ctx()).unwrap();
        let second = verify(&pipeline, &env.ctx()).unwrap();
        assert_eq!(first, second);
    }
}
