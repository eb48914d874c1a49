use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};

/// Every diagnostic the rules can emit, plus the success line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    BranchNotCreated,
    BranchNotTracking,
    BranchMissingCommit,
    BranchNotMerged,
    PrNotFound,
    PrWrongState,
    PrNoComments,
    PrNoResponse,
    PrNoReviews,
    Success,
}

impl MessageKey {
    pub const ALL: [MessageKey; 10] = [
        MessageKey::BranchNotCreated,
        MessageKey::BranchNotTracking,
        MessageKey::BranchMissingCommit,
        MessageKey::BranchNotMerged,
        MessageKey::PrNotFound,
        MessageKey::PrWrongState,
        MessageKey::PrNoComments,
        MessageKey::PrNoResponse,
        MessageKey::PrNoReviews,
        MessageKey::Success,
    ];

    /// Name used in the `[messages]` table of an exercise file.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKey::BranchNotCreated => "branch_not_created",
            MessageKey::BranchNotTracking => "branch_not_tracking",
            MessageKey::BranchMissingCommit => "branch_missing_commit",
            MessageKey::BranchNotMerged => "branch_not_merged",
            MessageKey::PrNotFound => "pr_not_found",
            MessageKey::PrWrongState => "pr_wrong_state",
            MessageKey::PrNoComments => "pr_no_comments",
            MessageKey::PrNoResponse => "pr_no_response",
            MessageKey::PrNoReviews => "pr_no_reviews",
            MessageKey::Success => "success",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    fn default_template(self) -> &'static str {
        match self {
            MessageKey::BranchNotCreated => "The local {{ branch }} branch is not created.",
            MessageKey::BranchNotTracking => {
                "The local {{ branch }} branch does not track {{ remote }}/{{ branch }}."
            }
            MessageKey::BranchMissingCommit => {
                "The local {{ branch }} branch does not contain the latest commit from {{ target }}."
            }
            MessageKey::BranchNotMerged => {
                "The local {{ branch }} branch has no merge commit. \
                 Pull {{ remote }}/{{ branch }} to merge the diverged histories."
            }
            MessageKey::PrNotFound => "Pull request #{{ number }} could not be found.",
            MessageKey::PrWrongState => {
                "Pull request #{{ number }} is {{ actual }}, expected {{ expected }}."
            }
            MessageKey::PrNoComments => "Pull request #{{ number }} has no comments.",
            MessageKey::PrNoResponse => {
                "Pull request #{{ number }} has no response comment from you."
            }
            MessageKey::PrNoReviews => "Pull request #{{ number }} has no reviews.",
            MessageKey::Success => {
                "Great work! All required branches are present and correctly set up."
            }
        }
    }

    /// Variables the rules supply when rendering this message.
    pub fn variables(self) -> &'static [&'static str] {
        match self {
            MessageKey::BranchNotCreated => &["branch"],
            MessageKey::BranchNotTracking | MessageKey::BranchNotMerged => &["branch", "remote"],
            MessageKey::BranchMissingCommit => &["branch", "target"],
            MessageKey::PrNotFound
            | MessageKey::PrNoComments
            | MessageKey::PrNoResponse
            | MessageKey::PrNoReviews => &["number"],
            MessageKey::PrWrongState => &["number", "actual", "expected"],
            MessageKey::Success => &[],
        }
    }
}

/// Compiled diagnostic templates: defaults, optionally overridden per exercise.
pub struct MessageCatalog {
    engine: upon::Engine<'static>,
}

impl MessageCatalog {
    pub fn new() -> Self {
        Self::with_overrides(&HashMap::new()).expect("default message templates are valid")
    }

    /// Build a catalog, replacing defaults with `overrides` (keyed by
    /// [`MessageKey::as_str`]). Unknown keys, syntax errors and references to
    /// variables a message does not provide are rejected up front.
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Result<Self> {
        for name in overrides.keys() {
            if MessageKey::from_name(name).is_none() {
                return Err(Error::ConfigValidation(format!(
                    "unknown message key: {name}"
                )));
            }
        }

        let mut engine = upon::Engine::new();
        for key in MessageKey::ALL {
            let source = overrides
                .get(key.as_str())
                .cloned()
                .unwrap_or_else(|| key.default_template().to_string());
            engine
                .add_template(key.as_str(), source)
                .map_err(|e| Error::ConfigValidation(format!("message {}: {e}", key.as_str())))?;
        }

        let catalog = Self { engine };
        for key in MessageKey::ALL {
            let sample: Vec<(&str, String)> = key
                .variables()
                .iter()
                .map(|v| (*v, format!("<{v}>")))
                .collect();
            let vars: Vec<(&str, &str)> = sample.iter().map(|(k, v)| (*k, v.as_str())).collect();
            catalog.render(key, &vars).map_err(|e| {
                Error::ConfigValidation(format!("message {}: {e}", key.as_str()))
            })?;
        }
        Ok(catalog)
    }

    pub fn render(&self, key: MessageKey, vars: &[(&str, &str)]) -> Result<String> {
        let ctx: BTreeMap<&str, &str> = vars.iter().copied().collect();
        let template = self
            .engine
            .get_template(key.as_str())
            .ok_or_else(|| Error::Template(format!("missing template {}", key.as_str())))?;
        template
            .render(&ctx)
            .to_string()
            .map_err(|e| Error::Template(format!("{}: {e}", key.as_str())))
    }
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::new()
    }
}
