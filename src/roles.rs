use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Leading `[ROLE:<id>]` plus the single whitespace character that separates it
/// from the text. The `ROLE` keyword is matched case-insensitively.
static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\[ROLE:([A-Za-z0-9_-]+)\]\s").unwrap());

/// Identifier of a simulated collaborator, e.g. `teammate-bob`.
///
/// Only `[A-Za-z0-9_-]` is allowed. Comparison ignores case; the given
/// spelling is kept for display so markers read the way the caller wrote them.
#[derive(Debug, Clone, Eq)]
pub struct Role(String);

impl Role {
    pub fn new(id: &str) -> Result<Self> {
        if id.is_empty() {
            return Err(Error::InvalidRole("role must not be empty".to_string()));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::InvalidRole(format!(
                "role contains invalid characters (allowed: a-zA-Z0-9_-): {id}"
            )));
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase form, as returned by [`extract_role`].
    pub fn normalized(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl PartialEq for Role {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Role::new(s)
    }
}

/// Prefix `text` with the marker for `role`: `[ROLE:teammate-bob] Add feature`.
pub fn format_marker(role: &Role, text: &str) -> String {
    format!("[ROLE:{role}] {text}")
}

/// Whether `text` starts with a role marker followed by whitespace.
pub fn has_marker(text: &str) -> bool {
    MARKER_RE.is_match(text)
}

/// The lowercased role id of the leading marker, if any.
pub fn extract_role(text: &str) -> Option<String> {
    MARKER_RE
        .captures(text)
        .map(|caps| caps[1].to_ascii_lowercase())
}

/// Remove the leading marker and its separating whitespace character.
///
/// Stacked markers (`[ROLE:a] [ROLE:b] text`) are all removed, not just the
/// first one, so the result never starts with a marker and a second call is a
/// no-op. Each pass still consumes exactly one whitespace character after its
/// marker, so other leading whitespace in the text is kept.
pub fn strip_marker(text: &str) -> String {
    let mut rest = text;
    while let Some(m) = MARKER_RE.find(rest) {
        rest = &rest[m.end()..];
    }
    rest.to_string()
}
