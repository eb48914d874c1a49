use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};

/// Key under which setup records the pull request number.
pub const PR_NUMBER: &str = "pr_number";
/// Key under which setup records the simulated teammate's role.
pub const TEAMMATE_ROLE: &str = "teammate_role";
/// Key under which setup records the pull request URL.
pub const PR_URL: &str = "pr_url";

/// Default file name of the persisted exercise configuration.
pub const DEFAULT_STORE_FILE: &str = ".gitmastery-exercise.json";

/// Key/value configuration written during setup and read during verification.
pub trait ConfigSource {
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Like [`read`](Self::read), but a missing key means the exercise cannot be graded.
    fn require(&self, key: &str) -> Result<String> {
        self.read(key)?
            .ok_or_else(|| Error::ConfigurationMissing(key.to_string()))
    }
}

/// JSON object file holding the persisted exercise configuration.
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default store location relative to a repo root.
    pub fn default_path(repo_root: &Path) -> PathBuf {
        repo_root.join(DEFAULT_STORE_FILE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the whole object. A missing file is an empty configuration.
    pub fn load(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::Store(format!("failed to read {}: {e}", self.path.display())))?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        let value: Value = serde_json::from_str(&content).map_err(|e| {
            Error::Store(format!("failed to parse {}: {e}", self.path.display()))
        })?;
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(Error::Store(format!(
                "{}: root must be a JSON object",
                self.path.display()
            ))),
        }
    }

    /// Set `key` to `value`, keeping every other entry.
    pub fn write(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let mut map = self.load()?;
        map.insert(key.to_string(), value.into());
        let content = serde_json::to_string_pretty(&Value::Object(map))
            .map_err(|e| Error::Store(format!("failed to serialize config: {e}")))?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, content)?;
        debug!(key, path = %self.path.display(), "wrote exercise config");
        Ok(())
    }
}

impl ConfigSource for ConfigStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.get(key).and_then(value_text))
    }
}

/// In-memory [`ConfigSource`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl ConfigSource for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }
}

/// Scalars read as text; `null` and containers count as absent.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
