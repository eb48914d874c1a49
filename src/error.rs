use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("required exercise configuration is missing: {0}")]
    ConfigurationMissing(String),

    #[error("invalid role: {0}")]
    InvalidRole(String),

    #[error("exercise file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("exercise parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("exercise validation error: {0}")]
    ConfigValidation(String),

    #[error("config store error: {0}")]
    Store(String),

    #[error("message template error: {0}")]
    Template(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("process error: {0}")]
    Process(String),

    #[error("action failed: {0}")]
    Action(String),
}

impl Error {
    /// True when the run could not be graded at all, as opposed to a wrong answer:
    /// the persisted setup configuration is missing or unreadable.
    pub fn is_cannot_grade(&self) -> bool {
        matches!(self, Error::ConfigurationMissing(_) | Error::Store(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
