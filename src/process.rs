use std::path::PathBuf;
use std::process::Command;

use tracing::debug;

use crate::error::{Error, Result};

/// Output from a completed child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Abstraction over running external commands (`git`, `gh`) for testability.
///
/// A non-zero exit is not an `Err`: callers inspect [`CommandOutput::success`].
/// `Err` is reserved for failing to spawn the process at all.
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[&str], env: &[(&str, &str)]) -> Result<CommandOutput>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, program: &str, args: &[&str], env: &[(&str, &str)]) -> Result<CommandOutput> {
        (**self).run(program, args, env)
    }
}

/// Runs commands with `std::process::Command` inside a working directory.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    working_dir: PathBuf,
}

impl SystemRunner {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str], env: &[(&str, &str)]) -> Result<CommandOutput> {
        debug!(program, ?args, dir = %self.working_dir.display(), "running command");

        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(&self.working_dir);
        for (key, value) in env {
            cmd.env(key, value);
        }

        let output = cmd
            .output()
            .map_err(|e| Error::Process(format!("failed to spawn '{program}': {e}")))?;

        let result = CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if !result.success() {
            debug!(
                program,
                exit_code = result.exit_code,
                stderr = %result.stderr.trim(),
                "command failed"
            );
        }
        Ok(result)
    }
}
