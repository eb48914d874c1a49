#![allow(dead_code)]

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

pub fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} in {} failed: {}",
        args,
        dir.display(),
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Trimmed stdout of a git command that must succeed.
pub fn git_stdout(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} in {} failed: {}",
        args,
        dir.display(),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn configure_user(dir: &Path) {
    run_git(dir, &["config", "user.email", "test@test.com"]);
    run_git(dir, &["config", "user.name", "Test"]);
    run_git(dir, &["config", "pull.rebase", "false"]);
}

fn commit_file(dir: &Path, file: &str, content: &str, message: &str) {
    std::fs::write(dir.join(file), content).unwrap();
    run_git(dir, &["add", file]);
    run_git(dir, &["commit", "-m", message]);
}

/// A single working repo with one commit on `main`.
pub fn init_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    run_git(dir.path(), &["init"]);
    configure_user(dir.path());
    commit_file(dir.path(), "README.md", "# glossary\n", "init");
    run_git(dir.path(), &["branch", "-M", "main"]);
    dir
}

/// The branch-pull exercise before the student starts.
///
/// `upstream` pushes to `remote`; `student` is a clone of `remote`.
pub struct Exercise {
    pub remote: TempDir,
    pub upstream: TempDir,
    pub student: TempDir,
}

impl Exercise {
    /// Remote has `main`, `STU`, `ABC` and `DEF`. The student has checked
    /// out `ABC` and `DEF`, committed locally on `DEF`, and fetched after
    /// upstream added new commits to both. So local `ABC` is behind and
    /// local `DEF` has diverged. `STU` exists only on the remote.
    pub fn setup() -> Self {
        let remote = TempDir::new().unwrap();
        run_git(remote.path(), &["init", "--bare"]);
        run_git(remote.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);
        let remote_url = remote.path().to_str().unwrap().to_string();

        let upstream = init_repo();
        let up = upstream.path();
        run_git(up, &["remote", "add", "origin", &remote_url]);
        run_git(up, &["push", "-u", "origin", "main"]);
        for branch in ["STU", "ABC", "DEF"] {
            run_git(up, &["checkout", "-b", branch, "main"]);
            let file = format!("{}.txt", branch.to_lowercase());
            commit_file(up, &file, &format!("{branch} terms\n"), &format!("Add {branch} terms"));
            run_git(up, &["push", "-u", "origin", branch]);
        }

        let student = TempDir::new().unwrap();
        let st = student.path();
        run_git(st, &["clone", &remote_url, "."]);
        configure_user(st);
        run_git(st, &["checkout", "ABC"]);
        run_git(st, &["checkout", "DEF"]);
        commit_file(st, "local.txt", "my notes\n", "Add local notes");
        run_git(st, &["checkout", "main"]);

        run_git(up, &["checkout", "ABC"]);
        commit_file(up, "abc.txt", "ABC terms\nabstraction\n", "Add abstraction");
        run_git(up, &["push", "origin", "ABC"]);
        run_git(up, &["checkout", "DEF"]);
        commit_file(up, "def.txt", "DEF terms\ndefect\n", "Add defect");
        run_git(up, &["push", "origin", "DEF"]);

        run_git(st, &["fetch", "origin"]);

        Self {
            remote,
            upstream,
            student,
        }
    }

    /// Do what the exercise asks: check out `STU`, fast-forward `ABC` and
    /// pull the diverged `DEF`, creating a merge commit.
    pub fn solve(&self) {
        let st = self.student.path();
        run_git(st, &["checkout", "STU"]);
        run_git(st, &["checkout", "ABC"]);
        run_git(st, &["pull", "--no-edit"]);
        run_git(st, &["checkout", "DEF"]);
        run_git(st, &["pull", "--no-edit"]);
        run_git(st, &["checkout", "main"]);
    }
}

/// Exercise definition matching [`Exercise`].
pub const GLOSSARY_EXERCISE: &str = r#"
name = "glossary-branch-pull"

[[branches]]
name = "STU"
tracking = true

[[branches]]
name = "ABC"
contains = "origin/ABC"

[[branches]]
name = "DEF"
tracking = true

[[merges]]
branch = "DEF"
"#;
