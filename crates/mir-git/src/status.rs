//! Read-only working tree and branch state predicates.
//!
//! None of these mutate the repository; each reduces one or more git queries
//! to a boolean.

use crate::branches::Head;
use crate::error::{Error, Result};
use crate::exec::OutputMode;
use crate::git::Git;
use crate::locator::RepositoryRef;
use crate::traits::Executor;

impl<X: Executor> Git<X> {
    /// Whether tracked files in the worktree differ from the index.
    ///
    /// # Errors
    /// Returns error if git fails.
    pub fn has_unstaged_changes(&self) -> Result<bool> {
        self.diff_quiet(&["diff", "--quiet"])
    }

    /// Whether the index differs from HEAD.
    ///
    /// # Errors
    /// Returns error if git fails.
    pub fn has_staged_changes(&self) -> Result<bool> {
        self.diff_quiet(&["diff", "--cached", "--quiet"])
    }

    /// Whether there are staged or unstaged changes to tracked files.
    ///
    /// # Errors
    /// Returns error if git fails.
    pub fn has_changes(&self) -> Result<bool> {
        Ok(self.has_unstaged_changes()? || self.has_staged_changes()?)
    }

    /// Whether the worktree contains untracked, non-ignored files.
    ///
    /// # Errors
    /// Returns error if git fails.
    pub fn has_untracked_files(&self) -> Result<bool> {
        let result = self.run_checked(
            ["status", "--porcelain", "--untracked-files=normal"],
            OutputMode::Capture,
        )?;
        Ok(result.stdout_str().lines().any(|l| l.starts_with("??")))
    }

    /// Whether the current branch has commits its upstream lacks.
    ///
    /// A branch without an upstream (or a detached HEAD) has nothing to push.
    /// Failing to read HEAD at all, e.g. outside a repository, is an error.
    ///
    /// # Errors
    /// Returns error if git fails or reports a malformed count.
    pub fn has_unpushed_changes(&self) -> Result<bool> {
        let branch = match self.head()? {
            Head::Branch(branch) => branch,
            Head::Detached(_) => {
                tracing::debug!("HEAD is detached, nothing to push");
                return Ok(false);
            }
        };

        let refname = branch.refname();
        let result = self.run_checked(
            ["for-each-ref", "--format=%(upstream)", refname.as_str()],
            OutputMode::Capture,
        )?;
        let upstream = result.stdout_str().trim();
        if upstream.is_empty() {
            tracing::debug!(%branch, "no upstream configured, nothing to push");
            return Ok(false);
        }

        let range = format!("{upstream}..{refname}");
        let args = ["rev-list", "--count", range.as_str()];
        let result = self.run_checked(args, OutputMode::Capture)?;
        let output = result.stdout_str().trim();
        let count: u64 = output.parse().map_err(|_| Error::UnexpectedOutput {
            command: format!("git {}", args.join(" ")),
            output: output.to_string(),
        })?;
        Ok(count > 0)
    }

    /// Run a `--quiet` diff: exit 0 means no differences, 1 means some.
    fn diff_quiet(&self, args: &[&str]) -> Result<bool> {
        let (invocation, result) = self.execute(args, OutputMode::Quiet)?;
        match result.code {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            code => Err(Error::CommandFailed {
                command: invocation.to_string(),
                code,
                stderr: result.stderr.unwrap_or_default(),
            }),
        }
    }
}

/// Whether `repo` has tracked edits that are not staged.
///
/// # Errors
/// See [`Git::has_unstaged_changes`].
pub fn has_unstaged_changes(repo: impl Into<RepositoryRef>) -> Result<bool> {
    Git::new(repo).has_unstaged_changes()
}

/// Whether `repo` has staged changes that are not committed.
///
/// # Errors
/// See [`Git::has_staged_changes`].
pub fn has_staged_changes(repo: impl Into<RepositoryRef>) -> Result<bool> {
    Git::new(repo).has_staged_changes()
}

/// Whether the current branch of `repo` is ahead of its upstream.
///
/// # Errors
/// See [`Git::has_unpushed_changes`].
pub fn has_unpushed_changes(repo: impl Into<RepositoryRef>) -> Result<bool> {
    Git::new(repo).has_unpushed_changes()
}
