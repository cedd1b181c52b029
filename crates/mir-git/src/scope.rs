//! Scoped mutation with guaranteed restoration.
//!
//! Both helpers capture repository state, run a caller-supplied body, and
//! put the state back on every exit path: normal return, error return, and
//! panic. Every git command they issue runs in [`OutputMode::Quiet`], so they
//! write nothing to the caller's stdout or stderr.
//!
//! The repository itself is the shared resource. Nothing here locks it;
//! callers must not run scoped helpers against one repository concurrently.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::branches::Head;
use crate::error::{Error, Result, ScopeError};
use crate::exec::OutputMode;
use crate::git::Git;
use crate::locator::RepositoryRef;
use crate::traits::Executor;

/// Run `body`, then `restore`, whatever happens in `body`.
///
/// A failed restore wins over the body's error but carries it along. If the
/// body panicked, the panic resumes after a successful restore; a failed
/// restore replaces it with a panic naming the restore failure.
fn guarded<T, E, B, R>(body: B, restore: R) -> std::result::Result<T, ScopeError<E>>
where
    B: FnOnce() -> std::result::Result<T, E>,
    R: FnOnce() -> Result<()>,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(body));
    let restored = restore();

    match (outcome, restored) {
        (Ok(Ok(value)), Ok(())) => Ok(value),
        (Ok(Err(e)), Ok(())) => Err(ScopeError::Body(e)),
        (Ok(result), Err(source)) => {
            tracing::error!(error = %source, "failed to restore repository state");
            Err(ScopeError::Restore {
                source,
                body: result.err(),
            })
        }
        (Err(payload), Ok(())) => panic::resume_unwind(payload),
        (Err(payload), Err(source)) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(error = %source, panic = message, "failed to restore repository state");
            panic!("failed to restore repository state after panic ({message}): {source}")
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Worktree state captured on entry to [`SaveWorktree::run`].
#[derive(Debug)]
struct SavedWorktree {
    head: Head,
    /// Commit id of the stash entry holding the entry changes, if any.
    stash: Option<String>,
}

/// Builder for a save-and-restore of branch and worktree contents.
///
/// Created by [`Git::save_worktree`].
#[derive(Debug)]
#[must_use]
pub struct SaveWorktree<'g, X> {
    git: &'g Git<X>,
    include_untracked: bool,
}

impl<X: Executor> SaveWorktree<'_, X> {
    /// Also stash untracked files, so the body sees a fully clean worktree.
    pub fn include_untracked(mut self, include: bool) -> Self {
        self.include_untracked = include;
        self
    }

    /// Run `body` with the worktree saved, then restore branch and contents.
    ///
    /// # Errors
    /// Returns [`ScopeError::Save`] if the state could not be captured (the
    /// body does not run), [`ScopeError::Body`] if the body failed, and
    /// [`ScopeError::Restore`] if restoring failed.
    pub fn run<T, E, F>(self, body: F) -> std::result::Result<T, ScopeError<E>>
    where
        F: FnOnce() -> std::result::Result<T, E>,
    {
        let saved = self.capture().map_err(ScopeError::Save)?;
        tracing::debug!(head = %saved.head, stash = ?saved.stash, "saved worktree");
        guarded(body, || self.restore(&saved))
    }

    fn capture(&self) -> Result<SavedWorktree> {
        let head = self.git.head()?;

        let dirty = self.git.has_changes()?
            || (self.include_untracked && self.git.has_untracked_files()?);
        if !dirty {
            return Ok(SavedWorktree { head, stash: None });
        }

        let before = self.git.stash_top()?;
        let mut args = vec!["stash", "push", "--quiet"];
        if self.include_untracked {
            args.push("--include-untracked");
        }
        self.git.run_checked(args, OutputMode::Quiet)?;
        let after = match self.git.stash_top() {
            Ok(after) => after,
            Err(e) => {
                self.unstash_after_failed_capture(&e);
                return Err(e);
            }
        };

        let stash = if after == before { None } else { after };
        Ok(SavedWorktree { head, stash })
    }

    /// Put just-pushed changes back when the stash could not be recorded.
    fn unstash_after_failed_capture(&self, cause: &Error) {
        tracing::warn!(error = %cause, "could not record stash entry, popping it back");
        if let Err(e) = self
            .git
            .run_checked(["stash", "pop", "--quiet", "--index"], OutputMode::Quiet)
        {
            tracing::warn!(error = %e, "saved changes remain in stash@{{0}}");
        }
    }

    fn restore(&self, saved: &SavedWorktree) -> Result<()> {
        if let Err(e) = self.git.checkout_quietly(&saved.head, true) {
            if let Some(commit) = &saved.stash {
                tracing::warn!(stash = %commit, "checkout failed, leaving saved changes in the stash");
            }
            return Err(e);
        }

        if let Some(commit) = &saved.stash {
            let entry = self.git.stash_entry(commit)?;
            self.git.run_checked(
                ["stash", "pop", "--quiet", "--index", entry.as_str()],
                OutputMode::Quiet,
            )?;
        }
        Ok(())
    }
}

impl<X: Executor> Git<X> {
    /// Run `body`, then check the entry branch out again.
    ///
    /// A detached HEAD is restored to the same commit.
    ///
    /// # Errors
    /// Returns [`ScopeError::Save`] if HEAD could not be read (the body does
    /// not run), [`ScopeError::Body`] if the body failed, and
    /// [`ScopeError::Restore`] if the checkout back failed, for example
    /// because the body deleted the branch.
    pub fn with_saved_branch<T, E, F>(&self, body: F) -> std::result::Result<T, ScopeError<E>>
    where
        F: FnOnce() -> std::result::Result<T, E>,
    {
        let head = self.head().map_err(ScopeError::Save)?;
        tracing::debug!(%head, "saved branch");
        guarded(body, || self.checkout_quietly(&head, false))
    }

    /// Run `body` with branch and tracked worktree changes saved.
    ///
    /// Changes are stashed before the body runs and popped afterwards; the
    /// body starts from a clean checkout of the entry branch. On exit,
    /// whatever the body left in tracked files is discarded.
    ///
    /// # Errors
    /// See [`SaveWorktree::run`].
    pub fn with_saved_worktree<T, E, F>(&self, body: F) -> std::result::Result<T, ScopeError<E>>
    where
        F: FnOnce() -> std::result::Result<T, E>,
    {
        self.save_worktree().run(body)
    }

    /// Configure a worktree save; see [`SaveWorktree`].
    pub const fn save_worktree(&self) -> SaveWorktree<'_, X> {
        SaveWorktree {
            git: self,
            include_untracked: false,
        }
    }

    fn checkout_quietly(&self, head: &Head, force: bool) -> Result<()> {
        let mut args = vec!["checkout", "--quiet"];
        if force {
            args.push("--force");
        }
        args.extend([head.checkout_target(), "--"]);
        self.run_checked(args, OutputMode::Quiet)?;
        Ok(())
    }

    /// Commit id of the newest stash entry.
    fn stash_top(&self) -> Result<Option<String>> {
        let (invocation, result) = self.execute(
            ["rev-parse", "--quiet", "--verify", "refs/stash"],
            OutputMode::Capture,
        )?;
        match result.code {
            Some(0) => Ok(Some(result.stdout_str().trim().to_string())),
            // --verify --quiet exits 1 when there is no stash.
            Some(1) => Ok(None),
            code => Err(Error::CommandFailed {
                command: invocation.to_string(),
                code,
                stderr: result.stderr.unwrap_or_default(),
            }),
        }
    }

    /// Find the `stash@{n}` name of the entry with this commit id.
    fn stash_entry(&self, commit: &str) -> Result<String> {
        let result = self.run_checked(["stash", "list", "--format=%H"], OutputMode::Capture)?;
        result
            .stdout_str()
            .lines()
            .position(|line| line.trim() == commit)
            .map(|n| format!("stash@{{{n}}}"))
            .ok_or_else(|| Error::StashMissing {
                commit: commit.to_string(),
            })
    }
}

/// Run `body` against `repo` and check the entry branch out again afterwards.
///
/// # Examples
///
/// ```no_run
/// use mir_git::{OutputMode, Git};
///
/// let git = Git::new("~/src/project");
/// mir_git::with_saved_branch("~/src/project", || {
///     git.run_checked(["checkout", "--quiet", "release"], OutputMode::Quiet)?;
///     git.run(["log", "--oneline", "-5"])
/// })?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// # Errors
/// See [`Git::with_saved_branch`].
pub fn with_saved_branch<T, E, F>(
    repo: impl Into<RepositoryRef>,
    body: F,
) -> std::result::Result<T, ScopeError<E>>
where
    F: FnOnce() -> std::result::Result<T, E>,
{
    Git::new(repo).with_saved_branch(body)
}

/// Run `body` against `repo` with branch and worktree changes saved.
///
/// # Errors
/// See [`Git::with_saved_worktree`].
pub fn with_saved_worktree<T, E, F>(
    repo: impl Into<RepositoryRef>,
    body: F,
) -> std::result::Result<T, ScopeError<E>>
where
    F: FnOnce() -> std::result::Result<T, E>,
{
    Git::new(repo).with_saved_worktree(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ExecutionResult;
    use crate::test_mocks::RecordingExecutor;

    fn on_main() -> RecordingExecutor {
        RecordingExecutor::new()
            .on(&["symbolic-ref"], ExecutionResult::with_code(0).with_stdout("refs/heads/main\n"))
    }

    #[test]
    fn test_saved_branch_restores_quietly() {
        let exec = on_main();
        let git = Git::new("repo").with_executor(&exec);

        let value: std::result::Result<_, ScopeError<Error>> =
            git.with_saved_branch(|| Ok(42));
        assert_eq!(value.unwrap(), 42);

        let commands = exec.commands();
        assert_eq!(commands.last().unwrap(), &["checkout", "--quiet", "main", "--"]);
        let restore = exec.calls().pop().unwrap();
        assert_eq!(restore.mode, OutputMode::Quiet);
    }

    #[test]
    fn test_saved_branch_restores_after_body_error() {
        let exec = on_main();
        let git = Git::new("repo").with_executor(&exec);

        let err = git
            .with_saved_branch(|| Err::<(), _>(std::io::Error::other("body failed")))
            .unwrap_err();
        assert!(matches!(err, ScopeError::Body(_)));
        assert_eq!(
            exec.commands().last().unwrap(),
            &["checkout", "--quiet", "main", "--"]
        );
        assert_eq!(exec.calls().pop().unwrap().mode, OutputMode::Quiet);
    }

    #[test]
    fn test_saved_branch_restore_failure_is_reported() {
        let exec = on_main().on(
            &["checkout"],
            ExecutionResult::with_code(1).with_stderr("fatal: invalid reference: main"),
        );
        let git = Git::new("repo").with_executor(&exec);

        let err = git
            .with_saved_branch(|| Err::<(), _>(std::io::Error::other("body failed")))
            .unwrap_err();
        match err {
            ScopeError::Restore {
                source: Error::CommandFailed { stderr, .. },
                body: Some(body),
            } => {
                assert!(stderr.contains("invalid reference"));
                assert_eq!(body.to_string(), "body failed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_saved_branch_save_failure_skips_body() {
        let exec = RecordingExecutor::new().on(&["symbolic-ref"], ExecutionResult::with_code(128));
        let git = Git::new("repo").with_executor(&exec);

        let mut ran = false;
        let err = git
            .with_saved_branch(|| {
                ran = true;
                Ok::<(), Error>(())
            })
            .unwrap_err();
        assert!(matches!(err, ScopeError::Save(_)));
        assert!(!ran);
        assert_eq!(exec.calls().len(), 1);
    }

    #[test]
    fn test_saved_branch_restores_on_panic() {
        let exec = on_main();
        let git = Git::new("repo").with_executor(&exec);

        let caught = panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = git.with_saved_branch(|| -> std::result::Result<(), Error> {
                panic!("body panicked")
            });
        }));
        assert!(caught.is_err());
        assert_eq!(
            exec.commands().last().unwrap(),
            &["checkout", "--quiet", "main", "--"]
        );
        assert_eq!(exec.calls().pop().unwrap().mode, OutputMode::Quiet);
    }

    #[test]
    fn test_saved_branch_detached_restores_commit() {
        let sha = "0123456789abcdef0123456789abcdef01234567";
        let exec = RecordingExecutor::new()
            .on(&["symbolic-ref"], ExecutionResult::with_code(1))
            .on(&["rev-parse", "--verify"], ExecutionResult::with_code(0).with_stdout(sha));
        let git = Git::new("repo").with_executor(&exec);

        git.with_saved_branch(|| Ok::<(), Error>(())).unwrap();
        assert_eq!(
            exec.commands().last().unwrap(),
            &["checkout", "--quiet", sha, "--"]
        );
    }

    #[test]
    fn test_saved_worktree_clean_skips_stash() {
        let exec = on_main();
        let git = Git::new("repo").with_executor(&exec);

        git.with_saved_worktree(|| Ok::<(), Error>(())).unwrap();

        let commands = exec.commands();
        assert!(commands.iter().all(|c| c[0] != "stash"));
        assert_eq!(
            commands.last().unwrap(),
            &["checkout", "--quiet", "--force", "main", "--"]
        );
        assert!(exec.calls().iter().all(|c| c.mode != OutputMode::Inherit));
    }

    #[test]
    fn test_saved_worktree_stashes_and_pops() {
        let stash = "feedfacefeedfacefeedfacefeedfacefeedface";
        let exec = on_main()
            .on(&["diff", "--quiet"], ExecutionResult::with_code(1))
            .on(&["rev-parse", "--quiet", "--verify", "refs/stash"], ExecutionResult::with_code(1))
            .on(
                &["rev-parse", "--quiet", "--verify", "refs/stash"],
                ExecutionResult::with_code(0).with_stdout(format!("{stash}\n")),
            )
            .on(
                &["stash", "list"],
                ExecutionResult::with_code(0).with_stdout(format!("{stash}\n")),
            );
        let git = Git::new("repo").with_executor(&exec);

        git.with_saved_worktree(|| Ok::<(), Error>(())).unwrap();

        let commands = exec.commands();
        assert!(commands.contains(&vec![
            "stash".to_string(),
            "push".to_string(),
            "--quiet".to_string()
        ]));
        assert_eq!(
            commands.last().unwrap(),
            &["stash", "pop", "--quiet", "--index", "stash@{0}"]
        );
        for call in exec.calls() {
            if call.has_arg("stash") || call.has_arg("checkout") {
                assert_eq!(call.mode, OutputMode::Quiet, "{call}");
            }
        }
    }

    #[test]
    fn test_saved_worktree_pops_own_entry() {
        let ours = "1111111111111111111111111111111111111111";
        let theirs = "2222222222222222222222222222222222222222";
        let exec = on_main()
            .on(&["diff", "--quiet"], ExecutionResult::with_code(1))
            .on(&["rev-parse", "--quiet", "--verify", "refs/stash"], ExecutionResult::with_code(1))
            .on(
                &["rev-parse", "--quiet", "--verify", "refs/stash"],
                ExecutionResult::with_code(0).with_stdout(ours),
            )
            .on(
                &["stash", "list"],
                ExecutionResult::with_code(0).with_stdout(format!("{theirs}\n{ours}\n")),
            );
        let git = Git::new("repo").with_executor(&exec);

        git.with_saved_worktree(|| Ok::<(), Error>(())).unwrap();
        assert_eq!(
            exec.commands().last().unwrap(),
            &["stash", "pop", "--quiet", "--index", "stash@{1}"]
        );
    }

    #[test]
    fn test_saved_worktree_checkout_failure_keeps_stash() {
        let stash = "feedfacefeedfacefeedfacefeedfacefeedface";
        let exec = on_main()
            .on(&["diff", "--quiet"], ExecutionResult::with_code(1))
            .on(&["rev-parse", "--quiet", "--verify", "refs/stash"], ExecutionResult::with_code(1))
            .on(
                &["rev-parse", "--quiet", "--verify", "refs/stash"],
                ExecutionResult::with_code(0).with_stdout(stash),
            )
            .on(&["checkout"], ExecutionResult::with_code(1).with_stderr("error"));
        let git = Git::new("repo").with_executor(&exec);

        let err = git.with_saved_worktree(|| Ok::<(), Error>(())).unwrap_err();
        assert!(err.is_restore_failure());
        assert!(exec.commands().iter().all(|c| c[..2] != ["stash", "pop"]));
    }

    #[test]
    fn test_saved_worktree_pops_back_when_stash_unreadable() {
        let exec = on_main()
            .on(&["diff", "--quiet"], ExecutionResult::with_code(1))
            .on(&["rev-parse", "--quiet", "--verify", "refs/stash"], ExecutionResult::with_code(1))
            .on(
                &["rev-parse", "--quiet", "--verify", "refs/stash"],
                ExecutionResult::with_code(128).with_stderr("fatal: bad object"),
            );
        let git = Git::new("repo").with_executor(&exec);

        let mut ran = false;
        let err = git
            .with_saved_worktree(|| {
                ran = true;
                Ok::<(), Error>(())
            })
            .unwrap_err();
        assert!(matches!(err, ScopeError::Save(Error::CommandFailed { .. })));
        assert!(!ran);
        assert_eq!(
            exec.commands().last().unwrap(),
            &["stash", "pop", "--quiet", "--index"]
        );
        assert_eq!(exec.calls().pop().unwrap().mode, OutputMode::Quiet);
    }

    #[test]
    fn test_saved_worktree_untracked() {
        let exec = on_main()
            .on(&["status"], ExecutionResult::with_code(0).with_stdout("?? new.txt\n"));
        let git = Git::new("repo").with_executor(&exec);

        git.save_worktree()
            .include_untracked(true)
            .run(|| Ok::<(), Error>(()))
            .unwrap();
        assert!(exec.commands().contains(&vec![
            "stash".to_string(),
            "push".to_string(),
            "--quiet".to_string(),
            "--include-untracked".to_string()
        ]));
    }
}
