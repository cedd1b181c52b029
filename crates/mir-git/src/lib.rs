//! # mir-git
//!
//! A typed wrapper around the `git` binary. Repositories are named by path or
//! by an explicit git-dir/worktree pair, every command runs as
//! `git --git-dir <gitdir> --work-tree <worktree> ...`, and branch or
//! worktree state can be changed temporarily with guaranteed restoration.
//!
//! ```no_run
//! use mir_git::{Git, OutputMode};
//!
//! let git = Git::new("~/src/project");
//! if git.has_unstaged_changes()? {
//!     println!("uncommitted edits on {}", git.current_branch()?);
//! }
//!
//! git.with_saved_worktree(|| {
//!     git.run_checked(["checkout", "--quiet", "release"], OutputMode::Quiet)?;
//!     git.run(["log", "--oneline", "-5"])
//! })?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod branches;
mod error;
mod exec;
mod git;
mod locator;
mod scope;
mod status;
mod traits;

#[cfg(test)]
mod test_mocks;

pub use branches::{BranchName, Head, branches, current_branch, head};
pub use error::{Error, Result, ScopeError};
pub use exec::{ExecutionResult, Invocation, OutputMode, SystemExecutor};
pub use git::{Git, run};
pub use locator::{GitEnv, Location, RepositoryRef};
pub use scope::{SaveWorktree, with_saved_branch, with_saved_worktree};
pub use status::{has_staged_changes, has_unpushed_changes, has_unstaged_changes};
pub use traits::Executor;
