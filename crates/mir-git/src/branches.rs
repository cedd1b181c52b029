//! Branch and HEAD queries.

use std::fmt;

use crate::error::{Error, Result};
use crate::exec::OutputMode;
use crate::git::Git;
use crate::locator::RepositoryRef;
use crate::traits::Executor;

/// Namespace of local branch refs.
const BRANCH_PREFIX: &str = "refs/heads/";

/// A git branch name, exactly as git reports it.
///
/// No structure or validation is imposed; git is the authority on what names
/// exist.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BranchName(String);

impl BranchName {
    /// Wrap a branch name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the branch name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the `BranchName` and return the inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// The full ref name, e.g. `refs/heads/main`.
    #[must_use]
    pub fn refname(&self) -> String {
        format!("{BRANCH_PREFIX}{}", self.0)
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::ops::Deref for BranchName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BranchName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for BranchName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl PartialEq<str> for BranchName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for BranchName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl PartialEq<String> for BranchName {
    fn eq(&self, other: &String) -> bool {
        self.0 == *other
    }
}

/// What HEAD points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Head {
    /// HEAD is a symbolic ref to a local branch.
    Branch(BranchName),
    /// HEAD is detached at this commit id.
    Detached(String),
}

impl Head {
    /// The argument that checks this HEAD out again.
    #[must_use]
    pub fn checkout_target(&self) -> &str {
        match self {
            Self::Branch(name) => name.as_str(),
            Self::Detached(sha) => sha,
        }
    }
}

impl fmt::Display for Head {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Branch(name) => write!(f, "{name}"),
            Self::Detached(sha) => write!(f, "detached at {sha}"),
        }
    }
}

impl<X: Executor> Git<X> {
    /// Get the name of the checked-out branch.
    ///
    /// The name is read from the full ref, so a tag sharing the branch's
    /// name does not turn it into `heads/<name>`.
    ///
    /// # Errors
    /// Returns [`Error::DetachedHead`] if HEAD is detached, or
    /// [`Error::CommandFailed`] if git fails for another reason.
    pub fn current_branch(&self) -> Result<BranchName> {
        let (invocation, result) = self.execute(
            ["symbolic-ref", "--quiet", "HEAD"],
            OutputMode::Capture,
        )?;
        match result.code {
            Some(0) => match result.stdout_str().trim().strip_prefix(BRANCH_PREFIX) {
                Some(name) if !name.is_empty() => Ok(BranchName::new(name)),
                _ => Err(Error::UnexpectedOutput {
                    command: invocation.to_string(),
                    output: result.stdout_str().to_string(),
                }),
            },
            // symbolic-ref --quiet exits 1 only when HEAD is not symbolic.
            Some(1) => Err(Error::DetachedHead),
            code => Err(Error::CommandFailed {
                command: invocation.to_string(),
                code,
                stderr: result.stderr.unwrap_or_default(),
            }),
        }
    }

    /// Get what HEAD points at, resolving a detached HEAD to its commit.
    ///
    /// # Errors
    /// Returns error if git fails.
    pub fn head(&self) -> Result<Head> {
        match self.current_branch() {
            Ok(name) => Ok(Head::Branch(name)),
            Err(Error::DetachedHead) => {
                let result =
                    self.run_checked(["rev-parse", "--verify", "HEAD"], OutputMode::Capture)?;
                Ok(Head::Detached(result.stdout_str().trim().to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// List all local branches in the order git reports them.
    ///
    /// # Errors
    /// Returns error if branch listing fails.
    pub fn branches(&self) -> Result<Vec<BranchName>> {
        let result = self.run_checked(
            ["for-each-ref", "--format=%(refname:lstrip=2)", "refs/heads/"],
            OutputMode::Capture,
        )?;

        Ok(result
            .stdout_str()
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(BranchName::from)
            .collect())
    }
}

/// Get the name of the branch checked out in `repo`.
///
/// # Errors
/// See [`Git::current_branch`].
pub fn current_branch(repo: impl Into<RepositoryRef>) -> Result<BranchName> {
    Git::new(repo).current_branch()
}

/// Get what HEAD points at in `repo`.
///
/// # Errors
/// See [`Git::head`].
pub fn head(repo: impl Into<RepositoryRef>) -> Result<Head> {
    Git::new(repo).head()
}

/// List the local branches of `repo`.
///
/// # Errors
/// See [`Git::branches`].
pub fn branches(repo: impl Into<RepositoryRef>) -> Result<Vec<BranchName>> {
    Git::new(repo).branches()
}
