//! The git command dispatcher.

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

use crate::error::Result;
use crate::exec::{ExecutionResult, Invocation, OutputMode, SystemExecutor};
use crate::locator::{Location, RepositoryRef};
use crate::traits::Executor;

/// A repository handle that runs git commands against it.
///
/// Every command is run as
/// `git --git-dir <gitdir> --work-tree <worktree> <args...>`, one process per
/// call, with no retries or caching.
#[derive(Debug, Clone)]
pub struct Git<X = SystemExecutor> {
    repo: RepositoryRef,
    program: OsString,
    home: Option<PathBuf>,
    executor: X,
}

impl Git {
    /// Create a handle for the given repository using the `git` on `PATH`.
    pub fn new(repo: impl Into<RepositoryRef>) -> Self {
        Self {
            repo: repo.into(),
            program: OsString::from("git"),
            home: None,
            executor: SystemExecutor,
        }
    }
}

impl<X: Executor> Git<X> {
    /// Use a different executor, e.g. a recording one in tests.
    pub fn with_executor<Y: Executor>(self, executor: Y) -> Git<Y> {
        Git {
            repo: self.repo,
            program: self.program,
            home: self.home,
            executor,
        }
    }

    /// Run a different git binary.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    /// Expand `~` with this directory instead of looking it up.
    #[must_use]
    pub fn with_home_dir(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    /// The repository this handle points at.
    #[must_use]
    pub const fn repository(&self) -> &RepositoryRef {
        &self.repo
    }

    /// The executor used to run commands.
    #[must_use]
    pub const fn executor(&self) -> &X {
        &self.executor
    }

    /// Resolve the repository reference to concrete paths.
    ///
    /// # Errors
    /// Returns error if `~` cannot be expanded.
    pub fn location(&self) -> Result<Location> {
        match &self.home {
            Some(home) => self.repo.resolve_with_home(Some(home)),
            None => self.repo.resolve(),
        }
    }

    /// Build the invocation for `args` without running it.
    ///
    /// # Errors
    /// Returns error if the repository reference cannot be resolved.
    pub fn invocation<I, S>(&self, args: I, mode: OutputMode) -> Result<Invocation>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let location = self.location()?;
        let mut argv = vec![
            OsString::from("--git-dir"),
            location.gitdir.into_os_string(),
            OsString::from("--work-tree"),
            location.worktree.into_os_string(),
        ];
        argv.extend(args.into_iter().map(|a| a.as_ref().to_os_string()));

        Ok(Invocation {
            program: self.program.clone(),
            args: argv,
            mode,
        })
    }

    /// Run git with the caller's stdout and stderr.
    ///
    /// The exit code is returned as-is; a non-zero exit is not an error.
    ///
    /// # Errors
    /// Returns error if the repository cannot be resolved or git cannot be
    /// started.
    pub fn run<I, S>(&self, args: I) -> Result<ExecutionResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.run_with(args, OutputMode::Inherit)
    }

    /// Run git with explicit output handling.
    ///
    /// # Errors
    /// Returns error if the repository cannot be resolved or git cannot be
    /// started.
    pub fn run_with<I, S>(&self, args: I, mode: OutputMode) -> Result<ExecutionResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.execute(args, mode).map(|(_, result)| result)
    }

    /// Run git and require a zero exit code.
    ///
    /// # Errors
    /// Returns [`Error::CommandFailed`](crate::Error::CommandFailed) on a
    /// non-zero exit, in addition to the errors of [`Git::run_with`].
    pub fn run_checked<I, S>(&self, args: I, mode: OutputMode) -> Result<ExecutionResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let (invocation, result) = self.execute(args, mode)?;
        result.check(&invocation)
    }

    /// Run git, handing back the invocation alongside its result so callers
    /// can interpret exit codes themselves.
    pub(crate) fn execute<I, S>(
        &self,
        args: I,
        mode: OutputMode,
    ) -> Result<(Invocation, ExecutionResult)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let invocation = self.invocation(args, mode)?;
        tracing::debug!(command = %invocation, ?mode, "running git");
        let result = self.executor.execute(&invocation)?;
        Ok((invocation, result))
    }
}

/// Run a git command against `repo`, inheriting stdout and stderr.
///
/// # Examples
///
/// ```no_run
/// let result = mir_git::run("~/src/project", ["status", "--short"])?;
/// assert!(result.success());
/// # Ok::<(), mir_git::Error>(())
/// ```
///
/// # Errors
/// Returns error if the repository cannot be resolved or git cannot be
/// started. A non-zero exit is reported in the result, not as an error.
pub fn run<I, S>(repo: impl Into<RepositoryRef>, args: I) -> Result<ExecutionResult>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    Git::new(repo).run(args)
}
