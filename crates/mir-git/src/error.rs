//! Error types for mir-git.

use std::fmt;
use std::path::PathBuf;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while locating a repository or running git.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A repository reference of an unsupported type was supplied.
    ///
    /// This is a usage error on the caller's side and is raised before any
    /// process is spawned.
    #[error("repository references of type `{type_name}` are not supported")]
    UnsupportedRef {
        /// Name of the offending type.
        type_name: &'static str,
    },

    /// A `~` path was given but the home directory is unknown.
    #[error("cannot expand `~` in {path}: home directory is unknown")]
    NoHomeDir {
        /// The unexpanded path.
        path: PathBuf,
    },

    /// The git binary could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Program that was being launched.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A git command that had to succeed exited unsuccessfully.
    #[error("`{command}` failed ({}): {}", describe_code(.code), .stderr.trim())]
    CommandFailed {
        /// The command line, for display.
        command: String,
        /// Exit code, `None` if the process was killed by a signal.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// git produced output we could not interpret.
    #[error("unexpected output from `{command}`: {output:?}")]
    UnexpectedOutput {
        /// The command line, for display.
        command: String,
        /// The offending output.
        output: String,
    },

    /// HEAD is detached (not on a branch).
    #[error("HEAD is detached - checkout a branch first")]
    DetachedHead,

    /// A stash entry created to save the worktree has disappeared.
    #[error("stash entry {commit} no longer exists")]
    StashMissing {
        /// Commit id of the missing stash entry.
        commit: String,
    },
}

impl Error {
    /// Whether this is a caller contract violation rather than a git failure.
    #[must_use]
    pub const fn is_usage_error(&self) -> bool {
        matches!(self, Self::UnsupportedRef { .. })
    }
}

fn describe_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "killed by signal".to_string(), |c| format!("exit code {c}"))
}

/// Failure of a scoped save-and-restore helper.
///
/// `E` is the error type returned by the caller's body. A failed restore is
/// always reported as [`ScopeError::Restore`], even when the body failed too;
/// in that case the body's error travels along in `body`.
#[derive(Debug)]
pub enum ScopeError<E> {
    /// Capturing the entry state failed; the body was not run.
    Save(Error),

    /// The body failed and the repository was restored.
    Body(E),

    /// Restoring the repository failed.
    Restore {
        /// Why the restore failed.
        source: Error,
        /// The body's error, if the body failed as well.
        body: Option<E>,
    },
}

impl<E> ScopeError<E> {
    /// Whether the repository may have been left in a changed state.
    #[must_use]
    pub const fn is_restore_failure(&self) -> bool {
        matches!(self, Self::Restore { .. })
    }

    /// The body's error, if the body failed.
    #[must_use]
    pub fn into_body(self) -> Option<E> {
        match self {
            Self::Body(e) => Some(e),
            Self::Restore { body, .. } => body,
            Self::Save(_) => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for ScopeError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Save(e) => write!(f, "failed to save repository state: {e}"),
            Self::Body(e) => write!(f, "{e}"),
            Self::Restore { source, body: None } => {
                write!(f, "failed to restore repository state: {source}")
            }
            Self::Restore {
                source,
                body: Some(body),
            } => write!(
                f,
                "failed to restore repository state: {source} (after body failed: {body})"
            ),
        }
    }
}

impl<E> std::error::Error for ScopeError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Save(e) | Self::Restore { source: e, .. } => Some(e),
            Self::Body(e) => Some(e),
        }
    }
}
