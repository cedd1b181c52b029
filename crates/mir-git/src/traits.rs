//! Trait abstractions for process execution.
//!
//! This module defines the `Executor` trait which abstracts running the git
//! binary, enabling dependency injection and testability.

use crate::Result;
use crate::exec::{ExecutionResult, Invocation};

/// Trait for running a fully built git invocation.
///
/// This trait abstracts process execution, allowing for:
/// - Recording executors that assert on argument vectors in tests
/// - Alternative implementations (e.g., logging or dry-run wrappers)
///
/// Implementations must honor [`Invocation::mode`]: in
/// [`OutputMode::Quiet`](crate::OutputMode::Quiet) nothing may reach the
/// caller's standard streams.
pub trait Executor {
    /// Run the invocation to completion.
    ///
    /// A non-zero exit is not an error here; it is reported through
    /// [`ExecutionResult::code`].
    ///
    /// # Errors
    /// Returns [`Error::Spawn`](crate::Error::Spawn) if the process could
    /// not be started or waited on.
    fn execute(&self, invocation: &Invocation) -> Result<ExecutionResult>;
}

impl<X: Executor + ?Sized> Executor for &X {
    fn execute(&self, invocation: &Invocation) -> Result<ExecutionResult> {
        (**self).execute(invocation)
    }
}
