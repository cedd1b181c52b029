//! Mock executor for unit tests.
//!
//! Records every invocation instead of spawning git and answers from a list
//! of scripted responses.

use std::cell::RefCell;

use crate::exec::{ExecutionResult, Invocation, OutputMode};
use crate::traits::Executor;
use crate::Result;

/// Number of leading arguments taken by `--git-dir <d> --work-tree <w>`.
const LOCATOR_ARGS: usize = 4;

struct Rule {
    prefix: Vec<String>,
    result: ExecutionResult,
}

/// Executor that records invocations and replays scripted results.
///
/// Each scripted response is used once, by the first invocation whose
/// subcommand arguments start with the rule's prefix. Unmatched invocations
/// succeed with empty output.
#[derive(Default)]
pub struct RecordingExecutor {
    calls: RefCell<Vec<Invocation>>,
    rules: RefCell<Vec<Rule>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next invocation (of any kind) with `result`.
    pub fn respond(self, result: ExecutionResult) -> Self {
        self.on(&[], result)
    }

    /// Answer the next invocation whose arguments start with `prefix`.
    pub fn on(self, prefix: &[&str], result: ExecutionResult) -> Self {
        self.rules.borrow_mut().push(Rule {
            prefix: prefix.iter().map(ToString::to_string).collect(),
            result,
        });
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    pub fn argvs(&self) -> Vec<Vec<String>> {
        self.calls.borrow().iter().map(Invocation::argv).collect()
    }

    /// Subcommand arguments of each call, without the locator flags.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.argvs()
            .into_iter()
            .map(|argv| argv.into_iter().skip(1 + LOCATOR_ARGS).collect())
            .collect()
    }
}

impl Executor for RecordingExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<ExecutionResult> {
        self.calls.borrow_mut().push(invocation.clone());

        let args: Vec<String> = invocation
            .args
            .iter()
            .skip(LOCATOR_ARGS)
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        let mut rules = self.rules.borrow_mut();
        let matched = rules
            .iter()
            .position(|rule| args.starts_with(&rule.prefix))
            .map(|i| rules.remove(i).result);

        let mut result = matched.unwrap_or_else(|| ExecutionResult::with_code(0));
        match invocation.mode {
            OutputMode::Inherit => {
                result.stdout = None;
                result.stderr = None;
            }
            OutputMode::Capture => {
                result.stdout.get_or_insert_with(String::new);
                result.stderr.get_or_insert_with(String::new);
            }
            OutputMode::Quiet => {
                result.stdout = None;
                result.stderr.get_or_insert_with(String::new);
            }
        }
        Ok(result)
    }
}
