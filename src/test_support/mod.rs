//! Test utilities and mocks for bindery unit tests.
//!
//! Provides a scripted [`MockExecutor`] that stands in for real subprocesses,
//! and fixtures that lay out a miniature library source tree on disk.
//!
//! # Example
//!
//! ```rust,ignore
//! use bindery::test_support::{MockExecutor, MockProcessOutput};
//!
//! let mock = Arc::new(MockExecutor::new());
//! mock.expect("cmake --version", MockProcessOutput::success("cmake version 3.27.1"));
//! let executor = Executor::with_spawner(mock.clone());
//! ```

pub mod fixtures;

use std::sync::Mutex;

pub use fixtures::*;

use crate::util::process::{CommandOutput, ProcessBuilder, ProcessError, Spawner};

/// Scripted result of one command.
#[derive(Debug, Clone, Default)]
pub struct MockProcessOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl MockProcessOutput {
    /// Exit 0 with `stdout`.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self::with_output(0, stdout, "")
    }

    /// Exit `status` with `stderr`.
    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        Self::with_output(status, "", stderr)
    }

    pub fn with_output(status: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        MockProcessOutput {
            status,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    fn to_command_output(&self) -> CommandOutput {
        CommandOutput {
            code: Some(self.status),
            output: format!("{}{}", self.stdout, self.stderr),
        }
    }
}

#[derive(Debug, Clone)]
enum Match {
    Exact(String),
    Prefix(String),
}

impl Match {
    fn accepts(&self, line: &str) -> bool {
        match self {
            Match::Exact(s) => line == s,
            Match::Prefix(s) => line.starts_with(s.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
struct Rule {
    matcher: Match,
    output: MockProcessOutput,
    /// Uses left (`None` = unlimited)
    remaining: Option<usize>,
}

#[derive(Debug, Default)]
struct Script {
    rules: Vec<Rule>,
    calls: Vec<String>,
    fallback: Option<MockProcessOutput>,
}

/// Scripted [`Spawner`] that records every command it is asked to run.
///
/// Commands are matched as `program arg1 arg2 ...` (working directory excluded).
/// Rules are consulted in insertion order; a used-up rule falls through to the
/// next one. A command matching no rule fails to spawn unless a default is set.
#[derive(Debug, Default)]
pub struct MockExecutor {
    script: Mutex<Script>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, matcher: Match, output: MockProcessOutput, remaining: Option<usize>) {
        self.script.lock().unwrap().rules.push(Rule {
            matcher,
            output,
            remaining,
        });
    }

    /// Answer `cmd` (exact match) with `output`.
    pub fn expect(&self, cmd: &str, output: MockProcessOutput) {
        self.add(Match::Exact(cmd.to_string()), output, None);
    }

    /// Answer `cmd` (exact match) with `output`, at most `n` times.
    pub fn expect_times(&self, cmd: &str, output: MockProcessOutput, n: usize) {
        self.add(Match::Exact(cmd.to_string()), output, Some(n));
    }

    /// Answer any command starting with `prefix`.
    pub fn expect_prefix(&self, prefix: &str, output: MockProcessOutput) {
        self.add(Match::Prefix(prefix.to_string()), output, None);
    }

    /// Answer commands no rule matches.
    pub fn set_default(&self, output: MockProcessOutput) {
        self.script.lock().unwrap().fallback = Some(output);
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.script.lock().unwrap().calls.clone()
    }
}

impl Spawner for MockExecutor {
    fn spawn(&self, cmd: &ProcessBuilder) -> Result<CommandOutput, ProcessError> {
        let line = std::iter::once(cmd.get_program().display().to_string())
            .chain(cmd.get_args().iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");

        let mut script = self.script.lock().unwrap();
        script.calls.push(line.clone());

        let rule = script
            .rules
            .iter_mut()
            .find(|r| r.remaining != Some(0) && r.matcher.accepts(&line));
        if let Some(rule) = rule {
            if let Some(ref mut n) = rule.remaining {
                *n -= 1;
            }
            return Ok(rule.output.to_command_output());
        }

        match script.fallback {
            Some(ref out) => Ok(out.to_command_output()),
            None => Err(ProcessError::Spawn {
                command: line,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "unscripted command"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limited_rule_falls_through() {
        let mock = MockExecutor::new();
        mock.expect_times("git fetch", MockProcessOutput::failure(1, "x"), 1);
        mock.expect_prefix("git", MockProcessOutput::success("ok"));

        let cmd = ProcessBuilder::new("git").arg("fetch");
        assert_eq!(mock.spawn(&cmd).unwrap().code, Some(1));
        assert_eq!(mock.spawn(&cmd).unwrap().code, Some(0));
        assert_eq!(mock.calls(), vec!["git fetch", "git fetch"]);
    }

    #[test]
    fn test_unscripted_command_fails_to_spawn() {
        let mock = MockExecutor::new();
        assert!(mock.spawn(&ProcessBuilder::new("ninja")).is_err());
    }
}
