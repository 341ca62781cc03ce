//! Subprocess execution utilities.
//!
//! [`ProcessBuilder`] describes a command; [`Executor`] runs it with uniform
//! logging and one of three failure behaviors:
//!
//! - fail fast (default): a non-zero exit becomes [`ProcessError::Failed`],
//!   which the CLI turns into exit status 1
//! - report: the exit code and output are handed back to the caller
//! - retry: the command is re-run after a backoff delay until it succeeds,
//!   the attempt budget runs out, or the [`CancellationToken`] fires

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Default delay between attempts of a retried command.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Longest single sleep while waiting out a backoff, so cancellation is noticed promptly.
const BACKOFF_TICK: Duration = Duration::from_millis(100);

/// Error from running an external command.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("error while executing `{command}` (exit code {code:?}, {attempts} attempt(s))\n{output}")]
    Failed {
        command: String,
        code: Option<i32>,
        output: String,
        attempts: u32,
    },

    #[error("cancelled while retrying `{command}` after {attempts} attempt(s)")]
    Cancelled { command: String, attempts: u32 },
}

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Run a command line through the platform shell.
    pub fn shell(line: impl Into<String>) -> Self {
        let (shell, flag) = if cfg!(windows) {
            ("cmd", "/C")
        } else {
            ("/bin/sh", "-c")
        };
        ProcessBuilder::new(shell).arg(flag).arg(line.into())
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Get the program path.
    pub fn get_program(&self) -> &Path {
        &self.program
    }

    /// Get the arguments.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Get the working directory, if one was set.
    pub fn get_cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    /// Execute the command, capturing stdout and stderr into one string.
    pub fn exec(&self) -> Result<CommandOutput, ProcessError> {
        let output = self
            .build_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| ProcessError::Spawn {
                command: self.display_command(),
                source,
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutput {
            code: output.status.code(),
            output: combined,
        })
    }

    /// Display the command for log and error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        let line = parts.join(" ");
        match self.cwd {
            Some(ref cwd) => format!("cd {} && {}", cwd.display(), line),
            None => line,
        }
    }
}

/// Exit code and combined stdout/stderr of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code (`None` if terminated by a signal)
    pub code: Option<i32>,
    /// Standard output followed by standard error
    pub output: String,
}

impl CommandOutput {
    /// Whether the command exited with status zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Something that can run a [`ProcessBuilder`] to completion.
///
/// The real implementation spawns an OS process; tests substitute scripted outcomes.
pub trait Spawner {
    fn spawn(&self, cmd: &ProcessBuilder) -> Result<CommandOutput, ProcessError>;
}

/// Spawns real OS processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSpawner;

impl Spawner for SystemSpawner {
    fn spawn(&self, cmd: &ProcessBuilder) -> Result<CommandOutput, ProcessError> {
        cmd.exec()
    }
}

impl<T: Spawner + ?Sized> Spawner for Arc<T> {
    fn spawn(&self, cmd: &ProcessBuilder) -> Result<CommandOutput, ProcessError> {
        (**self).spawn(cmd)
    }
}

/// Shared flag for stopping retry loops from another thread or a signal handler.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// How often, and how patiently, a flaky command is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first (`None` = until success or cancellation)
    pub max_attempts: Option<u32>,
    /// Delay between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    /// Retry until the command succeeds or is cancelled.
    pub fn forever(delay: Duration) -> Self {
        RetryPolicy {
            max_attempts: None,
            delay,
        }
    }

    /// Retry at most `attempts` times in total.
    pub fn bounded(attempts: u32, delay: Duration) -> Self {
        RetryPolicy {
            max_attempts: Some(attempts.max(1)),
            delay,
        }
    }

    fn allows(&self, attempts_made: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempts_made < max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::forever(DEFAULT_RETRY_DELAY)
    }
}

/// What a non-zero exit means to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// Return [`ProcessError::Failed`]
    #[default]
    FailFast,
    /// Return the [`CommandOutput`] and let the caller inspect the code
    Report,
}

/// Per-invocation options for [`Executor::run`].
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Retry on failure (only meaningful with [`FailureMode::FailFast`])
    pub retry: Option<RetryPolicy>,
    pub mode: FailureMode,
    /// Only log output when the command fails
    pub silent: bool,
}

impl RunOptions {
    /// Retry according to `policy` until the command succeeds.
    pub fn until_success(policy: RetryPolicy) -> Self {
        RunOptions {
            retry: Some(policy),
            ..Default::default()
        }
    }

    /// Hand back the exit code instead of failing.
    pub fn report() -> Self {
        RunOptions {
            mode: FailureMode::Report,
            ..Default::default()
        }
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }
}

/// Runs commands with logging, retry and cancellation.
pub struct Executor {
    spawner: Box<dyn Spawner>,
    cancel: CancellationToken,
}

impl Executor {
    /// Create an executor that spawns real processes.
    pub fn new() -> Self {
        Self::with_spawner(SystemSpawner)
    }

    /// Create an executor backed by a custom spawner.
    pub fn with_spawner(spawner: impl Spawner + 'static) -> Self {
        Executor {
            spawner: Box::new(spawner),
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run a command with default options: fail fast, log output.
    pub fn execute(&self, message: &str, cmd: &ProcessBuilder) -> Result<CommandOutput, ProcessError> {
        self.run(message, cmd, &RunOptions::default())
    }

    /// Run a command.
    pub fn run(
        &self,
        message: &str,
        cmd: &ProcessBuilder,
        opts: &RunOptions,
    ) -> Result<CommandOutput, ProcessError> {
        let command = cmd.display_command();
        tracing::info!("{}", message);
        tracing::info!("{}", command);

        let mut attempts = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                return Err(ProcessError::Cancelled { command, attempts });
            }

            let result = self.spawner.spawn(cmd)?;
            attempts += 1;

            if result.success() {
                if !opts.silent && !result.output.is_empty() {
                    tracing::info!("{}", result.output.trim_end());
                }
                return Ok(result);
            }

            tracing::error!("{}", result.output.trim_end());

            if opts.mode == FailureMode::Report {
                return Ok(result);
            }

            let Some(policy) = opts.retry.filter(|p| p.allows(attempts)) else {
                return Err(ProcessError::Failed {
                    command,
                    code: result.code,
                    output: result.output,
                    attempts,
                });
            };

            tracing::warn!(
                "Error while executing {}; retrying in {:?} (attempt {} failed)",
                message,
                policy.delay,
                attempts
            );

            if !self.backoff(policy.delay) {
                return Err(ProcessError::Cancelled { command, attempts });
            }
        }
    }

    /// Sleep for `delay`, waking early on cancellation. Returns `false` if cancelled.
    fn backoff(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(BACKOFF_TICK));
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Find CMake.
pub fn find_cmake() -> Option<PathBuf> {
    find_executable("cmake")
}

/// Find Ninja.
pub fn find_ninja() -> Option<PathBuf> {
    find_executable("ninja")
}
