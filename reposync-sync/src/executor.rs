//! External process execution.
//!
//! Commands are always argument vectors, never shell strings. Standard output
//! and standard error are drained concurrently into one buffer, line by line,
//! so the combined text keeps a best-effort ordering between the two streams.

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::SyncError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Command description
// ---------------------------------------------------------------------------

/// An external command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Kill the command (and its process group) once this elapses.
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Human-readable rendering for logs and diagnostics.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn quote(token: &str) -> String {
    if token.is_empty() || token.chars().any(|c| c.is_whitespace() || c == '\'') {
        format!("'{}'", token.replace('\'', r"'\''"))
    } else {
        token.to_string()
    }
}

/// What a finished command left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Rendered command line, for diagnostics.
    pub command: String,
    /// Exit code; `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub success: bool,
    /// Combined stdout + stderr.
    pub output: String,
}

impl CommandResult {
    /// Convert a non-zero exit into [`SyncError::ProcessFailed`].
    pub fn into_success(self) -> Result<Self, SyncError> {
        if self.success {
            Ok(self)
        } else {
            Err(SyncError::ProcessFailed {
                command: self.command,
                code: self.code,
                output: self.output,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Executor seam
// ---------------------------------------------------------------------------

/// Runs external commands on behalf of the controller and the chained runner.
pub trait Executor {
    /// Run `spec` to completion and report its status, whatever it is.
    ///
    /// Errors only when the command could not run at all (missing program,
    /// missing working directory, spawn failure, timeout).
    fn output(&self, spec: &CommandSpec) -> Result<CommandResult, SyncError>;

    /// Like [`Executor::output`], but a non-zero exit is an error.
    fn run(&self, spec: &CommandSpec) -> Result<CommandResult, SyncError> {
        self.output(spec)?.into_success()
    }
}

impl<E: Executor + ?Sized> Executor for &E {
    fn output(&self, spec: &CommandSpec) -> Result<CommandResult, SyncError> {
        (**self).output(spec)
    }
}

// ---------------------------------------------------------------------------
// SystemExecutor
// ---------------------------------------------------------------------------

/// [`Executor`] backed by `std::process`.
///
/// Without a timeout the child stays in the caller's process group, so
/// credential and host-key prompts on the terminal keep working.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl SystemExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Executor for SystemExecutor {
    fn output(&self, spec: &CommandSpec) -> Result<CommandResult, SyncError> {
        let command = spec.display();
        let cwd = spec
            .cwd
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        tracing::info!(command = %command, cwd = %cwd, "running command");

        if let Some(dir) = &spec.cwd {
            if !dir.is_dir() {
                tracing::error!(path = %dir.display(), "working directory missing");
                return Err(SyncError::WorkingDirMissing { path: dir.clone() });
            }
        }

        let program = which::which(&spec.program).map_err(|err| {
            tracing::error!(program = %spec.program, error = %err, "executable not found");
            SyncError::ExecutableNotFound {
                program: spec.program.clone(),
            }
        })?;

        let mut cmd = Command::new(program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        let timeout = spec.timeout;
        if timeout.is_some() {
            // A stopped prompt would only ever end at the deadline.
            cmd.env("GIT_TERMINAL_PROMPT", "0");
            #[cfg(unix)]
            {
                use std::os::unix::process::CommandExt;
                cmd.process_group(0);
            }
        }

        let mut child = cmd.spawn().map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                SyncError::ExecutableNotFound {
                    program: spec.program.clone(),
                }
            } else {
                SyncError::Spawn {
                    command: command.clone(),
                    source,
                }
            }
        })?;

        let buffer = Arc::new(Mutex::new(String::new()));
        let readers: Vec<JoinHandle<()>> = [
            child.stdout.take().map(|s| spawn_reader(s, Arc::clone(&buffer))),
            child.stderr.take().map(|s| spawn_reader(s, Arc::clone(&buffer))),
        ]
        .into_iter()
        .flatten()
        .collect();

        let waited = wait_with_deadline(&mut child, timeout);
        for reader in readers {
            let _ = reader.join();
        }
        let output = buffer.lock().map(|b| b.clone()).unwrap_or_default();

        let status = match waited {
            Ok(Some(status)) => status,
            Ok(None) => {
                let after = timeout.unwrap_or_default();
                tracing::error!(command = %command, ?after, "command timed out:\n{output}");
                return Err(SyncError::Timeout {
                    command,
                    after,
                    output,
                });
            }
            Err(source) => return Err(SyncError::Spawn { command, source }),
        };

        let result = CommandResult {
            command,
            code: status.code(),
            success: status.success(),
            output,
        };
        if result.success {
            tracing::info!(command = %result.command, "command succeeded");
            tracing::debug!("output of `{}`:\n{}", result.command, result.output);
        } else {
            tracing::error!(
                command = %result.command,
                code = ?result.code,
                "command failed:\n{}",
                result.output
            );
        }
        Ok(result)
    }
}

fn spawn_reader<R: Read + Send + 'static>(stream: R, sink: Arc<Mutex<String>>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if let Ok(mut buf) = sink.lock() {
                        buf.push_str(&String::from_utf8_lossy(&line));
                    }
                }
            }
        }
    })
}

/// `Ok(None)` means the deadline passed and the child was killed.
fn wait_with_deadline(
    child: &mut Child,
    timeout: Option<Duration>,
) -> std::io::Result<Option<ExitStatus>> {
    let Some(timeout) = timeout else {
        return child.wait().map(Some);
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            terminate(child);
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Kill the child together with everything it spawned.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        // Timed children lead their own process group.
        let _ = Command::new("kill")
            .args(["-KILL", "--", &format!("-{}", child.id())])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
    let _ = child.kill();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
