//! Worker executor for running one task as a subprocess.
//!
//! The executor owns the whole process lifecycle: spawn, streaming stdout and
//! stderr into a [`WorkerHandler`], and two-phase cancellation (graceful
//! terminate, then a forced kill once the grace period runs out).

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::SdkError;
use crate::protocol::{parse_line, LineBuffer, WorkerHandler};
use crate::types::LifecycleEvent;

/// Default time between the graceful terminate and the forced kill.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(3);

/// Default time to keep reading buffered output after the process exited.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Result of a worker execution.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Exit code, or -1 when the process died from a signal.
    pub exit_code: i32,

    /// Whether cancellation was requested while the process ran.
    pub aborted: bool,

    /// Everything the worker wrote to stderr.
    pub stderr: String,

    /// Number of stdout lines that parsed as events.
    pub message_count: u64,

    /// Duration of execution in milliseconds.
    pub duration_ms: u64,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.aborted
    }
}

/// Lifecycle phase of the supervised process.
///
/// The kill deadline only exists while `Terminating`, so leaving that phase
/// discards the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessPhase {
    Running,
    Terminating { kill_at: Instant },
    Killed,
    Exited,
}

/// Executor for worker processes.
///
/// # Example
///
/// ```rust,no_run
/// use std::path::Path;
/// use std::sync::Arc;
/// use scout_worker_sdk::{WorkerExecutor, WorkerHandler};
/// use tokio_util::sync::CancellationToken;
///
/// async fn run(handler: Arc<dyn WorkerHandler>) -> Result<(), Box<dyn std::error::Error>> {
///     let executor = WorkerExecutor::new("pi").with_args(["--mode", "json", "-p"]);
///
///     let result = executor
///         .execute(Path::new("."), "Summarize this repository", handler, CancellationToken::new())
///         .await?;
///
///     println!("exit code: {}", result.exit_code);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct WorkerExecutor {
    /// Path to the worker executable.
    program: String,

    /// Arguments placed before the prompt.
    args: Vec<String>,

    /// Time allowed between terminate and kill.
    grace_period: Duration,

    /// Time allowed to drain pipes after exit.
    drain_timeout: Duration,

    /// Additional environment variables.
    env_vars: Vec<(String, String)>,
}

impl WorkerExecutor {
    /// Create a new executor for the given program.
    ///
    /// The program can be a bare name to use PATH lookup, or a full path.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            grace_period: DEFAULT_GRACE_PERIOD,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            env_vars: Vec::new(),
        }
    }

    /// Set the arguments passed before the prompt.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the grace period between terminate and kill.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Set how long to keep draining output after the process exits.
    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Run the worker with `prompt` as its final argument.
    ///
    /// Returns once the process has exited and its output has been drained.
    /// A non-zero exit is not an error here; only failing to start or to
    /// supervise the process is.
    pub async fn execute(
        &self,
        working_dir: &Path,
        prompt: &str,
        handler: Arc<dyn WorkerHandler>,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult, SdkError> {
        info!(
            program = %self.program,
            working_dir = %working_dir.display(),
            prompt_len = prompt.len(),
            "Preparing worker execution"
        );

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .current_dir(working_dir)
            .kill_on_drop(true);

        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }

        debug!("Full command: {:?}", cmd);

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|source| {
            error!(error = %source, program = %self.program, "Failed to spawn worker process");
            SdkError::Spawn {
                program: self.program.clone(),
                source,
            }
        })?;

        let pid = child.id();
        info!(pid = ?pid, "Worker process spawned");
        handler.on_lifecycle(LifecycleEvent::Spawned { pid }).await;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| SdkError::ProtocolError("Failed to get stdout".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| SdkError::ProtocolError("Failed to get stderr".to_string()))?;

        let mut phase = ProcessPhase::Running;
        let mut aborted = false;
        let mut exit_status: Option<ExitStatus> = None;
        let mut drain_deadline: Option<Instant> = None;

        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut stdout_lines = LineBuffer::new();
        let mut stderr_lines = LineBuffer::new();
        let mut stdout_buf = vec![0u8; 8192];
        let mut stderr_buf = vec![0u8; 4096];
        let mut stderr_bytes: Vec<u8> = Vec::new();
        let mut message_count = 0u64;

        loop {
            if exit_status.is_some() && !stdout_open && !stderr_open {
                break;
            }

            let kill_at = match phase {
                ProcessPhase::Terminating { kill_at } => Some(kill_at),
                _ => None,
            };

            tokio::select! {
                read = stdout.read(&mut stdout_buf), if stdout_open => match read {
                    Ok(0) => {
                        stdout_open = false;
                        if let Some(line) = stdout_lines.finish() {
                            message_count += dispatch_stdout(&line, &handler).await;
                        }
                        debug!(total_messages = message_count, "Worker stdout closed (EOF)");
                    }
                    Ok(n) => {
                        for line in stdout_lines.push(&stdout_buf[..n]) {
                            message_count += dispatch_stdout(&line, &handler).await;
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Error reading worker stdout");
                        stdout_open = false;
                    }
                },
                read = stderr.read(&mut stderr_buf), if stderr_open => match read {
                    Ok(0) => {
                        stderr_open = false;
                        if let Some(line) = stderr_lines.finish() {
                            dispatch_stderr(line, &handler).await;
                        }
                    }
                    Ok(n) => {
                        stderr_bytes.extend_from_slice(&stderr_buf[..n]);
                        for line in stderr_lines.push(&stderr_buf[..n]) {
                            dispatch_stderr(line, &handler).await;
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Error reading worker stderr");
                        stderr_open = false;
                    }
                },
                status = child.wait(), if exit_status.is_none() => {
                    let status = status?;
                    phase = ProcessPhase::Exited;
                    exit_status = Some(status);
                    drain_deadline = Some(Instant::now() + self.drain_timeout);
                    on_exit(status, &handler).await;
                }
                _ = cancel.cancelled(), if phase == ProcessPhase::Running => {
                    // select! picks randomly among ready branches, so the exit
                    // may not have been observed yet.
                    if let Some(status) = child.try_wait()? {
                        debug!("Cancellation arrived after the worker exited, ignoring");
                        phase = ProcessPhase::Exited;
                        exit_status = Some(status);
                        drain_deadline = Some(Instant::now() + self.drain_timeout);
                        on_exit(status, &handler).await;
                    } else {
                        info!(grace_ms = self.grace_period.as_millis() as u64, "Cancellation requested, terminating worker");
                        aborted = true;
                        phase = ProcessPhase::Terminating { kill_at: Instant::now() + self.grace_period };
                        request_terminate(&mut child);
                        handler.on_lifecycle(LifecycleEvent::TerminateRequested).await;
                    }
                }
                _ = sleep_until(kill_at.unwrap_or_else(Instant::now)), if kill_at.is_some() => {
                    warn!("Worker ignored terminate request, killing");
                    if let Err(e) = child.start_kill() {
                        warn!(error = %e, "Failed to kill worker");
                    }
                    phase = ProcessPhase::Killed;
                    handler.on_lifecycle(LifecycleEvent::ForceKilled).await;
                }
                _ = sleep_until(drain_deadline.unwrap_or_else(Instant::now)), if drain_deadline.is_some() => {
                    warn!(
                        stdout_open,
                        stderr_open,
                        "Worker output still open after exit, abandoning remaining output"
                    );
                    stdout_open = false;
                    stderr_open = false;
                }
            }
        }

        let exit_code = exit_status.and_then(|s| s.code()).unwrap_or(-1);
        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            exit_code,
            aborted,
            message_count,
            duration_ms,
            "Worker execution finished"
        );

        Ok(ExecutionResult {
            exit_code,
            aborted,
            stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
            message_count,
            duration_ms,
        })
    }
}

impl Default for WorkerExecutor {
    fn default() -> Self {
        Self::new("pi")
    }
}

async fn on_exit(status: ExitStatus, handler: &Arc<dyn WorkerHandler>) {
    info!(exit_code = ?status.code(), success = status.success(), "Worker process exited");
    handler.on_lifecycle(LifecycleEvent::Exited { code: status.code() }).await;
}

/// Parse and forward one stdout line. Returns 1 if it was an event.
async fn dispatch_stdout(line: &str, handler: &Arc<dyn WorkerHandler>) -> u64 {
    match parse_line(line) {
        Some(message) => {
            debug!(message_type = message.kind(), "Received worker event");
            if let Err(e) = handler.on_message(message).await {
                warn!(error = %e, "Handler error processing message");
            }
            1
        }
        None => 0,
    }
}

async fn dispatch_stderr(line: String, handler: &Arc<dyn WorkerHandler>) {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return;
    }
    debug!(stderr = %trimmed, "Worker stderr");
    if let Err(e) = handler.on_stderr_line(trimmed.to_string()).await {
        warn!(error = %e, "Handler error processing stderr");
    }
}

/// Ask the process to exit. A process that was already reaped is left alone.
#[cfg(unix)]
fn request_terminate(child: &mut Child) {
    let Some(pid) = child.id() else {
        return;
    };
    // SAFETY: `pid` is our own child and has not been reaped (`id()` returns
    // `None` after that), so it cannot refer to an unrelated process.
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc != 0 {
        warn!(pid, error = %std::io::Error::last_os_error(), "Failed to send SIGTERM");
    }
}

#[cfg(not(unix))]
fn request_terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!(error = %e, "Failed to terminate worker");
    }
}
