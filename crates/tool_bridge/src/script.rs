use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};
use wait_timeout::ChildExt;

use crate::context::ToolContext;
use crate::error::ToolError;
use crate::paths::resolve_existing_file;

pub const DEFAULT_SCRIPT_TIMEOUT_SEC: u64 = 300;
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;
const DEFAULT_INTERPRETER: &str = "python3";
const SUCCESS_STATUS: &str = "Success";
const TRUNCATED_MARKER: &str = "\n[truncated]";
/// How long readers may keep draining once the script itself has been reaped.
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Serializes child launches across every session in the process.
static EXECUTION_LOCK: Mutex<()> = Mutex::new(());

/// Outcome of one script execution as reported to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeResult {
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

impl CodeResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == SUCCESS_STATUS
    }

    fn exception(description: impl std::fmt::Display) -> Self {
        Self {
            status: format!("Failure, with exception {description}"),
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

/// Interpreter and time limit used to run saved scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRunner {
    interpreter: String,
    timeout: Duration,
    max_output_bytes: usize,
}

impl ScriptRunner {
    #[must_use]
    pub fn new(interpreter: impl Into<String>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    /// Caps how much of each output stream is kept.
    #[must_use]
    pub fn with_max_output_bytes(mut self, max_output_bytes: usize) -> Self {
        self.max_output_bytes = max_output_bytes;
        self
    }

    #[must_use]
    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn max_output_bytes(&self) -> usize {
        self.max_output_bytes
    }
}

impl Default for ScriptRunner {
    fn default() -> Self {
        Self::new(
            DEFAULT_INTERPRETER,
            Duration::from_secs(DEFAULT_SCRIPT_TIMEOUT_SEC),
        )
    }
}

/// Runs the script at `path` (relative to the hidden scripts folder) with the
/// working directory as its current directory.
///
/// Never fails: every problem is folded into the returned status string.
#[must_use]
pub fn execute_script(ctx: &ToolContext, runner: &ScriptRunner, path: &str) -> CodeResult {
    let script = match resolve_existing_file(&ctx.hidden_dir(), path) {
        Ok(script) => script,
        Err(error) => return CodeResult::exception(error),
    };

    let _serialized = lock_unpoisoned(&EXECUTION_LOCK);
    info!(
        script = %script.display(),
        interpreter = runner.interpreter(),
        "executing script"
    );

    let result = run_child(ctx.working_dir(), runner, &script);
    if !result.is_success() {
        warn!(script = %script.display(), status = %result.status, "script failed");
    }
    result
}

fn run_child(working_dir: &Path, runner: &ScriptRunner, script: &Path) -> CodeResult {
    let mut command = Command::new(&runner.interpreter);
    command
        .arg(script)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(error) => {
            return CodeResult::exception(ToolError::io(
                "launching interpreter for",
                script,
                &error,
            ));
        }
    };

    let stdout = PipeCapture::spawn(child.stdout.take(), runner.max_output_bytes);
    let stderr = PipeCapture::spawn(child.stderr.take(), runner.max_output_bytes);

    let outcome = wait_with_timeout(&mut child, runner.timeout);

    // Background processes may still hold the pipes; stop reading after the grace period.
    let deadline = Instant::now() + PIPE_DRAIN_GRACE;
    let stdout = stdout.finish(deadline);
    let stderr = stderr.finish(deadline);

    match outcome {
        Ok(status) => CodeResult {
            status,
            stdout,
            stderr,
        },
        Err(description) => CodeResult::exception(description),
    }
}

/// `Ok` carries the status label; `Err` is an exception description.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<String, String> {
    match child.wait_timeout(timeout) {
        Ok(Some(status)) => Ok(format_exit_status(status)),
        Ok(None) => {
            kill_process_tree(child);
            match child.wait() {
                Ok(_) => Ok(format!(
                    "Failure, with timeout after {}s",
                    timeout.as_secs()
                )),
                Err(error) => Err(format!(
                    "timed out after {}s and wait failed: {error}",
                    timeout.as_secs()
                )),
            }
        }
        Err(error) => {
            kill_process_tree(child);
            let _ = child.wait();
            Err(format!("failed waiting for script: {error}"))
        }
    }
}

/// Kills the script together with everything it spawned into its process group.
#[cfg(unix)]
fn kill_process_tree(child: &mut Child) {
    if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
        // SAFETY: the group was created for this child at spawn and it has not been reaped yet.
        unsafe {
            libc::kill(-pgid, libc::SIGKILL);
        }
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_process_tree(child: &mut Child) {
    let _ = child.kill();
}

fn format_exit_status(status: ExitStatus) -> String {
    if status.success() {
        return SUCCESS_STATUS.to_string();
    }

    match status.code() {
        Some(code) => format!("Failure, with exit code {code}"),
        None => "Failure, with exit code terminated by signal".to_string(),
    }
}

#[derive(Default)]
struct CapturedBytes {
    bytes: Vec<u8>,
    overflowed: bool,
}

/// Reads one child stream on its own thread, keeping at most `max_bytes`.
struct PipeCapture {
    captured: Arc<Mutex<CapturedBytes>>,
    done: Receiver<()>,
    max_bytes: usize,
}

impl PipeCapture {
    fn spawn<R: Read + Send + 'static>(pipe: Option<R>, max_bytes: usize) -> Self {
        let captured = Arc::new(Mutex::new(CapturedBytes::default()));
        let (done_tx, done) = mpsc::channel();

        let sink = Arc::clone(&captured);
        thread::spawn(move || {
            let _done = done_tx;
            let Some(mut pipe) = pipe else {
                return;
            };

            let mut chunk = [0_u8; 8192];
            loop {
                let read = match pipe.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(read) => read,
                    Err(error) if error.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                };
                let mut captured = lock_unpoisoned(&sink);
                // Keep draining past the cap so the child never blocks on a full pipe.
                let room = max_bytes.saturating_sub(captured.bytes.len());
                if read > room {
                    captured.overflowed = true;
                }
                captured.bytes.extend_from_slice(&chunk[..read.min(room)]);
            }
        });

        Self {
            captured,
            done,
            max_bytes,
        }
    }

    /// Waits for end of stream until `deadline`, then returns whatever was read.
    fn finish(self, deadline: Instant) -> String {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let _ = self.done.recv_timeout(remaining);

        let captured = std::mem::take(&mut *lock_unpoisoned(&self.captured));
        let content = String::from_utf8_lossy(&captured.bytes).into_owned();
        if captured.overflowed {
            let mut content = truncate_to_byte_limit(content, self.max_bytes);
            content.push_str(TRUNCATED_MARKER);
            content
        } else {
            content
        }
    }
}

fn truncate_to_byte_limit(content: String, max_bytes: usize) -> String {
    if content.len() <= max_bytes {
        return content;
    }

    let mut cutoff = max_bytes;
    while cutoff > 0 && !content.is_char_boundary(cutoff) {
        cutoff -= 1;
    }
    content[..cutoff].to_string()
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
