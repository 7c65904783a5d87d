//! Suite command execution.

use super::types::SuiteOutcome;
use crate::config::SuiteConfig;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Maximum number of output lines kept in a failure cause.
pub const CAUSE_MAX_LINES: usize = 50;

/// Maximum characters kept in a failure cause.
pub const CAUSE_MAX_CHARS: usize = 4096;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long to keep collecting output after the deadline before giving up on
/// pipes held open by leftover grandchildren.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// A finished suite: its outcome plus the full captured output for the log.
#[derive(Debug, Clone)]
pub struct SuiteRun {
    pub outcome: SuiteOutcome,
    pub command: String,
    pub output: String,
}

/// Run one suite command in `cwd`.
///
/// The command is split with shell-words and executed directly, without a
/// shell. Failures never surface as errors: spawn failures, non-zero exits
/// and timeouts all become a failed outcome with a cause.
pub fn run_suite(name: &str, suite: &SuiteConfig, required: bool, cwd: &Path) -> SuiteRun {
    let started = Instant::now();
    let command = suite.command.trim().to_string();
    let finish = |result: std::result::Result<String, (String, String)>| {
        let duration_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(output) => SuiteRun {
                outcome: SuiteOutcome::pass(name, required, duration_ms),
                command: command.clone(),
                output,
            },
            Err((cause, output)) => SuiteRun {
                outcome: SuiteOutcome::fail(name, required, cause, duration_ms),
                command: command.clone(),
                output,
            },
        }
    };

    if command.is_empty() {
        return finish(Err(("command is empty".to_string(), String::new())));
    }

    let args = match shell_words::split(&command) {
        Ok(args) if !args.is_empty() => args,
        Ok(_) => {
            return finish(Err((
                format!("command is empty after parsing.\nCommand: {}", command),
                String::new(),
            )));
        }
        Err(e) => {
            return finish(Err((
                format!(
                    "failed to parse command: {}\nCommand: {}\nFix: check for unmatched quotes or invalid escape sequences.",
                    e, command
                ),
                String::new(),
            )));
        }
    };

    tracing::debug!(suite = name, command = %command, "starting suite");
    let child = Command::new(&args[0])
        .args(&args[1..])
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();
    let child = match child {
        Ok(child) => child,
        Err(e) => {
            return finish(Err((
                format!(
                    "failed to execute command: {}\nCommand: {}\nFix: ensure the command is installed and in PATH.",
                    e, command
                ),
                String::new(),
            )));
        }
    };

    let timeout = suite.timeout_secs.map(Duration::from_secs);
    let (status, output) = match wait_with_output(child, timeout) {
        Ok(done) => done,
        Err(e) => {
            return finish(Err((
                format!("failed to wait for command: {}\nCommand: {}", e, command),
                String::new(),
            )));
        }
    };

    match status {
        Some(status) if status.success() => finish(Ok(output)),
        Some(status) => {
            let mut cause = format!(
                "Command failed with exit code {}\nCommand: {}\n",
                status.code().unwrap_or(-1),
                command
            );
            let tail = truncate_output(&output, CAUSE_MAX_LINES, CAUSE_MAX_CHARS);
            if !tail.is_empty() {
                cause.push_str("\nOutput (truncated):\n");
                cause.push_str(&tail);
                cause.push('\n');
            }
            finish(Err((cause, output)))
        }
        None => finish(Err((
            format!(
                "timed out after {}s\nCommand: {}",
                suite.timeout_secs.unwrap_or_default(),
                command
            ),
            output,
        ))),
    }
}

/// Wait for `child`, draining both pipes on reader threads so a chatty
/// command cannot stall on a full pipe. Returns `None` for the status when
/// the child was killed at the deadline.
///
/// Only the direct child is killed. With a timeout, output collection stops
/// [`DRAIN_GRACE`] after the deadline (or after the child exits, if later),
/// so background processes that inherited the pipes cannot hold the gate.
/// Their reader threads are left to finish on their own.
fn wait_with_output(
    mut child: Child,
    timeout: Option<Duration>,
) -> std::io::Result<(Option<ExitStatus>, String)> {
    let stdout = child.stdout.take().map(Drain::spawn);
    let stderr = child.stderr.take().map(Drain::spawn);

    let deadline = timeout.map(|limit| Instant::now() + limit);
    let status = match deadline {
        None => Some(child.wait()?),
        Some(deadline) => loop {
            if let Some(status) = child.try_wait()? {
                break Some(status);
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                break None;
            }
            thread::sleep(POLL_INTERVAL);
        },
    };

    let collect_until = deadline.map(|d| d.max(Instant::now()) + DRAIN_GRACE);
    let stdout = stdout.map(|d| d.collect(collect_until)).unwrap_or_default();
    let stderr = stderr.map(|d| d.collect(collect_until)).unwrap_or_default();
    let combined = if stderr.is_empty() {
        stdout
    } else if stdout.is_empty() {
        stderr
    } else {
        format!("{}\n{}", stdout, stderr)
    };
    Ok((status, combined))
}

/// A pipe being read to EOF on a background thread.
struct Drain {
    buf: Arc<Mutex<Vec<u8>>>,
    done: Receiver<()>,
}

impl Drain {
    fn spawn<R: Read + Send + 'static>(mut pipe: R) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let (tx, done) = mpsc::channel();
        let sink = Arc::clone(&buf);
        thread::spawn(move || {
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => sink
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .extend_from_slice(&chunk[..n]),
                }
            }
            let _ = tx.send(());
        });
        Self { buf, done }
    }

    /// Output read so far once the pipe closes, or at `until`.
    fn collect(self, until: Option<Instant>) -> String {
        match until {
            None => {
                let _ = self.done.recv();
            }
            Some(until) => {
                let _ = self
                    .done
                    .recv_timeout(until.saturating_duration_since(Instant::now()));
            }
        }
        let bytes = self.buf.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Keep the last `max_lines` lines, then the last `max_chars` characters.
pub(crate) fn truncate_output(output: &str, max_lines: usize, max_chars: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();
    let relevant = if lines.len() > max_lines {
        &lines[lines.len() - max_lines..]
    } else {
        &lines[..]
    };

    let result = relevant.join("\n");
    if result.len() <= max_chars {
        return result;
    }

    let mut start = result.len() - max_chars;
    while !result.is_char_boundary(start) {
        start += 1;
    }
    format!("...(truncated)...\n{}", &result[start..])
}
