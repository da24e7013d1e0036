//! External process execution with a hard timeout.

use crate::error::{Result, ScoutError};
use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Exit codes that count as a successful installer run: OK, reboot
/// required, reboot initiated.
pub const SUCCESS_EXIT_CODES: &[i32] = &[0, 3010, 1641];

const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// How long to wait for output pipes after the process exits. Installers
/// sometimes leave helper processes holding the handles open.
const OUTPUT_GRACE: Duration = Duration::from_secs(2);

/// Result of a process that ran to completion.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,

    /// Standard output, trimmed.
    pub stdout: String,

    /// Standard error, trimmed.
    pub stderr: String,

    /// Execution duration.
    pub duration: Duration,

    /// Whether the exit code is one of [`SUCCESS_EXIT_CODES`].
    pub success: bool,
}

impl ProcessOutcome {
    /// Outcome for a process that exited with `exit_code`.
    pub fn exited(
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
        duration: Duration,
    ) -> Self {
        let success = exit_code.is_some_and(|c| SUCCESS_EXIT_CODES.contains(&c));
        Self {
            exit_code,
            stdout: stdout.trim().to_string(),
            stderr: stderr.trim().to_string(),
            duration,
            success,
        }
    }

    /// Shorthand for a silent process with the given exit code.
    pub fn with_code(code: i32) -> Self {
        Self::exited(Some(code), String::new(), String::new(), Duration::ZERO)
    }
}

/// Options for command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// Working directory.
    pub cwd: Option<PathBuf>,

    /// Environment variables (merged with system env).
    pub env: HashMap<String, String>,

    /// Hard timeout (None = wait forever).
    pub timeout: Option<Duration>,
}

/// Run a command line through the platform shell.
///
/// On Windows the command is wrapped in `start /wait ""` so that installers
/// which relaunch themselves are still waited for.
///
/// # Errors
///
/// - [`ScoutError::ProcessLaunch`] if the shell cannot be started
/// - [`ScoutError::ProcessTimeout`] if the timeout expires; the process is
///   killed and reaped before returning
pub fn execute(command: &str, options: &CommandOptions) -> Result<ProcessOutcome> {
    let mut cmd = shell_command(command);
    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }
    for (key, value) in &options.env {
        cmd.env(key, value);
    }
    run(cmd, command, options.timeout)
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;

    let shell = std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string());
    let mut cmd = Command::new(shell);
    cmd.raw_arg("/C")
        .raw_arg(format!("start /wait \"\" {command}"))
        .creation_flags(CREATE_NO_WINDOW);
    cmd
}

/// The shell leads a new process group so a timeout can signal everything
/// it started.
#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    use std::os::unix::process::CommandExt;

    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c").arg(command).process_group(0);
    cmd
}

/// Spawn `cmd`, collect its output and enforce the timeout.
fn run(mut cmd: Command, command_line: &str, timeout: Option<Duration>) -> Result<ProcessOutcome> {
    info!("Executing: {}", command_line);
    let start = Instant::now();

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn().map_err(|e| {
        warn!("Failed to launch '{}': {}", command_line, e);
        ScoutError::ProcessLaunch {
            command: command_line.to_string(),
        }
    })?;

    let stdout_rx = drain(child.stdout.take());
    let stderr_rx = drain(child.stderr.take());

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(e) => {
                warn!("Lost track of '{}': {}", command_line, e);
                reap(&mut child);
                return Err(ScoutError::ProcessLaunch {
                    command: command_line.to_string(),
                });
            }
        }
        if let Some(limit) = timeout {
            if start.elapsed() >= limit {
                warn!("Timed out after {}s: {}", limit.as_secs(), command_line);
                reap(&mut child);
                return Err(ScoutError::ProcessTimeout {
                    command: command_line.to_string(),
                    seconds: limit.as_secs(),
                });
            }
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stdout = stdout_rx.recv_timeout(OUTPUT_GRACE).unwrap_or_default();
    let stderr = stderr_rx.recv_timeout(OUTPUT_GRACE).unwrap_or_default();
    let outcome = ProcessOutcome::exited(status.code(), stdout, stderr, start.elapsed());

    if !outcome.stdout.is_empty() {
        debug!("stdout: {}", outcome.stdout);
    }
    if !outcome.stderr.is_empty() {
        warn!("stderr: {}", outcome.stderr);
    }
    info!(
        "Finished (exit {:?}, success: {}) in {:.1}s",
        outcome.exit_code,
        outcome.success,
        outcome.duration.as_secs_f64()
    );
    Ok(outcome)
}

/// Read a pipe to the end on a separate thread; the text arrives on the channel.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    match pipe {
        Some(mut pipe) => {
            thread::spawn(move || {
                let mut bytes = Vec::new();
                let _ = pipe.read_to_end(&mut bytes);
                let _ = tx.send(String::from_utf8_lossy(&bytes).into_owned());
            });
        }
        None => {
            let _ = tx.send(String::new());
        }
    }
    rx
}

/// Kill the whole process tree, then wait so no zombie is left behind.
fn reap(child: &mut Child) {
    if !kill_tree(child) {
        if let Err(e) = child.kill() {
            debug!("kill failed (process may have exited): {}", e);
        }
    }
    if let Err(e) = child.wait() {
        warn!("Failed to reap process: {}", e);
    }
}

#[cfg(unix)]
fn kill_tree(child: &Child) -> bool {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        return false;
    };
    // SAFETY: kill has no memory-safety preconditions; a negative pid
    // addresses the process group led by the shell.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        debug!(
            "killing process group {} failed: {}",
            pgid,
            std::io::Error::last_os_error()
        );
    }
    rc == 0
}

#[cfg(windows)]
fn kill_tree(child: &Child) -> bool {
    let status = Command::new("taskkill")
        .args(["/T", "/F", "/PID"])
        .arg(child.id().to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(status) => status.success(),
        Err(e) => {
            debug!("taskkill failed: {}", e);
            false
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn with_timeout(secs: u64) -> CommandOptions {
        CommandOptions {
            timeout: Some(Duration::from_secs(secs)),
            ..Default::default()
        }
    }

    #[test]
    fn captures_output() {
        let outcome = execute("echo hello", &with_timeout(10)).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(outcome.stdout, "hello");
    }

    #[test]
    fn reboot_codes_count_as_success() {
        assert!(execute("exit 3010", &with_timeout(10)).unwrap().success);
        assert!(ProcessOutcome::with_code(1641).success);
    }

    #[test]
    fn other_codes_fail() {
        let outcome = execute("echo oops >&2; exit 2", &with_timeout(10)).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, Some(2));
        assert_eq!(outcome.stderr, "oops");
    }

    #[test]
    fn timeout_kills_and_reports() {
        let options = CommandOptions {
            timeout: Some(Duration::from_millis(300)),
            ..Default::default()
        };
        let start = Instant::now();
        let err = execute("sleep 5", &options).unwrap_err();
        assert!(matches!(err, ScoutError::ProcessTimeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn timeout_kills_processes_started_by_the_command() {
        let temp = tempfile::TempDir::new().unwrap();
        let marker = temp.path().join("survivor");
        let options = CommandOptions {
            cwd: Some(temp.path().to_path_buf()),
            timeout: Some(Duration::from_millis(300)),
            ..Default::default()
        };

        let start = Instant::now();
        let err = execute("(sleep 1; touch survivor) & sleep 30; true", &options).unwrap_err();
        assert!(matches!(err, ScoutError::ProcessTimeout { .. }));
        // Pipes close once the whole group is gone.
        assert!(start.elapsed() < Duration::from_secs(5));

        thread::sleep(Duration::from_millis(1500));
        assert!(!marker.exists());
    }

    #[test]
    fn missing_program_is_launch_error() {
        let cmd = Command::new("/nonexistent/installscout-test-binary");
        let err = run(cmd, "missing", None).unwrap_err();
        assert!(matches!(err, ScoutError::ProcessLaunch { .. }));
    }

    #[test]
    fn env_and_cwd_are_applied() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut options = with_timeout(10);
        options.cwd = Some(temp.path().to_path_buf());
        options
            .env
            .insert("SCOUT_VALUE".to_string(), "abc".to_string());

        let outcome = execute("echo $SCOUT_VALUE; pwd", &options).unwrap();
        assert!(outcome.stdout.starts_with("abc"));
    }
}
