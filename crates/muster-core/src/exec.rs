// SPDX-License-Identifier: Apache-2.0

//! Synchronous subprocess execution with per-stream capture policy.
//!
//! Every external tool the engine touches goes through [`ExecutionRunner`].
//! The runner never turns a nonzero exit into an error: callers get a
//! [`CommandOutput`] and decide what a failure means for them. Environment
//! overrides are scoped to the child process only; the parent environment is
//! never written, so no state can leak once the call returns.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use bon::Builder;
use tracing::{debug, warn};

/// What to do with one output stream of a child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputPolicy {
    /// Capture and return the stream in [`CommandOutput`].
    #[default]
    Return,
    /// Stream into the given file; nothing returned.
    WriteFile(PathBuf),
    /// Capture and return, and also write the captured bytes to the file.
    Both(PathBuf),
    /// Drop the stream.
    Discard,
}

impl OutputPolicy {
    fn captures(&self) -> bool {
        matches!(self, Self::Return | Self::Both(_))
    }

    fn tee_path(&self) -> Option<&Path> {
        match self {
            Self::Both(path) => Some(path),
            _ => None,
        }
    }
}

/// One subprocess invocation.
#[derive(Debug, Builder)]
pub struct CommandRequest {
    /// Program name or path; resolved against PATH when bare.
    #[builder(into)]
    pub program: String,
    /// Arguments passed verbatim.
    #[builder(default)]
    pub args: Vec<String>,
    /// Working directory for the child; inherited when unset.
    pub cwd: Option<PathBuf>,
    /// Environment overrides applied to the child process only.
    #[builder(default)]
    pub env: Vec<(String, String)>,
    /// Policy for the child's stdout.
    #[builder(default)]
    pub stdout: OutputPolicy,
    /// Policy for the child's stderr.
    #[builder(default)]
    pub stderr: OutputPolicy,
    /// Kill the child when it runs longer than this.
    pub timeout: Option<Duration>,
}

impl CommandRequest {
    /// The full command line, for invocation records and logs.
    #[must_use]
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Outcome of one subprocess invocation.
#[derive(Debug)]
pub struct CommandOutput {
    /// Child exit code; 1 when the process could not start.
    pub return_code: i32,
    /// Captured stdout, present under the Return/Both policies.
    pub stdout: Option<String>,
    /// Captured stderr, present under the Return/Both policies.
    pub stderr: Option<String>,
    /// Whether the child was killed at the timeout deadline.
    pub timed_out: bool,
    /// Whether the child process was spawned at all.
    pub started: bool,
}

impl CommandOutput {
    /// Whether the child started and exited zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.started && self.return_code == 0 && !self.timed_out
    }

    fn failed_to_start(message: String) -> Self {
        Self {
            return_code: 1,
            stdout: None,
            stderr: Some(message),
            timed_out: false,
            started: false,
        }
    }
}

/// Blocking subprocess wrapper.
///
/// Stateless; exists as a type so the lifecycle and provisioner can share
/// one invocation path and tests can observe it at a single seam.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionRunner;

impl ExecutionRunner {
    /// Create a runner.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Run a command to completion and collect its output.
    ///
    /// Nonzero exits are reported through `return_code`, never as an error.
    /// A child that cannot be spawned yields `return_code = 1` with the
    /// spawn error in `stderr`. With a timeout set, a child still running at
    /// the deadline is killed and reported with `timed_out = true`.
    #[must_use]
    pub fn run(&self, request: &CommandRequest) -> CommandOutput {
        let program = resolve_executable(&request.program)
            .unwrap_or_else(|| PathBuf::from(&request.program));

        let mut command = Command::new(&program);
        command.args(&request.args);
        if let Some(cwd) = &request.cwd {
            command.current_dir(cwd);
        }
        // Child-scoped only: the parent process environment is not touched.
        command.envs(request.env.iter().map(|(k, v)| (k, v)));
        command.stdin(Stdio::null());

        let stdout_stdio = match stdio_for(&request.stdout) {
            Ok(stdio) => stdio,
            Err(e) => return CommandOutput::failed_to_start(e),
        };
        let stderr_stdio = match stdio_for(&request.stderr) {
            Ok(stdio) => stdio,
            Err(e) => return CommandOutput::failed_to_start(e),
        };
        command.stdout(stdout_stdio);
        command.stderr(stderr_stdio);

        debug!(command = %request.command_line(), "spawning");

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %request.program, error = %e, "failed to start process");
                return CommandOutput::failed_to_start(format!(
                    "failed to start `{}`: {e}",
                    request.program
                ));
            }
        };

        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let (return_code, timed_out) = wait_with_deadline(&mut child, request.timeout);

        let stdout = collect_stream(stdout_reader, &request.stdout);
        let stderr = collect_stream(stderr_reader, &request.stderr);

        CommandOutput {
            return_code,
            stdout,
            stderr,
            timed_out,
            started: true,
        }
    }
}

fn stdio_for(policy: &OutputPolicy) -> Result<Stdio, String> {
    match policy {
        OutputPolicy::Return | OutputPolicy::Both(_) => Ok(Stdio::piped()),
        OutputPolicy::Discard => Ok(Stdio::null()),
        OutputPolicy::WriteFile(path) => {
            let file = std::fs::File::create(path)
                .map_err(|e| format!("cannot open output file {}: {e}", path.display()))?;
            Ok(Stdio::from(file))
        }
    }
}

type ReaderHandle = std::thread::JoinHandle<String>;

fn spawn_reader<R: Read + Send + 'static>(stream: Option<R>) -> Option<ReaderHandle> {
    stream.map(|mut stream| {
        std::thread::spawn(move || {
            let mut buf = String::new();
            // Non-UTF8 tool output degrades to lossy text rather than failing.
            let mut bytes = Vec::new();
            if stream.read_to_end(&mut bytes).is_ok() {
                buf = String::from_utf8_lossy(&bytes).into_owned();
            }
            buf
        })
    })
}

fn collect_stream(reader: Option<ReaderHandle>, policy: &OutputPolicy) -> Option<String> {
    let captured = reader.and_then(|handle| handle.join().ok())?;
    if let Some(path) = policy.tee_path()
        && let Err(e) = std::fs::write(path, &captured)
    {
        warn!(path = %path.display(), error = %e, "failed to tee output to file");
    }
    policy.captures().then_some(captured)
}

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

fn wait_with_deadline(child: &mut Child, timeout: Option<Duration>) -> (i32, bool) {
    let Some(timeout) = timeout else {
        return match child.wait() {
            Ok(status) => (status.code().unwrap_or(-1), false),
            Err(_) => (1, false),
        };
    };

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return (status.code().unwrap_or(-1), false),
            Ok(None) => {
                if Instant::now() >= deadline {
                    warn!(timeout = ?timeout, "process deadline reached, killing");
                    let _ = child.kill();
                    let _ = child.wait();
                    return (-1, true);
                }
                std::thread::sleep(WAIT_POLL_INTERVAL);
            }
            Err(_) => return (1, false),
        }
    }
}

/// Resolve a program name to an absolute path via PATH search.
///
/// Names already carrying a path separator are returned as-is when they
/// exist. Returns `None` when nothing on PATH matches; callers fall back to
/// handing the bare name to the OS.
#[must_use]
pub fn resolve_executable(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.exists().then(|| candidate.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let full = dir.join(program);
        if is_executable(&full) {
            return Some(full);
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandRequest {
        CommandRequest::builder()
            .program("sh")
            .args(vec!["-c".to_string(), script.to_string()])
            .build()
    }

    #[test]
    fn test_nonzero_exit_is_not_an_error() {
        let output = ExecutionRunner::new().run(
            &CommandRequest::builder()
                .program("false")
                .build(),
        );
        assert_ne!(output.return_code, 0);
        assert!(!output.timed_out);
    }

    #[test]
    fn test_stdout_capture() {
        let output = ExecutionRunner::new().run(&sh("echo hello"));
        assert_eq!(output.return_code, 0);
        assert_eq!(output.stdout.as_deref().map(str::trim), Some("hello"));
    }

    #[test]
    fn test_discard_policy_returns_nothing() {
        let mut request = sh("echo hello");
        request.stdout = OutputPolicy::Discard;
        let output = ExecutionRunner::new().run(&request);
        assert_eq!(output.return_code, 0);
        assert!(output.stdout.is_none());
    }

    #[test]
    fn test_write_file_policy() {
        let tmp = tempfile::tempdir().unwrap();
        let out_file = tmp.path().join("stdout.txt");
        let mut request = sh("echo to-file");
        request.stdout = OutputPolicy::WriteFile(out_file.clone());

        let output = ExecutionRunner::new().run(&request);
        assert_eq!(output.return_code, 0);
        assert!(output.stdout.is_none());
        let written = std::fs::read_to_string(&out_file).unwrap();
        assert_eq!(written.trim(), "to-file");
    }

    #[test]
    fn test_both_policy_returns_and_writes() {
        let tmp = tempfile::tempdir().unwrap();
        let out_file = tmp.path().join("stdout.txt");
        let mut request = sh("echo both");
        request.stdout = OutputPolicy::Both(out_file.clone());

        let output = ExecutionRunner::new().run(&request);
        assert_eq!(output.stdout.as_deref().map(str::trim), Some("both"));
        let written = std::fs::read_to_string(&out_file).unwrap();
        assert_eq!(written.trim(), "both");
    }

    #[test]
    fn test_env_override_visible_to_child_only() {
        let mut request = sh("printf '%s' \"$MUSTER_TEST_MARKER\"");
        request.env = vec![("MUSTER_TEST_MARKER".to_string(), "scoped".to_string())];

        let output = ExecutionRunner::new().run(&request);
        assert_eq!(output.stdout.as_deref(), Some("scoped"));
        // Parent environment stays untouched.
        assert!(std::env::var("MUSTER_TEST_MARKER").is_err());
    }

    #[test]
    fn test_missing_program_defaults_to_return_code_one() {
        let output = ExecutionRunner::new().run(
            &CommandRequest::builder()
                .program("muster-definitely-not-a-binary")
                .build(),
        );
        assert_eq!(output.return_code, 1);
        assert!(!output.started);
        assert!(output.stderr.unwrap().contains("failed to start"));
    }

    #[test]
    fn test_timeout_kills_child() {
        let mut request = sh("sleep 5");
        request.timeout = Some(Duration::from_millis(100));

        let started = Instant::now();
        let output = ExecutionRunner::new().run(&request);
        assert!(output.timed_out);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_cwd_applies() {
        let tmp = tempfile::tempdir().unwrap();
        let mut request = sh("pwd");
        request.cwd = Some(tmp.path().to_path_buf());
        let output = ExecutionRunner::new().run(&request);
        let pwd = output.stdout.unwrap();
        let reported = std::fs::canonicalize(pwd.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(tmp.path()).unwrap());
    }

    #[test]
    fn test_resolve_executable_finds_sh() {
        let resolved = resolve_executable("sh").expect("sh should be on PATH");
        assert!(resolved.is_absolute());
    }

    #[test]
    fn test_resolve_executable_unknown_is_none() {
        assert!(resolve_executable("muster-definitely-not-a-binary").is_none());
    }

    #[test]
    fn test_command_line_rendering() {
        let request = CommandRequest::builder()
            .program("bandit")
            .args(vec!["-r".to_string(), "src".to_string()])
            .build();
        assert_eq!(request.command_line(), "bandit -r src");
    }
}
