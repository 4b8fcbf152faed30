//! External process execution with captured output.
//!
//! ## Why `output()` under a timeout?
//!
//! `tokio::process::Command::output` drains stdout and stderr concurrently,
//! so a chatty converter can never fill a pipe buffer and deadlock against
//! us. Wrapping it in `tokio::time::timeout` with `kill_on_drop(true)` means
//! a hung office process is killed the moment the timeout fires, and the
//! stage is reported as failed rather than blocking the worker forever.

use crate::error::StageError;
use crate::report::StageResult;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

/// A program and its full argument vector. `argv[0]` is the executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub executable: String,
    pub args: Vec<String>,
}

impl ToolInvocation {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Build from a full argument vector. Fails when `argv` is empty.
    pub fn from_argv<I, S>(argv: I) -> Result<Self, StageError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut it = argv.into_iter().map(Into::into);
        let executable = it.next().ok_or(StageError::EmptyCommand)?;
        Ok(Self {
            executable,
            args: it.collect(),
        })
    }

    /// The full argument vector including the executable.
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.executable.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

/// Spawns external programs and reports their outcome as a [`StageResult`].
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ProcessRunner {
    /// `None` waits indefinitely.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run `invocation` to completion and report it under `stage_name`.
    ///
    /// Never returns an error: launch failures, non-zero exits, and timeouts
    /// all come back as a failed `StageResult` carrying the cause.
    pub async fn run(&self, stage_name: &str, invocation: &ToolInvocation) -> StageResult {
        let start = Instant::now();
        debug!("{}: {}", stage_name, invocation.argv().join(" "));

        let mut command = Command::new(&invocation.executable);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, command.output()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("{}: timed out after {:?}", stage_name, limit);
                    return StageResult::failure(
                        stage_name,
                        StageError::timeout(limit),
                    );
                }
            },
            None => command.output().await,
        };

        let output = match output {
            Ok(o) => o,
            Err(e) => {
                warn!("{}: failed to launch '{}': {}", stage_name, invocation.executable, e);
                return StageResult::failure(
                    stage_name,
                    StageError::LaunchFailed {
                        program: invocation.executable.clone(),
                        detail: e.to_string(),
                    },
                );
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        debug!(
            "{}: exited with {} in {}ms",
            stage_name,
            output.status,
            start.elapsed().as_millis()
        );

        if output.status.success() {
            return StageResult::success(stage_name, join_output(&stdout, &stderr));
        }

        let cause = match output.status.code() {
            Some(code) => StageError::NonZeroExit {
                code,
                stderr: stderr.clone(),
            },
            None => StageError::Terminated {
                stderr: stderr.clone(),
            },
        };
        warn!("{}: {}", stage_name, cause);
        StageResult::failure_with_output(stage_name, cause, join_output(&stdout, &stderr))
    }
}

fn join_output(stdout: &str, stderr: &str) -> String {
    match (stdout.is_empty(), stderr.is_empty()) {
        (true, true) => String::new(),
        (false, true) => stdout.to_string(),
        (true, false) => stderr.to_string(),
        (false, false) => format!("{stdout}\n{stderr}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn from_argv_splits_executable() {
        let inv = ToolInvocation::from_argv(["java", "-jar", "x.jar"]).unwrap();
        assert_eq!(inv.executable, "java");
        assert_eq!(inv.args, vec!["-jar", "x.jar"]);
        assert_eq!(inv.argv(), vec!["java", "-jar", "x.jar"]);
    }

    #[test]
    fn from_argv_rejects_empty() {
        let err = ToolInvocation::from_argv(Vec::<String>::new()).unwrap_err();
        assert_eq!(err, StageError::EmptyCommand);
    }

    #[test]
    fn join_output_variants() {
        assert_eq!(join_output("", ""), "");
        assert_eq!(join_output("a", ""), "a");
        assert_eq!(join_output("", "b"), "b");
        assert_eq!(join_output("a", "b"), "a\nb");
    }

    #[tokio::test]
    async fn launch_failure_is_reported() {
        let runner = ProcessRunner::default();
        let inv = ToolInvocation::new("definitely-not-a-real-program-docconv");
        let result = runner.run("doJodConvert", &inv).await;
        assert!(!result.succeeded);
        assert_eq!(result.stage_name, "doJodConvert");
        assert!(matches!(result.cause, Some(StageError::LaunchFailed { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn success_captures_stdout() {
        let runner = ProcessRunner::new(Some(Duration::from_secs(10)));
        let inv = ToolInvocation::from_argv(["sh", "-c", "echo converted"]).unwrap();
        let result = runner.run("s", &inv).await;
        assert!(result.succeeded, "{result:?}");
        assert_eq!(result.message.as_deref(), Some("converted"));
        assert!(result.cause.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_captures_stderr() {
        let runner = ProcessRunner::new(Some(Duration::from_secs(10)));
        let inv = ToolInvocation::from_argv(["sh", "-c", "echo bad input >&2; exit 3"]).unwrap();
        let result = runner.run("s", &inv).await;
        assert!(!result.succeeded);
        match result.cause {
            Some(StageError::NonZeroExit { code, ref stderr }) => {
                assert_eq!(code, 3);
                assert_eq!(stderr, "bad input");
            }
            ref other => panic!("expected NonZeroExit, got {other:?}"),
        }
        assert_eq!(result.message.as_deref(), Some("bad input"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_and_reports() {
        let runner = ProcessRunner::new(Some(Duration::from_millis(200)));
        let inv = ToolInvocation::from_argv(["sleep", "5"]).unwrap();
        let start = Instant::now();
        let result = runner.run("s", &inv).await;
        assert!(start.elapsed() < Duration::from_secs(4));
        assert!(!result.succeeded);
        let cause = result.cause.unwrap();
        assert_eq!(cause, StageError::Timeout { millis: 200 });
        assert!(cause.to_string().contains("200ms"));
        assert_eq!(cause.kind(), ErrorKind::ProcessExecution);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn large_output_does_not_deadlock() {
        let runner = ProcessRunner::new(Some(Duration::from_secs(20)));
        let inv = ToolInvocation::from_argv([
            "sh",
            "-c",
            "i=0; while [ $i -lt 20000 ]; do echo line-$i; echo err-$i >&2; i=$((i+1)); done",
        ])
        .unwrap();
        let result = runner.run("s", &inv).await;
        assert!(result.succeeded, "{:?}", result.cause);
        assert!(result.message.unwrap().contains("line-19999"));
    }
}
