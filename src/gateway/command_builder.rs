//! Type-safe command builder for environment manager invocations
//!
//! Every interaction with the external environment manager goes through
//! [`ManagerCommand`]: a fluent builder that owns process spawning,
//! bounded timeouts, output capture, and translation of process failures
//! into typed errors. Installer logic never touches `tokio::process`
//! directly.
//!
//! Two timeout behaviors exist:
//! - the default treats an elapsed timeout as an error (the command was
//!   expected to finish), killing the child;
//! - [`ManagerCommand::kill_on_timeout`] treats the timeout as the normal
//!   end of the run and returns whatever output was captured - this is
//!   how the runtime import probe bounds a target that would otherwise
//!   keep running.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::CorkscrewError;

/// Captured result of one external command.
#[derive(Debug)]
pub struct CommandOutput {
    /// Captured standard output (lossy UTF-8)
    pub stdout: String,
    /// Captured standard error (lossy UTF-8)
    pub stderr: String,
    /// Exit code, when the process ran to completion
    pub exit_code: Option<i32>,
    /// Whether the bounded timeout ended the run
    pub timed_out: bool,
}

impl CommandOutput {
    /// Whether the command completed with exit code zero.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Builder for one external manager command.
pub struct ManagerCommand {
    /// Full command line prefix, including any Flatpak wrapper
    program: Vec<String>,
    /// Logical operation name, used in error reporting (e.g. "new", "run")
    operation: String,
    args: Vec<String>,
    env_vars: Vec<(String, String)>,
    current_dir: Option<PathBuf>,
    timeout_duration: Option<Duration>,
    kill_on_timeout: bool,
    context: Option<String>,
}

impl ManagerCommand {
    /// Create a command for `program` (a detected command-line prefix)
    /// performing `operation`.
    pub fn new(program: &[String], operation: impl Into<String>) -> Self {
        Self {
            program: program.to_vec(),
            operation: operation.into(),
            args: Vec::new(),
            env_vars: Vec::new(),
            current_dir: None,
            // Default bound; callers override per operation.
            timeout_duration: Some(Duration::from_secs(300)),
            kill_on_timeout: false,
            context: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child process.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Set the working directory for the child process.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Set the bounded timeout (`None` disables the bound).
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Treat an elapsed timeout as the normal end of the run: the child is
    /// killed and the captured output is returned with `timed_out` set.
    pub const fn kill_on_timeout(mut self) -> Self {
        self.kill_on_timeout = true;
        self
    }

    /// Attach a context label included in debug logs, useful when several
    /// operations run concurrently.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The logical program name for error messages (unwraps the Flatpak
    /// `--command=` indirection).
    fn program_name(&self) -> String {
        self.program
            .iter()
            .find_map(|part| part.strip_prefix("--command="))
            .map_or_else(
                || {
                    self.program
                        .first()
                        .map_or_else(|| "manager".to_string(), |p| p.clone())
                },
                ToString::to_string,
            )
    }

    /// Spawn the command and wait for completion or timeout.
    pub async fn execute(self) -> Result<CommandOutput, CorkscrewError> {
        let program_name = self.program_name();
        let (head, wrapper_args) = self
            .program
            .split_first()
            .ok_or_else(|| CorkscrewError::Other(anyhow::anyhow!("empty command line")))?;

        let mut cmd = Command::new(head);
        cmd.args(wrapper_args);
        cmd.args(&self.args);
        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        if let Some(ctx) = &self.context {
            tracing::debug!(
                target: "gateway",
                "({}) executing: {} {}",
                ctx,
                self.program.join(" "),
                self.args.join(" ")
            );
        } else {
            tracing::debug!(
                target: "gateway",
                "executing: {} {}",
                self.program.join(" "),
                self.args.join(" ")
            );
        }

        let mut child = cmd.spawn().map_err(|e| CorkscrewError::CommandFailed {
            program: program_name.clone(),
            operation: self.operation.clone(),
            stderr: format!("failed to spawn: {e}"),
        })?;

        // Drain pipes concurrently so a chatty child cannot deadlock on a
        // full pipe buffer while we wait on it.
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let stdout_task = tokio::spawn(read_pipe(stdout_pipe));
        let stderr_task = tokio::spawn(read_pipe(stderr_pipe));

        let (exit_code, timed_out) = match self.timeout_duration {
            Some(limit) => match timeout(limit, child.wait()).await {
                Ok(status) => (status?.code(), false),
                Err(_) if self.kill_on_timeout => {
                    tracing::debug!(
                        target: "gateway",
                        "{} {} reached its {}s window, stopping it",
                        program_name,
                        self.operation,
                        limit.as_secs()
                    );
                    child.kill().await.ok();
                    child.wait().await.ok();
                    (None, true)
                }
                Err(_) => {
                    tracing::warn!(
                        target: "gateway",
                        "{} {} timed out after {}s",
                        program_name,
                        self.operation,
                        limit.as_secs()
                    );
                    child.kill().await.ok();
                    child.wait().await.ok();
                    return Err(CorkscrewError::CommandTimeout {
                        program: program_name,
                        operation: self.operation,
                        seconds: limit.as_secs(),
                    });
                }
            },
            None => (child.wait().await?.code(), false),
        };

        let stdout = String::from_utf8_lossy(&stdout_task.await.unwrap_or_default()).into_owned();
        let stderr = String::from_utf8_lossy(&stderr_task.await.unwrap_or_default()).into_owned();

        if exit_code != Some(0) && !timed_out {
            tracing::debug!(
                target: "gateway",
                "{} {} exited with {:?}: {}",
                program_name,
                self.operation,
                exit_code,
                truncate(&stderr, 200)
            );
        }

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code,
            timed_out,
        })
    }

    /// Execute and require exit code zero, mapping failure to a typed
    /// command error.
    pub async fn execute_success(self) -> Result<CommandOutput, CorkscrewError> {
        let program = self.program_name();
        let operation = self.operation.clone();
        let output = self.execute().await?;
        if output.success() {
            Ok(output)
        } else {
            Err(CorkscrewError::CommandFailed {
                program,
                operation,
                stderr: truncate(&output.stderr, 500).to_string(),
            })
        }
    }
}

async fn read_pipe<R>(pipe: Option<R>) -> Vec<u8>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    buf
}

/// Clamp external output for error messages and logs.
pub fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> ManagerCommand {
        ManagerCommand::new(&["sh".to_string()], "test").args(["-c", script])
    }

    #[tokio::test]
    async fn captures_output_and_exit_code() {
        let output = sh("echo out; echo err >&2").execute().await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_an_execute_error() {
        let output = sh("exit 3").execute().await.unwrap();
        assert!(!output.success());
        assert_eq!(output.exit_code, Some(3));
    }

    #[tokio::test]
    async fn execute_success_maps_nonzero_to_typed_error() {
        let err = sh("echo boom >&2; exit 1").execute_success().await.unwrap_err();
        match err {
            CorkscrewError::CommandFailed { stderr, .. } => assert!(stderr.contains("boom")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn timeout_is_a_typed_error_by_default() {
        let err = sh("sleep 5")
            .with_timeout(Some(Duration::from_millis(100)))
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(err, CorkscrewError::CommandTimeout { .. }));
    }

    #[tokio::test]
    async fn kill_on_timeout_returns_partial_output() {
        let output = sh("echo partial >&2; sleep 5")
            .with_timeout(Some(Duration::from_millis(200)))
            .kill_on_timeout()
            .execute()
            .await
            .unwrap();
        assert!(output.timed_out);
        assert!(output.stderr.contains("partial"));
    }

    #[test]
    fn program_name_unwraps_flatpak_indirection() {
        let cmd = ManagerCommand::new(
            &[
                "flatpak".to_string(),
                "run".to_string(),
                "--command=bottles-cli".to_string(),
                "com.usebottles.bottles".to_string(),
            ],
            "new",
        );
        assert_eq!(cmd.program_name(), "bottles-cli");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("ab", 3), "ab");
    }
}
