//! Subprocess invocation with a time budget
//!
//! Every external call runs on a small current-thread tokio runtime owned by
//! the runner, so a hung tool is killed after `timeout` instead of stalling
//! the scrape.

use crate::error::{NumaExporterError, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::runtime::Runtime;

/// Runs external tools and returns their stdout
pub struct CommandRunner {
    runtime: Runtime,
    timeout: Duration,
}

impl std::fmt::Debug for CommandRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRunner")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CommandRunner {
    /// Create a runner with the given per-invocation timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| NumaExporterError::config(format!("cannot start command runtime: {}", e)))?;

        Ok(Self { runtime, timeout })
    }

    /// Run `program args...` and return its stdout as UTF-8 text
    pub fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        let command_line = render_command(program, args);
        tracing::debug!("Running '{}'", command_line);

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = self.runtime.block_on(async {
            tokio::time::timeout(self.timeout, command.output()).await
        });

        let output = match output {
            Err(_) => {
                return Err(NumaExporterError::CommandTimeout {
                    command: command_line,
                    timeout: self.timeout,
                })
            }
            Ok(Err(source)) => {
                return Err(NumaExporterError::CommandSpawn {
                    command: command_line,
                    source,
                })
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            return Err(NumaExporterError::CommandFailed {
                command: command_line,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|_| NumaExporterError::MalformedOutput {
            command: command_line,
            message: "stdout is not valid UTF-8".to_string(),
        })
    }
}

/// Render a command line for logs and errors
pub fn render_command(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn runner(timeout_ms: u64) -> CommandRunner {
        CommandRunner::new(Duration::from_millis(timeout_ms)).unwrap()
    }

    #[test]
    fn test_captures_stdout() {
        let out = runner(5000).run("sh", &["-c", "echo hello"]).unwrap();
        assert_eq!(out, "hello\n");
    }

    #[test]
    fn test_nonzero_exit_is_error() {
        let err = runner(5000)
            .run("sh", &["-c", "echo broken >&2; exit 3"])
            .unwrap_err();
        match err {
            NumaExporterError::CommandFailed { command, stderr, .. } => {
                assert_eq!(command, "sh -c echo broken >&2; exit 3");
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let err = runner(5000)
            .run("/nonexistent/numa-exporter-tool", &[])
            .unwrap_err();
        assert!(matches!(err, NumaExporterError::CommandSpawn { .. }));
        assert!(err.is_command_error());
    }

    #[test]
    fn test_timeout_kills_hung_tool() {
        let started = std::time::Instant::now();
        let err = runner(200).run("sleep", &["5"]).unwrap_err();
        assert!(matches!(err, NumaExporterError::CommandTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_render_command() {
        assert_eq!(render_command("virsh", &["list", "--uuid"]), "virsh list --uuid");
        assert_eq!(render_command("ip", &[]), "ip");
    }
}
