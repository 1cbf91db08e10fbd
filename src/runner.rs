//! Invocation of privileged system tools.
//!
//! Everything the dashboard learns about the host comes from shelling out:
//! `fail2ban-client`, `iptables-save`, `test`, `tail` and `grep`, normally
//! through `sudo`. Components talk to the [`CommandRunner`] trait so their
//! parsing can be exercised against canned output.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::ProcessError;

/// Deadline for control-plane, tail, grep and firewall dump calls.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline for file-existence probes.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program args...`, returning stdout when the exit status is zero.
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<String, ProcessError>;
}

/// Runs commands on the host, optionally prefixed with `sudo`.
#[derive(Debug, Clone)]
pub struct SudoRunner {
    use_sudo: bool,
}

impl SudoRunner {
    pub fn new(use_sudo: bool) -> Self {
        Self { use_sudo }
    }

    fn command(&self, program: &str, args: &[&str]) -> Command {
        let mut cmd = if self.use_sudo {
            let mut cmd = Command::new("sudo");
            cmd.arg("-n").arg(program);
            cmd
        } else {
            Command::new(program)
        };
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for SudoRunner {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl CommandRunner for SudoRunner {
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<String, ProcessError> {
        debug!(program, ?args, "running privileged command");

        let child = self
            .command(program, args)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: program.to_string(),
                source,
            })?;

        // dropping the future on timeout kills the child
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| ProcessError::Timeout {
                program: program.to_string(),
                timeout,
            })?
            .map_err(|source| ProcessError::Spawn {
                program: program.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProcessError::ExitStatus {
                program: program.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::HashMap;

    use parking_lot::Mutex;

    use super::*;

    /// Scripted runner: maps a full command line to a canned result and
    /// records every invocation.
    #[derive(Default)]
    pub struct FakeRunner {
        responses: Mutex<HashMap<String, Result<String, i32>>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn ok(self, command_line: &str, stdout: &str) -> Self {
            self.responses
                .lock()
                .insert(command_line.to_string(), Ok(stdout.to_string()));
            self
        }

        pub fn fail(self, command_line: &str, code: i32) -> Self {
            self.responses
                .lock()
                .insert(command_line.to_string(), Err(code));
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(
            &self,
            program: &str,
            args: &[&str],
            timeout: Duration,
        ) -> Result<String, ProcessError> {
            let line = std::iter::once(program)
                .chain(args.iter().copied())
                .collect::<Vec<_>>()
                .join(" ");
            self.calls.lock().push(line.clone());

            match self.responses.lock().get(&line) {
                Some(Ok(stdout)) => Ok(stdout.clone()),
                Some(Err(code)) => Err(ProcessError::ExitStatus {
                    program: program.to_string(),
                    code: Some(*code),
                    stderr: String::new(),
                }),
                None => Err(ProcessError::Timeout {
                    program: program.to_string(),
                    timeout,
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn direct_runner_returns_stdout() {
        let runner = SudoRunner::new(false);
        let out = runner
            .run("echo", &["hello"], COMMAND_TIMEOUT)
            .await
            .expect("echo runs");
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let runner = SudoRunner::new(false);
        let err = runner
            .run("false", &[], COMMAND_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::ExitStatus { code: Some(1), .. }));
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let runner = SudoRunner::new(false);
        let err = runner
            .run("definitely-not-a-real-binary-f2b", &[], PROBE_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[tokio::test]
    async fn slow_process_times_out() {
        let runner = SudoRunner::new(false);
        let err = runner
            .run("sleep", &["5"], Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { .. }));
    }
}
