//! Runs a user script as a child process against the emulator environment.
//!
//! The script runs through the platform shell with stdin inherited and
//! stdout/stderr piped. Each pipe gets its own forwarding task that copies
//! bytes to the parent's matching stream as soon as they arrive. The child
//! sees only the discovery variables, never the parent's environment.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::{EmulatorError, Result};
use crate::models::outcome::signal_name;
use crate::models::ProcessOutcome;

use super::environment::EnvironmentMap;

/// Upper bound on how long output forwarding may lag behind process exit.
pub const EXIT_GRACE_PERIOD: Duration = Duration::from_millis(500);

#[cfg(unix)]
pub(crate) const DEFAULT_SHELL: (&str, &str) = ("/bin/sh", "-c");

#[cfg(windows)]
pub(crate) const DEFAULT_SHELL: (&str, &str) = ("cmd.exe", "/C");

pub struct Supervisor {
    shell: PathBuf,
    shell_flag: String,
    grace_period: Duration,
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            shell: PathBuf::from(DEFAULT_SHELL.0),
            shell_flag: DEFAULT_SHELL.1.to_string(),
            grace_period: EXIT_GRACE_PERIOD,
        }
    }

    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Run `command`, forwarding its output to this process's stdout/stderr.
    ///
    /// Success and nonzero exits complete normally. A spawn failure or a
    /// signal kill is returned as an error.
    pub async fn run(&self, command: &str, env: &EnvironmentMap) -> Result<ProcessOutcome> {
        self.run_with_output(command, env, tokio::io::stdout(), tokio::io::stderr())
            .await
    }

    pub async fn run_with_output<O, E>(
        &self,
        command: &str,
        env: &EnvironmentMap,
        stdout: O,
        stderr: E,
    ) -> Result<ProcessOutcome>
    where
        O: AsyncWrite + Unpin + Send + 'static,
        E: AsyncWrite + Unpin + Send + 'static,
    {
        let outcome = self.supervise(command, env, stdout, stderr).await;
        report(command, outcome)
    }

    /// Spawn and wait for the terminal event, producing exactly one outcome.
    pub async fn supervise<O, E>(
        &self,
        command: &str,
        env: &EnvironmentMap,
        stdout: O,
        stderr: E,
    ) -> ProcessOutcome
    where
        O: AsyncWrite + Unpin + Send + 'static,
        E: AsyncWrite + Unpin + Send + 'static,
    {
        tracing::info!("Running script: {command}");
        tracing::debug!(command, env = ?env, "running script with environment");

        let mut cmd = Command::new(&self.shell);
        cmd.arg(&self.shell_flag).arg(command);
        cmd.env_clear();
        cmd.envs(env);
        cmd.stdin(Stdio::inherit());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return ProcessOutcome::SpawnError(e.to_string()),
        };

        let mut forwarders = Vec::with_capacity(2);
        if let Some(out) = child.stdout.take() {
            forwarders.push(forward(out, stdout, "stdout"));
        }
        if let Some(err) = child.stderr.take() {
            forwarders.push(forward(err, stderr, "stderr"));
        }

        let status = child.wait().await;
        self.drain(forwarders).await;

        match status {
            Ok(status) => outcome_from_status(status),
            Err(e) => ProcessOutcome::SpawnError(e.to_string()),
        }
    }

    /// Wait for both forwarders to hit EOF, but no longer than the grace period.
    async fn drain(&self, forwarders: Vec<JoinHandle<()>>) {
        let deadline = Instant::now() + self.grace_period;
        for mut handle in forwarders {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                tracing::debug!("script output still open after grace period, detaching");
                handle.abort();
            }
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy bytes from a child pipe to `writer` until EOF.
fn forward<R, W>(mut reader: R, mut writer: W, stream: &'static str) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; 8192];
        let mut writable = true;
        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    tracing::debug!(stream, error = %e, "failed to read script output");
                    break;
                }
            };
            // Keep draining after a write failure so the child never blocks on a full pipe.
            if writable {
                let written = match writer.write_all(&buf[..n]).await {
                    Ok(()) => writer.flush().await,
                    Err(e) => Err(e),
                };
                if let Err(e) = written {
                    tracing::debug!(stream, error = %e, "failed to forward script output");
                    writable = false;
                }
            }
        }
        let _ = writer.flush().await;
    })
}

fn outcome_from_status(status: ExitStatus) -> ProcessOutcome {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ProcessOutcome::Signaled(signal);
        }
    }
    match status.code() {
        Some(0) => ProcessOutcome::Success,
        Some(code) => ProcessOutcome::NonZeroExit(code),
        None => ProcessOutcome::NonZeroExit(-1),
    }
}

fn report(command: &str, outcome: ProcessOutcome) -> Result<ProcessOutcome> {
    match &outcome {
        ProcessOutcome::Success => {
            tracing::info!("Script {outcome}");
            Ok(outcome)
        }
        ProcessOutcome::NonZeroExit(_) => {
            tracing::warn!("Script {outcome}");
            Ok(outcome)
        }
        ProcessOutcome::Signaled(signal) => {
            tracing::warn!("Script {outcome}");
            Err(EmulatorError::ScriptSignaled {
                command: command.to_string(),
                signal: signal_name(*signal),
            })
        }
        ProcessOutcome::SpawnError(message) => {
            tracing::warn!("Script {outcome}");
            Err(EmulatorError::ScriptSpawn {
                command: command.to_string(),
                message: message.clone(),
            })
        }
    }
}
