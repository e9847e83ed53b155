use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{EmulatorError, Result};
use crate::models::Emulator;

use super::supervisor::DEFAULT_SHELL;

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// How long an emulator's process group gets to exit after SIGTERM.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// A spawned emulator shell and the process group it leads.
pub struct EmulatorProcess {
    pub child: Child,
    // Recorded at spawn; `Child::id` is gone once the leader is reaped.
    pgid: Option<u32>,
}

pub fn log_path(project_dir: &Path, emulator: Emulator) -> PathBuf {
    project_dir.join(format!("{emulator}-debug.log"))
}

/// Spawn an emulator command through the shell.
///
/// Returns the process handle and a channel receiver that streams
/// combined stdout/stderr lines.
pub async fn start(
    project_dir: &Path,
    emulator: Emulator,
    command: &str,
) -> Result<(EmulatorProcess, mpsc::UnboundedReceiver<String>)> {
    let mut cmd = Command::new(DEFAULT_SHELL.0);
    cmd.args([DEFAULT_SHELL.1, command]);
    cmd.current_dir(project_dir);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);
    // Own process group so shutdown reaches whatever the shell started.
    #[cfg(unix)]
    cmd.process_group(0);

    tracing::debug!(%emulator, command, "spawning emulator");
    let mut child = cmd.spawn().map_err(|e| EmulatorError::Startup {
        emulator: emulator.to_string(),
        message: format!("failed to spawn '{command}': {e}"),
    })?;

    let (tx, rx) = mpsc::unbounded_channel();

    if let Some(stdout) = child.stdout.take() {
        let tx_out = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let _ = tx_out.send(line);
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        let tx_err = tx;
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let _ = tx_err.send(line);
            }
        });
    }

    let pgid = child.id();
    Ok((EmulatorProcess { child, pgid }, rx))
}

/// Drain emulator output into its debug log file and the trace log.
pub fn spawn_log_writer(
    log_path: PathBuf,
    emulator: Emulator,
    mut log_rx: mpsc::UnboundedReceiver<String>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut file = match tokio::fs::File::create(&log_path).await {
            Ok(f) => Some(f),
            Err(e) => {
                tracing::warn!(
                    "could not open {} for {emulator} emulator output: {e}",
                    log_path.display()
                );
                None
            }
        };
        while let Some(line) = log_rx.recv().await {
            tracing::debug!(%emulator, "{line}");
            if let Some(f) = file.as_mut() {
                let _ = f.write_all(format!("{line}\n").as_bytes()).await;
            }
        }
        if let Some(f) = file.as_mut() {
            let _ = f.flush().await;
        }
    })
}

/// Poll until the emulator accepts TCP connections on `host:port`.
pub async fn wait_until_ready(
    emulator: Emulator,
    child: &mut Child,
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<()> {
    let startup_error = |message: String| EmulatorError::Startup {
        emulator: emulator.to_string(),
        message,
    };
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child
            .try_wait()
            .map_err(|e| startup_error(format!("failed to poll process: {e}")))?
        {
            return Err(startup_error(format!(
                "process exited before becoming ready ({status})"
            )));
        }
        let attempt =
            tokio::time::timeout_at(deadline, TcpStream::connect((host, port))).await;
        if matches!(attempt, Ok(Ok(_))) {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(startup_error(format!(
                "not listening on {host}:{port} after {timeout:?}"
            )));
        }
        tokio::time::sleep(READY_POLL_INTERVAL).await;
    }
}

/// Stop an emulator: SIGTERM its process group, then SIGKILL whatever is
/// still in the group after `grace`.
///
/// The group is signalled even when the shell has already exited, since
/// the processes it started may outlive it.
pub async fn stop(
    emulator: Emulator,
    process: &mut EmulatorProcess,
    grace: Duration,
) -> Result<()> {
    let shutdown_error = move |e: std::io::Error| {
        EmulatorError::Shutdown(format!("failed to stop {emulator} emulator: {e}"))
    };

    #[cfg(unix)]
    {
        if let Some(pgid) = process.pgid {
            let deadline = Instant::now() + grace;
            signal_group(pgid, libc::SIGTERM);
            if let Ok(waited) = tokio::time::timeout_at(deadline, process.child.wait()).await {
                waited.map_err(shutdown_error)?;
            }
            while group_alive(pgid) && Instant::now() < deadline {
                tokio::time::sleep(STOP_POLL_INTERVAL).await;
            }
            if group_alive(pgid) {
                tracing::warn!("{emulator} emulator ignored SIGTERM, killing it");
                signal_group(pgid, libc::SIGKILL);
            }
        }
    }

    if process.child.try_wait().map_err(shutdown_error)?.is_some() {
        return Ok(());
    }
    process.child.kill().await.map_err(shutdown_error)
}

// ESRCH just means the group is already empty.
#[cfg(unix)]
fn signal_group(pgid: u32, signal: libc::c_int) -> bool {
    // SAFETY: kill(2) takes plain integers; a negative pid addresses the process group.
    unsafe { libc::kill(-(pgid as libc::pid_t), signal) == 0 }
}

#[cfg(unix)]
fn group_alive(pgid: u32) -> bool {
    signal_group(pgid, 0)
}
