use std::fmt;

/// Terminal result of one script invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Success,
    NonZeroExit(i32),
    Signaled(i32),
    SpawnError(String),
}

impl fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessOutcome::Success => f.write_str("exited successfully (code 0)"),
            ProcessOutcome::NonZeroExit(code) => write!(f, "exited unsuccessfully (code {code})"),
            ProcessOutcome::Signaled(signal) => {
                write!(f, "exited with signal {}", signal_name(*signal))
            }
            ProcessOutcome::SpawnError(message) => write!(f, "failed to start: {message}"),
        }
    }
}

/// Human readable name for a signal number, e.g. `SIGKILL`.
#[cfg(unix)]
pub fn signal_name(signal: i32) -> String {
    let name = match signal {
        libc::SIGHUP => "SIGHUP",
        libc::SIGINT => "SIGINT",
        libc::SIGQUIT => "SIGQUIT",
        libc::SIGABRT => "SIGABRT",
        libc::SIGKILL => "SIGKILL",
        libc::SIGSEGV => "SIGSEGV",
        libc::SIGPIPE => "SIGPIPE",
        libc::SIGALRM => "SIGALRM",
        libc::SIGTERM => "SIGTERM",
        libc::SIGUSR1 => "SIGUSR1",
        libc::SIGUSR2 => "SIGUSR2",
        _ => return format!("signal {signal}"),
    };
    name.to_string()
}

#[cfg(not(unix))]
pub fn signal_name(signal: i32) -> String {
    format!("signal {signal}")
}
