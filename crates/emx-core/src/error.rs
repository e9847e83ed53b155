use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum EmulatorError {
    #[error("config file not found at {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("unknown emulator '{name}', valid options are: {valid}")]
    UnknownEmulator { name: String, valid: String },

    #[error("emulator '{0}' is not configured in emulators.yaml")]
    EmulatorNotConfigured(String),

    #[error("no emulators to start, configure at least one emulator or adjust --only")]
    NoEmulators,

    #[error("port allocation failed: {0}")]
    PortAllocation(String),

    #[error("{emulator} emulator failed to start: {message}")]
    Startup { emulator: String, message: String },

    #[error("emulator shutdown failed: {0}")]
    Shutdown(String),

    #[error("there was an error running the script '{command}': {message}")]
    ScriptSpawn { command: String, message: String },

    #[error("script '{command}' exited with signal {signal}")]
    ScriptSignaled { command: String, signal: String },

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EmulatorError>;
