use std::collections::BTreeMap;

use serde::Deserialize;

use super::emulator::Emulator;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_FUNCTIONS_SOURCE: &str = "functions";

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
    #[serde(default)]
    pub functions: FunctionsConfig,
    #[serde(default)]
    pub emulators: BTreeMap<Emulator, EmulatorConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionsConfig {
    #[serde(default = "default_functions_source")]
    pub source: String,
}

impl Default for FunctionsConfig {
    fn default() -> Self {
        Self {
            source: default_functions_source(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmulatorConfig {
    /// Shell command; `{host}` and `{port}` are substituted before launch.
    pub command: String,
    #[serde(default)]
    pub host: Option<String>,
    /// `0` asks for any free port.
    #[serde(default)]
    pub port: Option<u16>,
}

impl EmulatorConfig {
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    pub fn port_for(&self, emulator: Emulator) -> u16 {
        self.port.unwrap_or_else(|| emulator.default_port())
    }

    pub fn render_command(&self, host: &str, port: u16) -> String {
        self.command
            .replace("{host}", host)
            .replace("{port}", &port.to_string())
    }
}

fn default_startup_timeout() -> u64 {
    DEFAULT_STARTUP_TIMEOUT_SECS
}

fn default_functions_source() -> String {
    DEFAULT_FUNCTIONS_SOURCE.to_string()
}
