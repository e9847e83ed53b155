use std::path::Path;

use crate::error::{EmulatorError, Result};
use crate::models::ProjectConfig;

pub const CONFIG_FILENAME: &str = "emulators.yaml";

pub fn load(project_dir: &Path) -> Result<ProjectConfig> {
    let config_path = project_dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Err(EmulatorError::ConfigNotFound(config_path));
    }
    let contents = std::fs::read_to_string(&config_path)?;
    let config: ProjectConfig = serde_yaml::from_str(&contents)
        .map_err(|e| EmulatorError::InvalidConfig(e.to_string()))?;
    for (emulator, settings) in &config.emulators {
        if settings.command.trim().is_empty() {
            return Err(EmulatorError::InvalidConfig(format!(
                "{emulator}: command field is required"
            )));
        }
    }
    if config.startup_timeout_secs == 0 {
        return Err(EmulatorError::InvalidConfig(
            "startup_timeout_secs must be greater than zero".into(),
        ));
    }
    Ok(config)
}
