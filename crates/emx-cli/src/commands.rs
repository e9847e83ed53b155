use std::path::Path;

use color_eyre::eyre::WrapErr;

use emx_core::models::config::DEFAULT_FUNCTIONS_SOURCE;
use emx_core::models::{ProcessOutcome, StartOptions};
use emx_core::services::controller::EmulatorController;
use emx_core::services::orchestrator::Orchestrator;
use emx_core::services::{config_loader, validate};
use emx_core::EmulatorError;

/// `emulators:exec`: start emulators, run `script`, shut emulators down.
pub async fn emulators_exec(
    project_dir: &Path,
    script: &str,
    options: &StartOptions,
) -> color_eyre::Result<ProcessOutcome> {
    let controller = EmulatorController::load(project_dir).wrap_err_with(|| {
        format!("could not load emulator config from {}", project_dir.display())
    })?;
    let outcome = Orchestrator::new(&controller)
        .execute(script, options)
        .await?;
    Ok(outcome)
}

/// `functions:check`: validate the functions source directory and names.
pub fn functions_check(
    project_dir: &Path,
    source: Option<&str>,
    names: &[String],
) -> color_eyre::Result<()> {
    let source = match source {
        Some(source) => source.to_string(),
        None => match config_loader::load(project_dir) {
            Ok(config) => config.functions.source,
            Err(EmulatorError::ConfigNotFound(_)) => DEFAULT_FUNCTIONS_SOURCE.to_string(),
            Err(e) => return Err(e.into()),
        },
    };

    validate::functions_directory_exists(project_dir, &source)?;
    validate::package_json_is_valid(&source, &project_dir.join(&source), project_dir)?;
    validate::function_names_are_valid(names)?;
    tracing::info!("functions source \"{source}\" looks good");
    Ok(())
}
