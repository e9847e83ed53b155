use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::{EmulatorError, Result};
use crate::models::{Emulator, EmulatorConfig, EmulatorInfo, ProjectConfig, StartOptions};
use crate::services::emulator::{self, EmulatorProcess};
use crate::services::{config_loader, validate};

use super::ports::PortAllocator;
use super::registry::{EmulatorRegistry, ServiceRegistry};

const LOG_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Brings emulators up before a script runs and tears them down afterwards.
#[async_trait]
pub trait ServiceController: Send + Sync {
    async fn start_all(&self, options: &StartOptions) -> Result<()>;

    /// Stop everything that was started. Safe to call when nothing is running.
    async fn clean_shutdown(&self) -> Result<()>;

    fn registry(&self) -> &dyn ServiceRegistry;
}

/// A started emulator process, tracked until shutdown.
struct RunningEmulator {
    emulator: Emulator,
    port: u16,
    process: EmulatorProcess,
    log_task: JoinHandle<()>,
}

pub struct EmulatorController {
    project_dir: PathBuf,
    config: ProjectConfig,
    registry: EmulatorRegistry,
    ports: PortAllocator,
    running: Mutex<Vec<RunningEmulator>>,
}

impl EmulatorController {
    pub fn new(project_dir: PathBuf, config: ProjectConfig) -> Self {
        Self {
            project_dir,
            config,
            registry: EmulatorRegistry::new(),
            ports: PortAllocator::new(),
            running: Mutex::new(Vec::new()),
        }
    }

    /// Build a controller from `emulators.yaml` in `project_dir`.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config = config_loader::load(project_dir)?;
        Ok(Self::new(project_dir.to_path_buf(), config))
    }

    /// Configured emulators allowed by `options`, in start order.
    fn select(&self, options: &StartOptions) -> Result<Vec<(Emulator, &EmulatorConfig)>> {
        if let Some(only) = &options.only {
            if let Some(missing) = only
                .iter()
                .find(|e| !self.config.emulators.contains_key(*e))
            {
                return Err(EmulatorError::EmulatorNotConfigured(missing.to_string()));
            }
        }
        let selected: Vec<_> = self
            .config
            .emulators
            .iter()
            .filter(|(emulator, _)| options.includes(**emulator))
            .map(|(emulator, settings)| (*emulator, settings))
            .collect();
        if selected.is_empty() {
            return Err(EmulatorError::NoEmulators);
        }
        Ok(selected)
    }

    fn validate_functions_source(&self) -> Result<()> {
        let source = &self.config.functions.source;
        validate::functions_directory_exists(&self.project_dir, source)?;
        validate::package_json_is_valid(source, &self.project_dir.join(source), &self.project_dir)
    }

    async fn start_one(&self, emulator: Emulator, settings: &EmulatorConfig) -> Result<()> {
        if emulator == Emulator::Functions {
            self.validate_functions_source()?;
        }

        let host = settings.host();
        let port = self.ports.reserve(host, settings.port_for(emulator))?;
        let command = settings.render_command(host, port);
        tracing::info!("Starting {emulator} emulator at {host}:{port}");

        let (mut process, log_rx) = match emulator::start(&self.project_dir, emulator, &command).await
        {
            Ok(started) => started,
            Err(e) => {
                self.ports.release(port);
                return Err(e);
            }
        };
        let log_task = emulator::spawn_log_writer(
            emulator::log_path(&self.project_dir, emulator),
            emulator,
            log_rx,
        );

        let timeout = Duration::from_secs(self.config.startup_timeout_secs);
        let ready =
            emulator::wait_until_ready(emulator, &mut process.child, host, port, timeout).await;

        // Tracked even when not ready, so clean_shutdown reaps it.
        self.running.lock().await.push(RunningEmulator {
            emulator,
            port,
            process,
            log_task,
        });
        ready?;

        self.registry.register(emulator, EmulatorInfo::new(host, port));
        tracing::info!("{emulator} emulator ready at {host}:{port}");
        Ok(())
    }
}

#[async_trait]
impl ServiceController for EmulatorController {
    async fn start_all(&self, options: &StartOptions) -> Result<()> {
        let selected = self.select(options)?;
        let names: Vec<_> = selected.iter().map(|(e, _)| e.name()).collect();
        tracing::info!("Starting emulators: {}", names.join(", "));

        for (emulator, settings) in selected {
            self.start_one(emulator, settings).await?;
        }
        tracing::info!("All emulators started");
        Ok(())
    }

    async fn clean_shutdown(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.is_empty() {
            return Ok(());
        }
        tracing::info!("Shutting down emulators.");

        let mut first_error = None;
        while let Some(mut proc) = running.pop() {
            tracing::info!("Stopping {} emulator", proc.emulator);
            let stopped =
                emulator::stop(proc.emulator, &mut proc.process, emulator::STOP_TIMEOUT).await;
            if let Err(e) = stopped {
                tracing::warn!("{e}");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
            if tokio::time::timeout(LOG_FLUSH_TIMEOUT, &mut proc.log_task)
                .await
                .is_err()
            {
                proc.log_task.abort();
            }
            self.registry.remove(proc.emulator);
            self.ports.release(proc.port);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn registry(&self) -> &dyn ServiceRegistry {
        &self.registry
    }
}
