//! Start emulators, run a script against them, and always shut them down.

use tokio::io::AsyncWrite;

use crate::error::Result;
use crate::models::{ProcessOutcome, StartOptions};

use super::controller::ServiceController;
use super::environment;
use super::supervisor::Supervisor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    ServicesStarting,
    Running,
    ServicesStopping,
    Done,
}

pub struct Orchestrator<'a, C: ServiceController + ?Sized> {
    controller: &'a C,
    supervisor: Supervisor,
}

impl<'a, C: ServiceController + ?Sized> Orchestrator<'a, C> {
    pub fn new(controller: &'a C) -> Self {
        Self {
            controller,
            supervisor: Supervisor::new(),
        }
    }

    pub fn with_supervisor(mut self, supervisor: Supervisor) -> Self {
        self.supervisor = supervisor;
        self
    }

    /// Run `script` with emulators up, forwarding its output to this process.
    ///
    /// A nonzero script exit is returned as an outcome, not an error.
    pub async fn execute(&self, script: &str, options: &StartOptions) -> Result<ProcessOutcome> {
        self.execute_with_output(script, options, tokio::io::stdout(), tokio::io::stderr())
            .await
    }

    pub async fn execute_with_output<O, E>(
        &self,
        script: &str,
        options: &StartOptions,
        stdout: O,
        stderr: E,
    ) -> Result<ProcessOutcome>
    where
        O: AsyncWrite + Unpin + Send + 'static,
        E: AsyncWrite + Unpin + Send + 'static,
    {
        let run = self.start_and_run(script, options, stdout, stderr).await;
        if let Err(e) = &run {
            tracing::debug!(script, error = %e, "error in emulators:exec");
        }

        enter(Phase::ServicesStopping);
        let shutdown = self.controller.clean_shutdown().await;
        enter(Phase::Done);

        match (run, shutdown) {
            (Ok(outcome), Ok(())) => Ok(outcome),
            (Ok(_), Err(shutdown_error)) => Err(shutdown_error),
            (Err(run_error), Ok(())) => Err(run_error),
            (Err(run_error), Err(shutdown_error)) => {
                tracing::warn!("{shutdown_error}");
                Err(run_error)
            }
        }
    }

    async fn start_and_run<O, E>(
        &self,
        script: &str,
        options: &StartOptions,
        stdout: O,
        stderr: E,
    ) -> Result<ProcessOutcome>
    where
        O: AsyncWrite + Unpin + Send + 'static,
        E: AsyncWrite + Unpin + Send + 'static,
    {
        enter(Phase::ServicesStarting);
        self.controller.start_all(options).await?;

        enter(Phase::Running);
        let env = environment::build(self.controller.registry());
        self.supervisor
            .run_with_output(script, &env, stdout, stderr)
            .await
    }
}

fn enter(phase: Phase) {
    tracing::debug!(?phase, "emulators:exec");
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::io::{duplex, sink, AsyncReadExt};

    use crate::error::EmulatorError;
    use crate::models::{Emulator, EmulatorInfo};
    use crate::services::registry::{EmulatorRegistry, ServiceRegistry};

    #[derive(Default)]
    struct FakeController {
        registry: EmulatorRegistry,
        start_error: Option<String>,
        fail_shutdown: bool,
        starts: AtomicUsize,
        shutdowns: AtomicUsize,
    }

    #[async_trait]
    impl ServiceController for FakeController {
        async fn start_all(&self, _options: &StartOptions) -> Result<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if let Some(message) = &self.start_error {
                return Err(EmulatorError::PortAllocation(message.clone()));
            }
            self.registry
                .register(Emulator::Firestore, EmulatorInfo::new("127.0.0.1", 8080));
            Ok(())
        }

        async fn clean_shutdown(&self) -> Result<()> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            self.registry.clear();
            if self.fail_shutdown {
                return Err(EmulatorError::Shutdown("boom".into()));
            }
            Ok(())
        }

        fn registry(&self) -> &dyn ServiceRegistry {
            &self.registry
        }
    }

    impl FakeController {
        fn shutdowns(&self) -> usize {
            self.shutdowns.load(Ordering::SeqCst)
        }
    }

    fn supervisor() -> Supervisor {
        Supervisor::new().with_grace_period(Duration::from_secs(2))
    }

    async fn execute(controller: &FakeController, script: &str) -> Result<ProcessOutcome> {
        Orchestrator::new(controller)
            .with_supervisor(supervisor())
            .execute_with_output(script, &StartOptions::default(), sink(), sink())
            .await
    }

    #[tokio::test]
    async fn success_sees_emulator_env_and_shuts_down_once() {
        let controller = FakeController::default();
        let (out_w, mut out_r) = duplex(4096);
        let outcome = Orchestrator::new(&controller)
            .with_supervisor(supervisor())
            .execute_with_output(
                r#"printf '%s' "$FIRESTORE_EMULATOR_HOST""#,
                &StartOptions::default(),
                out_w,
                sink(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, ProcessOutcome::Success);

        let mut out = String::new();
        out_r.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "127.0.0.1:8080");
        assert_eq!(controller.shutdowns(), 1);
        assert!(controller.registry.running().is_empty());
    }

    #[tokio::test]
    async fn nonzero_exit_does_not_fail_the_run() {
        let controller = FakeController::default();
        let outcome = execute(&controller, "exit 1").await.unwrap();
        assert_eq!(outcome, ProcessOutcome::NonZeroExit(1));
        assert_eq!(controller.shutdowns(), 1);
    }

    #[tokio::test]
    async fn signal_fails_after_shutdown() {
        let controller = FakeController::default();
        let err = execute(&controller, "kill -TERM $$").await.unwrap_err();
        assert!(matches!(
            err,
            EmulatorError::ScriptSignaled { ref signal, .. } if signal == "SIGTERM"
        ));
        assert_eq!(controller.shutdowns(), 1);
    }

    #[tokio::test]
    async fn spawn_error_fails_after_shutdown() {
        let controller = FakeController::default();
        let err = Orchestrator::new(&controller)
            .with_supervisor(supervisor().with_shell("/nonexistent/bin/sh"))
            .execute_with_output("true", &StartOptions::default(), sink(), sink())
            .await
            .unwrap_err();
        assert!(matches!(err, EmulatorError::ScriptSpawn { .. }));
        assert_eq!(controller.shutdowns(), 1);
    }

    #[tokio::test]
    async fn startup_failure_skips_script_but_still_shuts_down() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let controller = FakeController {
            start_error: Some("port already in use".into()),
            ..Default::default()
        };
        let err = execute(&controller, &format!(": > {}", marker.display()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("port already in use"));
        assert!(!marker.exists());
        assert_eq!(controller.starts.load(Ordering::SeqCst), 1);
        assert_eq!(controller.shutdowns(), 1);
    }

    #[tokio::test]
    async fn shutdown_failure_surfaces_when_nothing_else_failed() {
        let controller = FakeController {
            fail_shutdown: true,
            ..Default::default()
        };
        let err = execute(&controller, "exit 0").await.unwrap_err();
        assert!(matches!(err, EmulatorError::Shutdown(_)));
    }

    #[tokio::test]
    async fn script_error_takes_priority_over_shutdown_failure() {
        let controller = FakeController {
            fail_shutdown: true,
            ..Default::default()
        };
        let err = execute(&controller, "kill -KILL $$").await.unwrap_err();
        assert!(matches!(err, EmulatorError::ScriptSignaled { .. }));
        assert_eq!(controller.shutdowns(), 1);
    }
}
