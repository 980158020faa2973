//! Environment Lifecycle Control
//!
//! Drives one emulator environment through
//! `NotStarted → Resolving → Launching → AwaitingReady → Ready → TearingDown → Stopped`.
//! However many test bodies race to trigger startup, exactly one performs
//! the sequence; the rest block on the same completion and observe the
//! identical outcome. Every failure path runs teardown so no emulator
//! process is left dangling.

use std::sync::{Arc, Mutex as StdMutex, OnceLock, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OnceCell};

use crate::config::{Credentials, EmulatorConfig, ServiceDescriptor, ServiceName, resolve};
use crate::error::{HarnessError, HarnessResult};
use crate::runtime::prober::{ReadinessProber, ReadinessReport};
use crate::runtime::supervisor::{EmulatorSupervisor, ProcessSupervisor};

/// Fine-grained controller phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    NotStarted,
    Resolving,
    Launching,
    AwaitingReady,
    Ready,
    Degraded,
    TearingDown,
    Stopped,
}

/// Coarse environment state as observed by test bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentState {
    Stopped,
    Starting,
    Ready,
    Degraded,
}

/// The one running environment of a test run.
///
/// Created by the controller when startup succeeds; test bodies and the
/// client factory only ever read it.
#[derive(Debug, Clone)]
pub struct EmulatorEnvironment {
    pub descriptors: Vec<ServiceDescriptor>,
    pub credentials: Credentials,
    pub readiness: ReadinessReport,
    pub started_at: DateTime<Utc>,
}

impl EmulatorEnvironment {
    pub fn descriptor(&self, name: ServiceName) -> Option<&ServiceDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }
}

/// Startup failures are shared verbatim with every waiting caller.
pub type SharedFailure = Arc<HarnessError>;

type ReadyHook = Box<dyn Fn(&EmulatorEnvironment) + Send + Sync>;
type TeardownHook = Box<dyn Fn() + Send + Sync>;

pub struct LifecycleController {
    config: EmulatorConfig,
    supervisor: Mutex<Box<dyn ProcessSupervisor>>,
    outcome: OnceCell<Result<Arc<EmulatorEnvironment>, SharedFailure>>,
    phase: RwLock<LifecyclePhase>,
    on_ready: StdMutex<Vec<ReadyHook>>,
    on_teardown: StdMutex<Vec<TeardownHook>>,
}

impl LifecycleController {
    pub fn new(config: EmulatorConfig) -> Self {
        let supervisor = EmulatorSupervisor::new(config.clone());
        Self::with_supervisor(config, Box::new(supervisor))
    }

    /// Build a controller around a custom supervisor (used by tests).
    pub fn with_supervisor(config: EmulatorConfig, supervisor: Box<dyn ProcessSupervisor>) -> Self {
        Self {
            config,
            supervisor: Mutex::new(supervisor),
            outcome: OnceCell::new(),
            phase: RwLock::new(LifecyclePhase::NotStarted),
            on_ready: StdMutex::new(Vec::new()),
            on_teardown: StdMutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    pub fn phase(&self) -> LifecyclePhase {
        *self.phase.read().expect("lifecycle phase lock poisoned")
    }

    /// Coarse state following `Stopped → Starting → {Ready|Degraded} → Stopped`.
    pub fn environment_state(&self) -> EnvironmentState {
        match self.phase() {
            LifecyclePhase::NotStarted | LifecyclePhase::TearingDown | LifecyclePhase::Stopped => {
                EnvironmentState::Stopped
            }
            LifecyclePhase::Resolving | LifecyclePhase::Launching | LifecyclePhase::AwaitingReady => {
                EnvironmentState::Starting
            }
            LifecyclePhase::Ready => EnvironmentState::Ready,
            LifecyclePhase::Degraded => EnvironmentState::Degraded,
        }
    }

    fn set_phase(&self, phase: LifecyclePhase) {
        *self.phase.write().expect("lifecycle phase lock poisoned") = phase;
        tracing::debug!("Lifecycle phase: {:?}", phase);
    }

    /// Register a hook that runs once the environment reaches Ready.
    pub fn on_ready<F>(&self, hook: F)
    where
        F: Fn(&EmulatorEnvironment) + Send + Sync + 'static,
    {
        self.on_ready
            .lock()
            .expect("lifecycle hooks lock poisoned")
            .push(Box::new(hook));
    }

    /// Register a hook that runs during teardown, before the emulator stops.
    pub fn on_teardown<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_teardown
            .lock()
            .expect("lifecycle hooks lock poisoned")
            .push(Box::new(hook));
    }

    /// Start the environment, or wait for the startup already in flight.
    ///
    /// The first caller performs resolve → launch → probe; every concurrent
    /// and subsequent caller receives the same outcome, success or failure.
    /// The startup sequence never runs twice.
    pub async fn ensure_ready(&self) -> Result<Arc<EmulatorEnvironment>, SharedFailure> {
        self.outcome.get_or_init(|| self.start_sequence()).await.clone()
    }

    async fn start_sequence(&self) -> Result<Arc<EmulatorEnvironment>, SharedFailure> {
        match self.run_startup().await {
            Ok(environment) => {
                let environment = Arc::new(environment);
                self.set_phase(LifecyclePhase::Ready);
                tracing::info!(
                    "✅ Environment ready: {} services reachable",
                    environment.descriptors.len()
                );

                let hooks = self.on_ready.lock().expect("lifecycle hooks lock poisoned");
                for hook in hooks.iter() {
                    hook(&environment);
                }

                Ok(environment)
            }
            Err(err) => {
                tracing::error!("❌ Environment startup failed: {}", err);
                // Short-circuit to Stopped with cleanup - never leave a
                // dangling emulator process behind a failed startup
                self.force_stop().await;
                self.set_phase(LifecyclePhase::Stopped);
                Err(Arc::new(err))
            }
        }
    }

    async fn run_startup(&self) -> HarnessResult<EmulatorEnvironment> {
        self.set_phase(LifecyclePhase::Resolving);
        tracing::info!("🔍 Resolving service endpoints");
        let descriptors = resolve(&self.config)?;

        #[cfg(unix)]
        if self.config.preclean {
            crate::runtime::cleanup::CleanupManager::for_run(&self.config, &descriptors)
                .cleanup_before_run()
                .await;
        }

        self.set_phase(LifecyclePhase::Launching);
        {
            let mut supervisor = self.supervisor.lock().await;
            supervisor.start(&descriptors).await?;
        }

        self.set_phase(LifecyclePhase::AwaitingReady);
        let prober = ReadinessProber::new(self.config.probe_interval);
        let readiness = match prober.await_ready(&descriptors, self.config.readiness_timeout).await {
            Ok(report) => report,
            Err(err) => {
                // Some services may have answered while others never did;
                // record the degraded state before teardown for diagnostics
                if let HarnessError::ReadinessTimeout { results, .. } = &err {
                    if results.iter().any(|r| r.reachable) {
                        self.set_phase(LifecyclePhase::Degraded);
                    }
                }
                return Err(err);
            }
        };

        Ok(EmulatorEnvironment {
            descriptors,
            credentials: self.config.credentials.clone(),
            readiness,
            started_at: Utc::now(),
        })
    }

    /// Tear the environment down. Safe to call from any phase and any exit
    /// path; calling it twice is a no-op.
    pub async fn shutdown(&self) {
        let phase = self.phase();
        if phase == LifecyclePhase::Stopped {
            tracing::debug!("Environment already stopped");
            return;
        }
        let was_ready = phase == LifecyclePhase::Ready;

        self.set_phase(LifecyclePhase::TearingDown);
        tracing::info!("🛑 Tearing down emulator environment");

        if was_ready {
            // Teardown hooks run first so they can still reach the emulator
            let hooks = self.on_teardown.lock().expect("lifecycle hooks lock poisoned");
            for hook in hooks.iter() {
                hook();
            }
        }

        self.force_stop().await;
        self.set_phase(LifecyclePhase::Stopped);
    }

    async fn force_stop(&self) {
        let mut supervisor = self.supervisor.lock().await;
        supervisor.stop().await;
    }

    /// The running environment, for client construction.
    ///
    /// Fails with `NotReady` before startup completes and after teardown.
    pub fn environment(&self) -> HarnessResult<Arc<EmulatorEnvironment>> {
        match self.outcome.get() {
            Some(Ok(environment)) if self.phase() == LifecyclePhase::Ready => Ok(environment.clone()),
            Some(Ok(_)) => Err(HarnessError::NotReady {
                message: format!("environment is {:?}", self.phase()),
            }),
            Some(Err(err)) => Err(HarnessError::NotReady {
                message: format!("environment startup failed: {}", err),
            }),
            None => Err(HarnessError::NotReady {
                message: "ensure_ready() has not completed".to_string(),
            }),
        }
    }
}

static GLOBAL: OnceLock<Arc<LifecycleController>> = OnceLock::new();

/// Install the process-wide controller for this test run. The first call
/// wins; later calls return the already-installed controller.
pub fn install_global(config: EmulatorConfig) -> Arc<LifecycleController> {
    GLOBAL
        .get_or_init(|| Arc::new(LifecycleController::new(config)))
        .clone()
}

/// The process-wide controller, if one has been installed.
pub fn global() -> Option<Arc<LifecycleController>> {
    GLOBAL.get().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceName;
    use crate::runtime::supervisor::MockProcessSupervisor;
    use assert_matches::assert_matches;
    use std::net::TcpListener;
    use std::time::Duration;

    fn listener_backed_config() -> (TcpListener, EmulatorConfig) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let config = EmulatorConfig::builder()
            .services([ServiceName::Queue])
            .port(ServiceName::Queue, port)
            .readiness_timeout(Duration::from_secs(2))
            .probe_interval(Duration::from_millis(10))
            .build();
        (listener, config)
    }

    fn unreachable_config() -> EmulatorConfig {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        EmulatorConfig::builder()
            .services([ServiceName::Queue])
            .port(ServiceName::Queue, port)
            .readiness_timeout(Duration::from_millis(200))
            .probe_interval(Duration::from_millis(20))
            .build()
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_startup_sequence() {
        let (_listener, config) = listener_backed_config();

        let mut supervisor = MockProcessSupervisor::new();
        // The whole point: N racing callers, exactly one launch
        supervisor.expect_start().times(1).returning(|_| Ok(()));
        supervisor.expect_stop().returning(|| ());

        let controller = Arc::new(LifecycleController::with_supervisor(config, Box::new(supervisor)));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let controller = controller.clone();
            handles.push(tokio::spawn(async move { controller.ensure_ready().await }));
        }

        let mut environments = Vec::new();
        for handle in handles {
            environments.push(handle.await.unwrap().unwrap());
        }

        // Every caller observes the same environment instance
        for env in &environments[1..] {
            assert!(Arc::ptr_eq(&environments[0], env));
        }
        assert_eq!(controller.phase(), LifecyclePhase::Ready);
        assert_eq!(controller.environment_state(), EnvironmentState::Ready);

        controller.shutdown().await;
        assert_eq!(controller.phase(), LifecyclePhase::Stopped);
    }

    #[tokio::test]
    async fn startup_failure_is_shared_and_stops_the_environment() {
        let (_listener, config) = listener_backed_config();

        let mut supervisor = MockProcessSupervisor::new();
        supervisor.expect_start().times(1).returning(|_| {
            Err(HarnessError::Startup {
                message: "port already bound".to_string(),
            })
        });
        supervisor.expect_stop().times(1).returning(|| ());

        let controller = Arc::new(LifecycleController::with_supervisor(config, Box::new(supervisor)));

        let first = controller.ensure_ready().await;
        let second = controller.ensure_ready().await;

        let first_err = first.unwrap_err();
        let second_err = second.unwrap_err();
        assert!(Arc::ptr_eq(&first_err, &second_err));
        assert_matches!(&*first_err, HarnessError::Startup { .. });
        assert_eq!(controller.phase(), LifecyclePhase::Stopped);
    }

    #[tokio::test]
    async fn readiness_timeout_tears_down_and_is_shared() {
        let config = unreachable_config();

        let mut supervisor = MockProcessSupervisor::new();
        supervisor.expect_start().times(1).returning(|_| Ok(()));
        supervisor.expect_stop().times(1).returning(|| ());

        let controller = Arc::new(LifecycleController::with_supervisor(config, Box::new(supervisor)));

        let err = controller.ensure_ready().await.unwrap_err();
        assert_matches!(&*err, HarnessError::ReadinessTimeout { results, .. } => {
            assert_eq!(results.len(), 1);
            assert!(!results[0].reachable);
        });
        assert_eq!(controller.phase(), LifecyclePhase::Stopped);

        // Failure outcome is cached, not retried
        let again = controller.ensure_ready().await.unwrap_err();
        assert!(Arc::ptr_eq(&err, &again));
    }

    #[tokio::test]
    async fn environment_is_not_ready_before_startup() {
        let (_listener, config) = listener_backed_config();
        let supervisor = MockProcessSupervisor::new();
        let controller = LifecycleController::with_supervisor(config, Box::new(supervisor));

        assert_matches!(controller.environment(), Err(HarnessError::NotReady { .. }));
        assert_eq!(controller.environment_state(), EnvironmentState::Stopped);
    }

    #[tokio::test]
    async fn environment_is_not_ready_after_shutdown() {
        let (_listener, config) = listener_backed_config();

        let mut supervisor = MockProcessSupervisor::new();
        supervisor.expect_start().times(1).returning(|_| Ok(()));
        supervisor.expect_stop().returning(|| ());

        let controller = LifecycleController::with_supervisor(config, Box::new(supervisor));
        controller.ensure_ready().await.unwrap();
        assert!(controller.environment().is_ok());

        controller.shutdown().await;
        assert_matches!(controller.environment(), Err(HarnessError::NotReady { .. }));

        // Second shutdown is a no-op
        controller.shutdown().await;
        assert_eq!(controller.phase(), LifecyclePhase::Stopped);
    }

    #[tokio::test]
    async fn hooks_run_on_ready_and_teardown() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let (_listener, config) = listener_backed_config();

        let mut supervisor = MockProcessSupervisor::new();
        supervisor.expect_start().times(1).returning(|_| Ok(()));
        supervisor.expect_stop().returning(|| ());

        let controller = LifecycleController::with_supervisor(config, Box::new(supervisor));

        let ready_calls = Arc::new(AtomicU32::new(0));
        let teardown_calls = Arc::new(AtomicU32::new(0));

        let counter = ready_calls.clone();
        controller.on_ready(move |env| {
            assert_eq!(env.descriptors.len(), 1);
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = teardown_calls.clone();
        controller.on_teardown(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        controller.ensure_ready().await.unwrap();
        assert_eq!(ready_calls.load(Ordering::SeqCst), 1);
        assert_eq!(teardown_calls.load(Ordering::SeqCst), 0);

        controller.shutdown().await;
        controller.shutdown().await;
        assert_eq!(teardown_calls.load(Ordering::SeqCst), 1);
    }
}
