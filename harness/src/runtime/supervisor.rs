//! Emulator Process Supervision
//!
//! Launches the emulator binary with the resolved service set and owns the
//! child for the rest of the run. Supervision stops at the process level:
//! whether the services inside it answer requests is the prober's job.

use std::process::Stdio;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::sleep;

use crate::config::{EmulatorConfig, ServiceDescriptor};
use crate::error::{HarnessError, HarnessResult};

/// Grace period between SIGTERM and SIGKILL on stop
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Window in which an immediately-exiting child is treated as a launch failure
const EARLY_EXIT_WINDOW: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Stopped,
    Starting,
    Running,
}

/// Process supervision seam.
///
/// The lifecycle controller drives this trait so tests can substitute the
/// real emulator with a mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ProcessSupervisor: Send + Sync {
    /// Launch the backing process for the resolved descriptors.
    ///
    /// Blocking in the sense that the process has actually been spawned (or
    /// rejected) when this returns. Calling `start` on an already running
    /// supervisor is a no-op.
    async fn start(&mut self, descriptors: &[ServiceDescriptor]) -> HarnessResult<()>;

    /// Terminate the process, best-effort.
    ///
    /// Never raises; failures are logged so a teardown problem cannot mask
    /// the error that triggered the teardown. Idempotent: stopping an
    /// already-stopped supervisor is a no-op.
    async fn stop(&mut self);

    fn state(&self) -> SupervisorState;
}

pub struct EmulatorSupervisor {
    config: EmulatorConfig,
    child: Option<Child>,
    /// Keeps an ephemeral data directory alive for the child's lifetime
    scratch_dir: Option<TempDir>,
    state: SupervisorState,
}

impl EmulatorSupervisor {
    pub fn new(config: EmulatorConfig) -> Self {
        Self {
            config,
            child: None,
            scratch_dir: None,
            state: SupervisorState::Stopped,
        }
    }

    /// Check whether the child process is still alive
    pub fn is_running(&mut self) -> bool {
        if let Some(child) = &mut self.child {
            match child.try_wait() {
                Ok(None) => true,
                Ok(Some(status)) => {
                    tracing::warn!("⚠️ Emulator exited unexpectedly with status: {}", status);
                    self.child = None;
                    self.state = SupervisorState::Stopped;
                    false
                }
                Err(e) => {
                    tracing::warn!("⚠️ Error checking emulator status: {}", e);
                    self.child = None;
                    self.state = SupervisorState::Stopped;
                    false
                }
            }
        } else {
            false
        }
    }

    fn build_command(&mut self, descriptors: &[ServiceDescriptor]) -> HarnessResult<Command> {
        let mut cmd = Command::new(&self.config.emulator_binary);
        cmd.args(&self.config.emulator_args);

        // The emulator reads its service set from the environment, using the
        // same variable contract the harness itself accepts
        let services: Vec<&str> = descriptors.iter().map(|d| d.name.as_str()).collect();
        cmd.env("LOCALCLOUD_SERVICES", services.join(","));
        for descriptor in descriptors {
            cmd.env(
                format!("LOCALCLOUD_{}_PORT", descriptor.name.env_key()),
                descriptor.port.to_string(),
            );
        }
        cmd.env("LOCALCLOUD_HOST", &self.config.host);
        cmd.env("LOCALCLOUD_USE_TLS", if self.config.use_tls { "1" } else { "0" });
        cmd.env("LOCALCLOUD_ACCESS_KEY", &self.config.credentials.access_key);
        cmd.env("LOCALCLOUD_SECRET_KEY", &self.config.credentials.secret_key);
        cmd.env("LOCALCLOUD_LOG_LEVEL", &self.config.log_level);

        let data_dir = match &self.config.data_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                dir.clone()
            }
            None => {
                let scratch = TempDir::new()?;
                let path = scratch.path().to_path_buf();
                self.scratch_dir = Some(scratch);
                path
            }
        };
        cmd.env("LOCALCLOUD_DATA_DIR", &data_dir);

        cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).stdin(Stdio::null());
        cmd.kill_on_drop(true);

        Ok(cmd)
    }
}

#[async_trait::async_trait]
impl ProcessSupervisor for EmulatorSupervisor {
    async fn start(&mut self, descriptors: &[ServiceDescriptor]) -> HarnessResult<()> {
        if self.is_running() {
            tracing::debug!("Emulator already running, start is a no-op");
            return Ok(());
        }

        self.state = SupervisorState::Starting;
        tracing::info!(
            "🚀 Launching emulator '{}' for {} services",
            self.config.emulator_binary,
            descriptors.len()
        );

        let mut cmd = self.build_command(descriptors)?;
        let mut child = cmd.spawn().map_err(|e| {
            self.state = SupervisorState::Stopped;
            HarnessError::Startup {
                message: format!("failed to spawn '{}': {}", self.config.emulator_binary, e),
            }
        })?;

        forward_output(&mut child);

        // A child that dies within the early-exit window never had a chance
        // to serve anything: bad flags, port already bound, missing data dir
        sleep(EARLY_EXIT_WINDOW).await;
        if let Ok(Some(status)) = child.try_wait() {
            self.state = SupervisorState::Stopped;
            self.scratch_dir = None;
            return Err(HarnessError::Startup {
                message: format!("emulator exited during startup with status: {}", status),
            });
        }

        tracing::info!("✅ Emulator running (PID: {:?})", child.id());
        self.child = Some(child);
        self.state = SupervisorState::Running;
        Ok(())
    }

    async fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            tracing::debug!("Emulator already stopped, stop is a no-op");
            self.state = SupervisorState::Stopped;
            return;
        };

        tracing::info!("🛑 Stopping emulator");

        // Ask nicely first so the emulator can flush state
        #[cfg(unix)]
        if let Some(pid) = child.id() {
            use nix::sys::signal::{self, Signal};
            use nix::unistd::Pid;
            if let Err(e) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                tracing::warn!("⚠️ Failed to send SIGTERM to emulator: {}", e);
            }
        }

        match tokio::time::timeout(STOP_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!("✅ Emulator terminated gracefully ({})", status);
            }
            Ok(Err(e)) => {
                tracing::warn!("⚠️ Error waiting for emulator exit: {}", e);
            }
            Err(_) => {
                tracing::warn!("🔨 Emulator did not stop within {:?}, force killing", STOP_GRACE);
                if let Err(e) = child.kill().await {
                    tracing::error!("❌ Failed to kill emulator: {}", e);
                }
            }
        }

        self.scratch_dir = None;
        self.state = SupervisorState::Stopped;
    }

    fn state(&self) -> SupervisorState {
        self.state
    }
}

impl Drop for EmulatorSupervisor {
    fn drop(&mut self) {
        // Emergency cleanup - never leave an emulator process behind
        if let Some(child) = self.child.as_mut() {
            tracing::warn!("🚨 Emergency cleanup: force killing emulator");
            let _ = child.start_kill();
        }
    }
}

/// Forward child stdout/stderr lines to tracing, for diagnostics only.
///
/// Draining the pipes also prevents the child from blocking when they fill.
fn forward_output(child: &mut Child) {
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(target: "emulator", "{}", line);
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(target: "emulator", "{}", line);
            }
        });
    }
}
