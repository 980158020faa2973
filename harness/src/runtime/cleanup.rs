//! Stale Process and Port Cleanup
//!
//! A crashed test run can leave an emulator process holding the very ports
//! the next run needs. This module kills stale emulator processes and frees
//! the resolved ports before a suite starts. Cleanup is best-effort and
//! never fails the run; anything it cannot fix is logged and left for the
//! supervisor's startup error to surface.

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{EmulatorConfig, ServiceDescriptor};

pub struct CleanupManager {
    /// Ports that should be free before the emulator launches
    target_ports: Vec<u16>,
    /// Process names that count as stale emulator instances
    target_processes: Vec<String>,
}

impl CleanupManager {
    pub fn new(processes: Vec<String>, ports: Vec<u16>) -> Self {
        Self {
            target_ports: ports,
            target_processes: processes,
        }
    }

    /// Build a cleanup manager for one run: the configured emulator binary
    /// name plus every resolved service port.
    pub fn for_run(config: &EmulatorConfig, descriptors: &[ServiceDescriptor]) -> Self {
        let binary_name = Path::new(&config.emulator_binary)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| config.emulator_binary.clone());

        Self::new(vec![binary_name], descriptors.iter().map(|d| d.port).collect())
    }

    /// Kill stale processes and free target ports before a run starts.
    pub async fn cleanup_before_run(&self) {
        info!("🧹 Cleaning up stale emulator state");

        self.kill_target_processes().await;
        self.free_target_ports().await;

        // Give the kernel a moment to release sockets
        sleep(Duration::from_millis(500)).await;

        self.verify_cleanup();
    }

    async fn kill_target_processes(&self) {
        for process_name in &self.target_processes {
            match self.find_processes_by_name(process_name) {
                Ok(pids) if pids.is_empty() => {
                    debug!("✅ No stale '{}' processes found", process_name);
                }
                Ok(pids) => {
                    let mut killed = 0;
                    for pid in pids {
                        if pid == std::process::id() as i32 {
                            continue;
                        }
                        match self.kill_process_gracefully(pid).await {
                            Ok(()) => killed += 1,
                            Err(e) => warn!("⚠️ Failed to kill stale process {}: {}", pid, e),
                        }
                    }
                    if killed > 0 {
                        info!("🔪 Killed {} stale '{}' processes", killed, process_name);
                    }
                }
                Err(e) => warn!("⚠️ Failed to look up '{}' processes: {}", process_name, e),
            }
        }
    }

    fn find_processes_by_name(&self, process_name: &str) -> Result<Vec<i32>, String> {
        let output = Command::new("pgrep")
            .arg("-f")
            .arg(process_name)
            .output()
            .map_err(|e| e.to_string())?;

        // pgrep returns non-zero when nothing matched - that is the good case
        if !output.status.success() {
            return Ok(vec![]);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout
            .lines()
            .filter_map(|line| line.trim().parse::<i32>().ok())
            .collect())
    }

    /// SIGTERM first, escalate to SIGKILL if the process lingers
    async fn kill_process_gracefully(&self, pid: i32) -> Result<(), String> {
        let nix_pid = Pid::from_raw(pid);

        match signal::kill(nix_pid, Signal::SIGTERM) {
            Ok(()) => {
                debug!("📤 Sent SIGTERM to process {}", pid);
                for _ in 0..20 {
                    if !self.process_exists(pid) {
                        return Ok(());
                    }
                    sleep(Duration::from_millis(100)).await;
                }

                warn!("🔨 Process {} ignored SIGTERM, using SIGKILL", pid);
                signal::kill(nix_pid, Signal::SIGKILL).map_err(|e| e.to_string())?;
                sleep(Duration::from_millis(200)).await;

                if self.process_exists(pid) {
                    return Err(format!("process {} survived SIGKILL", pid));
                }
                Ok(())
            }
            Err(nix::errno::Errno::ESRCH) => Ok(()),
            Err(e) => Err(format!("failed to signal process {}: {}", pid, e)),
        }
    }

    fn process_exists(&self, pid: i32) -> bool {
        signal::kill(Pid::from_raw(pid), None).is_ok()
    }

    async fn free_target_ports(&self) {
        for &port in &self.target_ports {
            match self.find_processes_using_port(port) {
                Ok(pids) if pids.is_empty() => {
                    debug!("✅ Port {} already free", port);
                }
                Ok(pids) => {
                    for pid in pids {
                        if pid == std::process::id() as i32 {
                            continue;
                        }
                        if let Err(e) = self.kill_process_gracefully(pid).await {
                            warn!("⚠️ Failed to free port {} from process {}: {}", port, pid, e);
                        }
                    }
                    info!("🔓 Freed port {}", port);
                }
                Err(e) => warn!("⚠️ Failed to inspect port {}: {}", port, e),
            }
        }
    }

    fn find_processes_using_port(&self, port: u16) -> Result<Vec<i32>, String> {
        let output = Command::new("lsof")
            .arg("-ti")
            .arg(format!(":{}", port))
            .output()
            .map_err(|e| e.to_string())?;

        // lsof returns non-zero when the port is unused - that is the good case
        if !output.status.success() {
            return Ok(vec![]);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout
            .lines()
            .filter_map(|line| line.trim().parse::<i32>().ok())
            .collect())
    }

    fn verify_cleanup(&self) {
        let mut issues = Vec::new();

        for &port in &self.target_ports {
            if let Ok(pids) = self.find_processes_using_port(port) {
                if !pids.is_empty() {
                    issues.push(format!("port {} still in use by {:?}", port, pids));
                }
            }
        }

        if issues.is_empty() {
            debug!("✅ Cleanup verification passed");
        } else {
            // Not fatal: the supervisor will produce the real startup error
            for issue in &issues {
                warn!("⚠️ Cleanup left an issue behind: {}", issue);
            }
        }
    }
}
