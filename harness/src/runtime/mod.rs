//! Runtime Management
//!
//! This module handles emulator process supervision, readiness probing and
//! environment lifecycle during test execution.

pub mod lifecycle;
pub mod prober;
pub mod supervisor;

#[cfg(unix)]
pub mod cleanup;

// Re-export main types
pub use lifecycle::{
    EmulatorEnvironment, EnvironmentState, LifecycleController, LifecyclePhase, SharedFailure, global, install_global,
};
pub use prober::{ReadinessProber, ReadinessReport, ReadinessResult};
pub use supervisor::{EmulatorSupervisor, ProcessSupervisor, SupervisorState};

#[cfg(unix)]
pub use cleanup::CleanupManager;
