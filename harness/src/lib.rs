//! Emulator Test Harness
//!
//! Lifecycle orchestration for a multi-service local cloud emulator.
//!
//! The harness resolves service endpoints from configuration, launches the
//! emulator process, waits until every service actually answers requests,
//! and hands out clients bound to the local endpoints. Teardown runs on
//! every exit path so no emulator process outlives a test run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use harness::*;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! // Configure the emulator (defaults cover the common case)
//! let config = EmulatorConfig::builder()
//!     .services([ServiceName::Queue, ServiceName::Stream])
//!     .readiness_timeout(std::time::Duration::from_secs(30))
//!     .build();
//!
//! // Start the environment and wait until every service answers
//! let controller = Arc::new(LifecycleController::new(config));
//! let _env = controller.ensure_ready().await.map_err(|e| e.to_string())?;
//!
//! // Obtain clients bound to the local endpoints
//! let factory = ClientFactory::new(controller.clone());
//! let queues = factory.queue()?;
//! queues.create_queue("q1").await?;
//!
//! // Absorb propagation delay with policy-driven retry instead of sleeps
//! let policy = RetryPolicy::default();
//! let found = retry(&policy, || {
//!     let queues = queues.clone();
//!     async move {
//!         let names = queues.list_queues().await?;
//!         if names.iter().any(|q| q.name == "q1") { Ok(()) } else {
//!             Err(HarnessError::NotReady { message: "queue not visible yet".into() })
//!         }
//!     }
//! }).await;
//! assert!(found.is_ok());
//!
//! controller.shutdown().await;
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod clients;
pub mod config;
pub mod error;
pub mod logging;
pub mod retry;
pub mod runtime;

// Main interfaces - re-exported at crate root for convenience
pub use config::{Credentials, EmulatorConfig, EmulatorConfigBuilder, Protocol, ServiceDescriptor, ServiceName};
pub use error::{HarnessError, HarnessResult};
pub use retry::{RetryExhausted, RetryPolicy, retry};
pub use runtime::{EmulatorEnvironment, EnvironmentState, LifecycleController, LifecyclePhase};

// Supporting types
pub use clients::{ClientFactory, ClientHandle, FunctionClient, ObjectStoreClient, QueueClient, StreamClient};
pub use config::resolve;
pub use runtime::{EmulatorSupervisor, ProcessSupervisor, ReadinessProber, ReadinessReport, ReadinessResult, SupervisorState};

#[cfg(unix)]
pub use runtime::CleanupManager;
