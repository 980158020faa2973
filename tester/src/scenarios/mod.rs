//! Test Scenarios
//!
//! Clean, short scenario names for end-to-end testing against the emulator

pub mod core;
pub mod functions;
pub mod storage;

use std::sync::Arc;

use harness::{ClientFactory, EmulatorEnvironment, RetryPolicy};

/// Everything a scenario needs: clients, the retry policy, and the
/// read-only view of the running environment.
pub struct ScenarioContext {
    pub factory: ClientFactory,
    pub policy: RetryPolicy,
    pub environment: Arc<EmulatorEnvironment>,
}

pub struct TestScenarios {
    context: ScenarioContext,
}

impl TestScenarios {
    pub fn new(context: ScenarioContext) -> Self {
        Self { context }
    }

    /// Run a specific scenario by name
    pub async fn run_scenario(&self, name: &str) -> anyhow::Result<()> {
        let ctx = &self.context;

        match name {
            // Core functionality
            "smoke" => core::smoke(ctx).await,
            "queue" => core::queue(ctx).await,
            "stream" => core::stream(ctx).await,

            // Storage and function execution
            "bucket" => storage::bucket(ctx).await,
            "function" => functions::function(ctx).await,

            // Run the core suite
            "core" => {
                core::smoke(ctx).await?;
                core::queue(ctx).await?;
                core::stream(ctx).await
            }

            // Run everything
            "all" => {
                tracing::info!("🧪 Running FULL scenario suite");

                core::smoke(ctx).await?;
                core::queue(ctx).await?;
                core::stream(ctx).await?;
                storage::bucket(ctx).await?;
                functions::function(ctx).await?;

                tracing::info!("🏆 ALL scenarios COMPLETED successfully!");
                Ok(())
            }

            _ => anyhow::bail!(
                "Unknown scenario: '{}'. Available: {}",
                name,
                Self::available_scenarios().join(", ")
            ),
        }
    }

    /// Get list of available scenarios
    pub fn available_scenarios() -> Vec<&'static str> {
        vec![
            // Individual scenarios
            "smoke", "queue", "stream", // Core functionality
            "bucket", "function", // Storage and function execution
            // Scenario suites
            "core", // Core suite
            "all",  // Complete suite
        ]
    }
}
