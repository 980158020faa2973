//! E2E Scenario Runner
//!
//! End-to-end test driver for the localcloud emulator that:
//! - Starts the emulator and blocks until every service answers
//! - Runs named scenarios against the emulated services
//! - Replaces fixed sleeps with policy-driven retry throughout
//! - Tears the emulator down on every exit path

use anyhow::Context;
use clap::Parser;
use std::time::Duration;
use tokio::time::timeout;

use harness::{ClientFactory, EmulatorConfig};

mod scenarios;

use scenarios::{ScenarioContext, TestScenarios};

#[derive(Parser)]
#[command(name = "tester")]
#[command(about = "E2E scenario driver for the localcloud emulator")]
struct Args {
    /// Scenario to run
    #[arg(long, default_value = "smoke")]
    scenario: String,

    /// Suite timeout in seconds
    #[arg(long, default_value = "120")]
    timeout_secs: u64,

    /// Keep the emulator running after the scenario completes (for debugging)
    #[arg(long)]
    keep_running: bool,

    /// Enable verbose tracing output
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    harness::logging::init(args.verbose);

    tracing::info!("🧪 Starting emulator scenario driver");
    tracing::info!("Scenario: {}, Timeout: {}s", args.scenario, args.timeout_secs);

    let config = EmulatorConfig::from_env().context("invalid emulator configuration")?;
    let controller = harness::runtime::install_global(config);

    let environment = match controller.ensure_ready().await {
        Ok(environment) => environment,
        Err(e) => {
            // The controller already tore the emulator down on this path
            anyhow::bail!("environment failed to start: {e}");
        }
    };

    let context = ScenarioContext {
        factory: ClientFactory::new(controller.clone()),
        policy: controller.config().retry_policy.clone(),
        environment,
    };
    let scenarios = TestScenarios::new(context);

    let result = timeout(
        Duration::from_secs(args.timeout_secs),
        scenarios.run_scenario(&args.scenario),
    )
    .await;

    match &result {
        Ok(Ok(())) => {
            tracing::info!("✅ Scenario '{}' completed successfully", args.scenario);

            if args.keep_running {
                tracing::info!("🔄 Keeping emulator running (--keep-running flag set)");
                tracing::info!("Press Ctrl+C to stop");
                tokio::signal::ctrl_c().await?;
            }
        }
        Ok(Err(e)) => {
            tracing::error!("❌ Scenario '{}' failed: {}", args.scenario, e);
        }
        Err(_) => {
            tracing::error!(
                "⏰ Scenario '{}' timed out after {}s",
                args.scenario,
                args.timeout_secs
            );
        }
    }

    // Teardown runs whatever happened above so no emulator process leaks
    tracing::info!("🛑 Shutting down emulator environment");
    controller.shutdown().await;

    match result {
        Ok(Ok(())) => {
            tracing::info!("🏁 Scenario run completed");
            Ok(())
        }
        Ok(Err(e)) => Err(e),
        Err(_) => anyhow::bail!(
            "scenario '{}' timed out after {}s",
            args.scenario,
            args.timeout_secs
        ),
    }
}
