//! Function Execution Scenarios

use std::env;

use anyhow::ensure;
use harness::{HarnessError, retry};

use super::ScenarioContext;

/// Artifact used when no real package is supplied. Packaging executable
/// code is an external collaborator's job; the emulator accepts any bytes.
const PLACEHOLDER_ARCHIVE: &[u8] = b"localcloud-placeholder-archive";

/// Deploy a function and wire it to a stream through an event source mapping
pub async fn function(ctx: &ScenarioContext) -> anyhow::Result<()> {
    tracing::info!("🧪 Function: deploy and map to a stream");

    let functions = ctx.factory.functions()?;
    let streams = ctx.factory.stream()?;

    let function_name = uuid::Uuid::new_v4().to_string();
    let stream_name = uuid::Uuid::new_v4().to_string();

    // A packaged artifact can be supplied externally
    let archive = match env::var("LOCALCLOUD_FUNCTION_ARTIFACT") {
        Ok(path) => std::fs::read(&path)?,
        Err(_) => PLACEHOLDER_ARCHIVE.to_vec(),
    };

    let function = functions
        .create_function(&function_name, "rust", "handler::handle", &archive)
        .await?;
    ensure!(!function.arn.is_empty(), "created function has empty ARN");

    let listing = functions.list_functions().await?;
    ensure!(
        listing.iter().any(|f| f.name == function_name),
        "function listing does not contain {function_name}"
    );

    // Create the source stream and wait until it has an ARN
    streams.create_stream(&stream_name, 1).await?;
    let description = retry(&ctx.policy, || {
        let streams = streams.clone();
        let stream_name = stream_name.clone();
        async move {
            let description = streams.describe_stream(&stream_name).await?;
            if description.arn.is_empty() {
                Err(HarnessError::NotReady {
                    message: format!("{stream_name} has no ARN yet"),
                })
            } else {
                Ok(description)
            }
        }
    })
    .await?;

    let mapping = functions
        .create_event_source_mapping(&function_name, &description.arn, "LATEST")
        .await?;
    ensure!(!mapping.uuid.is_empty(), "mapping has no id");
    tracing::info!("✅ Mapping {} in state {}", mapping.uuid, mapping.state);

    // Push an event through the mapping
    streams
        .put_record(&stream_name, "partitionKey1", "{\"foo\": \"bar\"}")
        .await?;

    tracing::info!("✅ Function: PASSED");
    Ok(())
}
