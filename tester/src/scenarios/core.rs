//! Core Functionality Scenarios
//!
//! Essential flows against the emulated queue and stream services

use std::time::Duration;

use anyhow::ensure;
use harness::{HarnessError, ServiceName, retry};

use super::ScenarioContext;

/// Every configured service answers its list call
pub async fn smoke(ctx: &ScenarioContext) -> anyhow::Result<()> {
    tracing::info!("🧪 Smoke: every service answers");

    for descriptor in &ctx.environment.descriptors {
        match descriptor.name {
            ServiceName::Queue => {
                ctx.factory.queue()?.list_queues().await?;
            }
            ServiceName::Stream => {
                ctx.factory.stream()?.list_streams().await?;
            }
            ServiceName::ObjectStore => {
                ctx.factory.object_store()?.list_buckets().await?;
            }
            ServiceName::FunctionExec => {
                ctx.factory.functions()?.list_functions().await?;
            }
        }
        tracing::info!("✅ {} answered at {}", descriptor.name, descriptor.authority());
    }

    tracing::info!("✅ Smoke: PASSED");
    Ok(())
}

/// Queue round trip: create, send, receive exactly one message, delete,
/// and confirm the queue disappears from the listing
pub async fn queue(ctx: &ScenarioContext) -> anyhow::Result<()> {
    tracing::info!("🧪 Queue: send/receive round trip");

    let queues = ctx.factory.queue()?;

    // Plain and FIFO variants go through the same flow
    for queue_name in ["q1", "q1.fifo"] {
        let created = queues.create_queue(queue_name).await?;
        ensure!(created.name == queue_name, "created queue has wrong name: {}", created.name);

        let sent = queues.send_message(queue_name, "x").await?;
        ensure!(!sent.md5_of_body.is_empty(), "send returned no body digest");

        // Delivery propagates asynchronously; retry instead of sleeping
        let messages = retry(&ctx.policy, || {
            let queues = queues.clone();
            async move {
                let received = queues
                    .receive_messages(queue_name, 1, Duration::from_secs(1))
                    .await?;
                if received.is_empty() {
                    Err(HarnessError::NotReady {
                        message: format!("no messages visible on {queue_name} yet"),
                    })
                } else {
                    Ok(received)
                }
            }
        })
        .await?;

        ensure!(messages.len() == 1, "expected exactly one message, got {}", messages.len());
        ensure!(messages[0].body == "x", "unexpected message body: {}", messages[0].body);

        queues.delete_queue(queue_name).await?;

        // Deletion propagates too
        retry(&ctx.policy, || {
            let queues = queues.clone();
            async move {
                let listing = queues.list_queues().await?;
                if listing.iter().any(|q| q.name == queue_name) {
                    Err(HarnessError::NotReady {
                        message: format!("{queue_name} still listed"),
                    })
                } else {
                    Ok(())
                }
            }
        })
        .await?;

        tracing::info!("✅ Queue '{}' round trip complete", queue_name);
    }

    tracing::info!("✅ Queue: PASSED");
    Ok(())
}

/// Stream creation followed by a describe that must absorb the emulator's
/// propagation delay through retry, with no fixed sleep anywhere
pub async fn stream(ctx: &ScenarioContext) -> anyhow::Result<()> {
    tracing::info!("🧪 Stream: create and describe with retry");

    let streams = ctx.factory.stream()?;
    let stream_name = format!("stream-{}", uuid::Uuid::new_v4());

    streams.create_stream(&stream_name, 1).await?;

    // A newly created stream is not immediately describable
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

    ensure!(!description.arn.is_empty(), "described stream has empty ARN");
    tracing::info!("✅ Stream '{}' active with ARN {}", stream_name, description.arn);

    streams.put_record(&stream_name, "partition-key", "{\"test\":\"test\"}").await?;

    let listing = streams.list_streams().await?;
    ensure!(
        listing.iter().any(|s| s == &stream_name),
        "stream listing does not contain {stream_name}"
    );

    tracing::info!("✅ Stream: PASSED");
    Ok(())
}
