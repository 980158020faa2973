//! Object Storage Scenarios

use anyhow::ensure;
use harness::retry;

use super::ScenarioContext;

/// Bucket round trip: create, upload, read back, and list
pub async fn bucket(ctx: &ScenarioContext) -> anyhow::Result<()> {
    tracing::info!("🧪 Bucket: object upload round trip");

    let store = ctx.factory.object_store()?;
    let bucket_name = uuid::Uuid::new_v4().to_string();

    let created = store.create_bucket(&bucket_name).await?;
    ensure!(created.name == bucket_name, "created bucket has wrong name: {}", created.name);

    store
        .put_object(&bucket_name, "sample.txt", "some text content")
        .await?;

    // Reads may lag the write
    let body = retry(&ctx.policy, || {
        let store = store.clone();
        let bucket_name = bucket_name.clone();
        async move { store.get_object(&bucket_name, "sample.txt").await }
    })
    .await?;
    ensure!(body.content == "some text content", "unexpected object content: {}", body.content);

    let listing = store.list_buckets().await?;
    ensure!(
        listing.iter().any(|b| b.name == bucket_name),
        "bucket listing does not contain {bucket_name}"
    );

    tracing::info!("✅ Bucket: PASSED");
    Ok(())
}
