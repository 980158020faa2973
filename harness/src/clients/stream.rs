//! Stream Service Client
//!
//! Stream creation propagates asynchronously in the emulator: a stream may
//! not be describable immediately after `create_stream` returns. Callers
//! wrap `describe_stream` in `retry` rather than sleeping.

use serde::{Deserialize, Serialize};

use super::factory::ClientHandle;
use crate::error::HarnessResult;

#[derive(Clone)]
pub struct StreamClient {
    handle: ClientHandle,
}

#[derive(Serialize, Debug)]
struct CreateStreamRequest<'a> {
    name: &'a str,
    shard_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamDescription {
    pub name: String,
    pub arn: String,
    pub status: String,
    pub shard_count: u32,
}

#[derive(Serialize, Debug)]
struct PutRecordRequest<'a> {
    partition_key: &'a str,
    data: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PutRecordResponse {
    pub shard_id: String,
    pub sequence_number: String,
}

#[derive(Deserialize, Debug)]
struct ListStreamsResponse {
    streams: Vec<String>,
}

impl StreamClient {
    pub fn new(handle: ClientHandle) -> Self {
        Self { handle }
    }

    pub async fn create_stream(&self, name: &str, shard_count: u32) -> HarnessResult<()> {
        let _: serde_json::Value = self
            .handle
            .post_json("/streams", &CreateStreamRequest { name, shard_count })
            .await?;
        Ok(())
    }

    pub async fn list_streams(&self) -> HarnessResult<Vec<String>> {
        let response: ListStreamsResponse = self.handle.get_json("/streams").await?;
        Ok(response.streams)
    }

    pub async fn describe_stream(&self, name: &str) -> HarnessResult<StreamDescription> {
        self.handle.get_json(&format!("/streams/{name}")).await
    }

    pub async fn put_record(
        &self,
        stream: &str,
        partition_key: &str,
        data: &str,
    ) -> HarnessResult<PutRecordResponse> {
        self.handle
            .post_json(
                &format!("/streams/{stream}/records"),
                &PutRecordRequest { partition_key, data },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Credentials, Protocol, ServiceDescriptor, ServiceName};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_against(server: &MockServer) -> StreamClient {
        let address = server.address();
        let descriptor = ServiceDescriptor {
            name: ServiceName::Stream,
            protocol: Protocol::Plain,
            host: address.ip().to_string(),
            port: address.port(),
        };
        StreamClient::new(ClientHandle::connect(descriptor, Credentials::test_default()).unwrap())
    }

    #[tokio::test]
    async fn describe_returns_arn_and_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/streams/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "events",
                "arn": "arn:localcloud:stream:local:000000000000:stream/events",
                "status": "ACTIVE",
                "shard_count": 1
            })))
            .mount(&server)
            .await;

        let client = client_against(&server).await;
        let description = client.describe_stream("events").await.unwrap();
        assert!(!description.arn.is_empty());
        assert_eq!(description.status, "ACTIVE");
    }

    #[tokio::test]
    async fn put_record_sends_partition_key_and_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/streams/events/records"))
            .and(body_json(json!({"partition_key": "pk-1", "data": "{\"test\":\"test\"}"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "shard_id": "shard-000000000000",
                "sequence_number": "49590338271490256608559692538361571095921575989136588898"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_against(&server).await;
        let response = client
            .put_record("events", "pk-1", "{\"test\":\"test\"}")
            .await
            .unwrap();
        assert!(!response.sequence_number.is_empty());
    }
}
