//! Object Store Client

use serde::{Deserialize, Serialize};

use super::factory::ClientHandle;
use crate::error::HarnessResult;

#[derive(Clone)]
pub struct ObjectStoreClient {
    handle: ClientHandle,
}

#[derive(Serialize, Debug)]
struct CreateBucketRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketInfo {
    pub name: String,
}

#[derive(Deserialize, Debug)]
struct ListBucketsResponse {
    buckets: Vec<BucketInfo>,
}

#[derive(Serialize, Debug)]
struct PutObjectRequest<'a> {
    key: &'a str,
    content: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectBody {
    pub key: String,
    pub content: String,
}

impl ObjectStoreClient {
    pub fn new(handle: ClientHandle) -> Self {
        Self { handle }
    }

    pub async fn create_bucket(&self, name: &str) -> HarnessResult<BucketInfo> {
        self.handle
            .post_json("/buckets", &CreateBucketRequest { name })
            .await
    }

    pub async fn list_buckets(&self) -> HarnessResult<Vec<BucketInfo>> {
        let response: ListBucketsResponse = self.handle.get_json("/buckets").await?;
        Ok(response.buckets)
    }

    pub async fn put_object(&self, bucket: &str, key: &str, content: &str) -> HarnessResult<()> {
        let _: serde_json::Value = self
            .handle
            .post_json(&format!("/buckets/{bucket}/objects"), &PutObjectRequest { key, content })
            .await?;
        Ok(())
    }

    pub async fn get_object(&self, bucket: &str, key: &str) -> HarnessResult<ObjectBody> {
        self.handle
            .get_json(&format!("/buckets/{bucket}/objects/{key}"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Credentials, Protocol, ServiceDescriptor, ServiceName};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_against(server: &MockServer) -> ObjectStoreClient {
        let address = server.address();
        let descriptor = ServiceDescriptor {
            name: ServiceName::ObjectStore,
            protocol: Protocol::Plain,
            host: address.ip().to_string(),
            port: address.port(),
        };
        ObjectStoreClient::new(ClientHandle::connect(descriptor, Credentials::test_default()).unwrap())
    }

    #[tokio::test]
    async fn object_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/buckets/reports/objects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"key": "sample.txt"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/buckets/reports/objects/sample.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "key": "sample.txt",
                "content": "some text content"
            })))
            .mount(&server)
            .await;

        let client = client_against(&server).await;
        client.put_object("reports", "sample.txt", "some text content").await.unwrap();
        let body = client.get_object("reports", "sample.txt").await.unwrap();
        assert_eq!(body.content, "some text content");
    }

    #[tokio::test]
    async fn list_buckets_decodes_names() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/buckets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "buckets": [{"name": "a"}, {"name": "b"}]
            })))
            .mount(&server)
            .await;

        let client = client_against(&server).await;
        let buckets = client.list_buckets().await.unwrap();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].name, "a");
    }
}
