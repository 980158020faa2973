//! Client Construction
//!
//! Produces clients bound to one resolved descriptor and the configured test
//! credentials. Nothing is cached: every call builds a fresh handle against
//! the current descriptor, so endpoint changes between runs never leak stale
//! connections, and no client state is shared between test bodies.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::config::{Credentials, Protocol, ServiceDescriptor, ServiceName};
use crate::error::{HarnessError, HarnessResult};
use crate::runtime::lifecycle::LifecycleController;

use super::function::FunctionClient;
use super::object_store::ObjectStoreClient;
use super::queue::QueueClient;
use super::stream::StreamClient;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ClientFactory {
    controller: Arc<LifecycleController>,
}

impl ClientFactory {
    pub fn new(controller: Arc<LifecycleController>) -> Self {
        Self { controller }
    }

    /// A fresh handle for one service.
    ///
    /// Fails with `NotReady` until the lifecycle controller reaches Ready,
    /// and with `Configuration` when the service is not part of the run.
    pub fn client_for(&self, service: ServiceName) -> HarnessResult<ClientHandle> {
        let environment = self.controller.environment()?;
        let descriptor = environment
            .descriptor(service)
            .ok_or_else(|| HarnessError::Configuration {
                field: "services".to_string(),
                value: format!("{service} is not part of this environment"),
            })?
            .clone();

        ClientHandle::connect(descriptor, environment.credentials.clone())
    }

    pub fn queue(&self) -> HarnessResult<QueueClient> {
        Ok(QueueClient::new(self.client_for(ServiceName::Queue)?))
    }

    pub fn stream(&self) -> HarnessResult<StreamClient> {
        Ok(StreamClient::new(self.client_for(ServiceName::Stream)?))
    }

    pub fn object_store(&self) -> HarnessResult<ObjectStoreClient> {
        Ok(ObjectStoreClient::new(self.client_for(ServiceName::ObjectStore)?))
    }

    pub fn functions(&self) -> HarnessResult<FunctionClient> {
        Ok(FunctionClient::new(self.client_for(ServiceName::FunctionExec)?))
    }
}

/// One service endpoint plus credentials and a dedicated HTTP client.
#[derive(Clone, Debug)]
pub struct ClientHandle {
    descriptor: ServiceDescriptor,
    credentials: Credentials,
    http: reqwest::Client,
}

impl ClientHandle {
    /// Build a handle bound to the given descriptor.
    ///
    /// Certificate validation is relaxed only for encrypted descriptors,
    /// because the emulator serves a self-signed local certificate; plain
    /// handles and every other connection in the process keep full
    /// verification.
    pub fn connect(descriptor: ServiceDescriptor, credentials: Credentials) -> HarnessResult<Self> {
        let mut builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);
        if descriptor.protocol == Protocol::Encrypted {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder.build().map_err(|e| HarnessError::Client {
            message: format!("failed to build HTTP client: {e}"),
        })?;

        Ok(Self {
            descriptor,
            credentials,
            http,
        })
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.descriptor.base_url(), path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.url(path))
            .header("x-localcloud-access-key", &self.credentials.access_key)
            .header("x-localcloud-secret-key", &self.credentials.secret_key)
            .header("x-request-id", Uuid::new_v4().to_string())
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> HarnessResult<T> {
        let response = self.request(reqwest::Method::GET, path).send().await?;
        Self::decode(path, response).await
    }

    pub(crate) async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> HarnessResult<T> {
        let response = self.request(reqwest::Method::POST, path).json(body).send().await?;
        Self::decode(path, response).await
    }

    pub(crate) async fn delete(&self, path: &str) -> HarnessResult<()> {
        let response = self.request(reqwest::Method::DELETE, path).send().await?;
        Self::check(path, &response)?;
        Ok(())
    }

    fn check(path: &str, response: &reqwest::Response) -> HarnessResult<()> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(HarnessError::Client {
                message: format!("{path} returned status {status}"),
            })
        }
    }

    async fn decode<T: DeserializeOwned>(path: &str, response: reqwest::Response) -> HarnessResult<T> {
        Self::check(path, &response)?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmulatorConfig;
    use crate::runtime::lifecycle::LifecycleController;
    use assert_matches::assert_matches;

    fn plain_descriptor(port: u16) -> ServiceDescriptor {
        ServiceDescriptor {
            name: ServiceName::Queue,
            protocol: Protocol::Plain,
            host: "127.0.0.1".to_string(),
            port,
        }
    }

    #[tokio::test]
    async fn client_for_fails_before_environment_is_ready() {
        let config = EmulatorConfig::builder().services([ServiceName::Queue]).build();
        let controller = Arc::new(LifecycleController::new(config));
        let factory = ClientFactory::new(controller);

        assert_matches!(
            factory.client_for(ServiceName::Queue),
            Err(HarnessError::NotReady { .. })
        );
    }

    #[test]
    fn handle_binds_descriptor_and_credentials() {
        let handle = ClientHandle::connect(plain_descriptor(4576), Credentials::test_default()).unwrap();
        assert_eq!(handle.descriptor().port, 4576);
        assert_eq!(handle.url("/queues"), "http://127.0.0.1:4576/queues");
    }
}
