//! Emulator Configuration Builder
//!
//! Provides a flexible builder pattern for constructing emulator configurations

use std::path::PathBuf;
use std::time::Duration;

use super::emulator::{Credentials, EmulatorConfig, ServiceName};
use crate::retry::RetryPolicy;

pub struct EmulatorConfigBuilder {
    config: EmulatorConfig,
}

impl EmulatorConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EmulatorConfig::default(),
        }
    }

    /// Replace the service set
    pub fn services<I: IntoIterator<Item = ServiceName>>(mut self, services: I) -> Self {
        self.config.services = services.into_iter().collect();
        self
    }

    /// Add a single service to the set
    pub fn service(mut self, service: ServiceName) -> Self {
        if !self.config.services.contains(&service) {
            self.config.services.push(service);
        }
        self
    }

    /// Set the host all services bind to
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.host = host.into();
        self
    }

    /// Override the port of one service
    pub fn port(mut self, service: ServiceName, port: u16) -> Self {
        self.config.ports.insert(service, port);
        self
    }

    /// Override one service with a full endpoint URL (scheme selects the protocol)
    pub fn endpoint<S: Into<String>>(mut self, service: ServiceName, url: S) -> Self {
        self.config.endpoints.insert(service, url.into());
        self
    }

    /// Serve TLS with the emulator's self-signed certificate
    pub fn use_tls(mut self, use_tls: bool) -> Self {
        self.config.use_tls = use_tls;
        self
    }

    /// Set the credentials the emulator accepts
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.config.credentials = credentials;
        self
    }

    /// Set the overall readiness deadline
    pub fn readiness_timeout(mut self, timeout: Duration) -> Self {
        self.config.readiness_timeout = timeout;
        self
    }

    /// Set the pause between reachability probes
    pub fn probe_interval(mut self, interval: Duration) -> Self {
        self.config.probe_interval = interval;
        self
    }

    /// Set the default retry policy for eventually-consistent reads
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry_policy = policy;
        self
    }

    /// Set the emulator executable
    pub fn binary<S: Into<String>>(mut self, binary: S) -> Self {
        self.config.emulator_binary = binary.into();
        self
    }

    /// Append an argument to the emulator command line
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.config.emulator_args.push(arg.into());
        self
    }

    /// Set the emulator state directory
    pub fn data_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.data_dir = Some(dir.into());
        self
    }

    /// Set log level (trace, debug, info, warn, error)
    pub fn log_level<S: Into<String>>(mut self, level: S) -> Self {
        self.config.log_level = level.into();
        self
    }

    /// Kill stale emulator processes and free ports before launching
    pub fn preclean(mut self, preclean: bool) -> Self {
        self.config.preclean = preclean;
        self
    }

    /// Build the configuration
    pub fn build(self) -> EmulatorConfig {
        self.config
    }
}

impl Default for EmulatorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
