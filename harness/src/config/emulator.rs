//! Emulator Configuration
//!
//! Configuration for one emulator environment: which services to run, where
//! they listen, credentials the emulator accepts, and the timing knobs for
//! readiness probing and retry. Values come from the builder, the process
//! environment (with `.env` loading), or the defaults below.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::builder::EmulatorConfigBuilder;
use crate::error::{HarnessError, HarnessResult};
use crate::retry::RetryPolicy;

/// Logical names of the emulated services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceName {
    Stream,
    ObjectStore,
    FunctionExec,
    Queue,
}

impl ServiceName {
    pub fn all() -> [ServiceName; 4] {
        [
            ServiceName::Stream,
            ServiceName::ObjectStore,
            ServiceName::FunctionExec,
            ServiceName::Queue,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceName::Stream => "stream",
            ServiceName::ObjectStore => "object-store",
            ServiceName::FunctionExec => "functions",
            ServiceName::Queue => "queue",
        }
    }

    /// Segment used in environment variable names (LOCALCLOUD_<KEY>_PORT etc).
    pub fn env_key(&self) -> &'static str {
        match self {
            ServiceName::Stream => "STREAM",
            ServiceName::ObjectStore => "OBJECT_STORE",
            ServiceName::FunctionExec => "FUNCTIONS",
            ServiceName::Queue => "QUEUE",
        }
    }

    /// Each service listens on its own port so descriptors never collide.
    pub fn default_port(&self) -> u16 {
        match self {
            ServiceName::Stream => 4568,
            ServiceName::ObjectStore => 4572,
            ServiceName::FunctionExec => 4574,
            ServiceName::Queue => 4576,
        }
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceName {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stream" => Ok(ServiceName::Stream),
            "object-store" | "object_store" => Ok(ServiceName::ObjectStore),
            "functions" | "function-exec" => Ok(ServiceName::FunctionExec),
            "queue" => Ok(ServiceName::Queue),
            other => Err(HarnessError::Configuration {
                field: "service".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Transport used to reach an emulated service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Plain,
    Encrypted,
}

impl Protocol {
    pub fn scheme(&self) -> &'static str {
        match self {
            Protocol::Plain => "http",
            Protocol::Encrypted => "https",
        }
    }
}

/// Placeholder credentials accepted by the emulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl Credentials {
    pub fn new<A: Into<String>, S: Into<String>>(access_key: A, secret_key: S) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn test_default() -> Self {
        Self::new("test", "test")
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::test_default()
    }
}

#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    /// Host every service binds to unless an endpoint override says otherwise
    pub host: String,
    /// Services the environment should run
    pub services: Vec<ServiceName>,
    /// Per-service port overrides
    pub ports: HashMap<ServiceName, u16>,
    /// Per-service full endpoint overrides (URL strings, validated by the resolver)
    pub endpoints: HashMap<ServiceName, String>,
    /// Serve TLS with the emulator's self-signed certificate
    pub use_tls: bool,
    pub credentials: Credentials,
    /// Overall deadline for every service to answer after launch
    pub readiness_timeout: Duration,
    /// Pause between reachability probes of one service
    pub probe_interval: Duration,
    /// Default policy for eventually-consistent reads
    pub retry_policy: RetryPolicy,
    /// Emulator executable, looked up on PATH when not absolute
    pub emulator_binary: String,
    /// Extra arguments appended to the emulator command line
    pub emulator_args: Vec<String>,
    /// Emulator state directory; an ephemeral temp dir is created when unset
    pub data_dir: Option<PathBuf>,
    pub log_level: String,
    /// Kill stale emulator processes and free ports before launching
    pub preclean: bool,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            services: ServiceName::all().to_vec(),
            ports: HashMap::new(),
            endpoints: HashMap::new(),
            use_tls: false,
            credentials: Credentials::test_default(),
            readiness_timeout: Duration::from_secs(30),
            probe_interval: Duration::from_millis(250),
            retry_policy: RetryPolicy::default(),
            emulator_binary: "localcloud".to_string(),
            emulator_args: Vec::new(),
            data_dir: None,
            log_level: "info".to_string(),
            preclean: false,
        }
    }
}

impl EmulatorConfig {
    /// Create a new builder
    pub fn builder() -> EmulatorConfigBuilder {
        EmulatorConfigBuilder::new()
    }

    /// Build a configuration from the process environment.
    ///
    /// Loads `.env` first so local overrides work without exporting anything.
    /// Malformed values fail fast with a `Configuration` error, before any
    /// process is launched.
    pub fn from_env() -> HarnessResult<Self> {
        dotenv::dotenv().ok();

        let mut config = EmulatorConfig::default();

        if let Ok(host) = env::var("LOCALCLOUD_HOST") {
            config.host = host;
        }

        if let Ok(raw) = env::var("LOCALCLOUD_SERVICES") {
            config.services = parse_services(&raw)?;
        }

        for service in ServiceName::all() {
            let port_var = format!("LOCALCLOUD_{}_PORT", service.env_key());
            if let Ok(raw) = env::var(&port_var) {
                let port = raw.parse::<u16>().map_err(|_| HarnessError::Configuration {
                    field: port_var.clone(),
                    value: raw.clone(),
                })?;
                config.ports.insert(service, port);
            }

            let endpoint_var = format!("LOCALCLOUD_{}_ENDPOINT", service.env_key());
            if let Ok(raw) = env::var(&endpoint_var) {
                // URL shape is validated by the resolver
                config.endpoints.insert(service, raw);
            }
        }

        if let Ok(raw) = env::var("LOCALCLOUD_USE_TLS") {
            config.use_tls = parse_bool("LOCALCLOUD_USE_TLS", &raw)?;
        }

        if let Ok(access_key) = env::var("LOCALCLOUD_ACCESS_KEY") {
            config.credentials.access_key = access_key;
        }
        if let Ok(secret_key) = env::var("LOCALCLOUD_SECRET_KEY") {
            config.credentials.secret_key = secret_key;
        }

        if let Ok(raw) = env::var("LOCALCLOUD_READY_TIMEOUT_SECS") {
            config.readiness_timeout = Duration::from_secs(parse_u64("LOCALCLOUD_READY_TIMEOUT_SECS", &raw)?);
        }
        if let Ok(raw) = env::var("LOCALCLOUD_PROBE_INTERVAL_MS") {
            config.probe_interval = Duration::from_millis(parse_u64("LOCALCLOUD_PROBE_INTERVAL_MS", &raw)?);
        }

        if let Ok(raw) = env::var("LOCALCLOUD_RETRY_MAX_ATTEMPTS") {
            config.retry_policy.max_attempts = parse_u64("LOCALCLOUD_RETRY_MAX_ATTEMPTS", &raw)? as u32;
        }
        if let Ok(raw) = env::var("LOCALCLOUD_RETRY_INITIAL_DELAY_MS") {
            config.retry_policy.initial_delay =
                Duration::from_millis(parse_u64("LOCALCLOUD_RETRY_INITIAL_DELAY_MS", &raw)?);
        }
        if let Ok(raw) = env::var("LOCALCLOUD_RETRY_MULTIPLIER") {
            config.retry_policy.backoff_multiplier = parse_f64("LOCALCLOUD_RETRY_MULTIPLIER", &raw)?;
        }
        if let Ok(raw) = env::var("LOCALCLOUD_RETRY_MAX_DELAY_MS") {
            config.retry_policy.max_delay = Duration::from_millis(parse_u64("LOCALCLOUD_RETRY_MAX_DELAY_MS", &raw)?);
        }

        if let Ok(binary) = env::var("LOCALCLOUD_BIN") {
            config.emulator_binary = binary;
        }
        if let Ok(dir) = env::var("LOCALCLOUD_DATA_DIR") {
            config.data_dir = Some(PathBuf::from(dir));
        }
        if let Ok(level) = env::var("LOCALCLOUD_LOG_LEVEL") {
            config.log_level = level;
        }
        if let Ok(raw) = env::var("LOCALCLOUD_PRECLEAN") {
            config.preclean = parse_bool("LOCALCLOUD_PRECLEAN", &raw)?;
        }

        Ok(config)
    }
}

fn parse_services(raw: &str) -> HarnessResult<Vec<ServiceName>> {
    let mut services = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let service: ServiceName = part.parse()?;
        if !services.contains(&service) {
            services.push(service);
        }
    }
    if services.is_empty() {
        return Err(HarnessError::Configuration {
            field: "LOCALCLOUD_SERVICES".to_string(),
            value: raw.to_string(),
        });
    }
    Ok(services)
}

fn parse_bool(field: &str, raw: &str) -> HarnessResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(HarnessError::Configuration {
            field: field.to_string(),
            value: raw.to_string(),
        }),
    }
}

fn parse_u64(field: &str, raw: &str) -> HarnessResult<u64> {
    raw.trim().parse::<u64>().map_err(|_| HarnessError::Configuration {
        field: field.to_string(),
        value: raw.to_string(),
    })
}

fn parse_f64(field: &str, raw: &str) -> HarnessResult<f64> {
    raw.trim().parse::<f64>().map_err(|_| HarnessError::Configuration {
        field: field.to_string(),
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn default_config_runs_all_services() {
        let config = EmulatorConfig::default();
        assert_eq!(config.services.len(), 4);
        assert_eq!(config.host, "127.0.0.1");
        assert!(!config.use_tls);
        assert_eq!(config.credentials, Credentials::test_default());
    }

    #[test]
    fn service_names_round_trip() {
        for service in ServiceName::all() {
            let parsed: ServiceName = service.as_str().parse().unwrap();
            assert_eq!(parsed, service);
        }
    }

    #[test]
    fn unknown_service_is_a_configuration_error() {
        let err = "blob-store".parse::<ServiceName>().unwrap_err();
        assert_matches!(err, HarnessError::Configuration { .. });
    }

    #[test]
    fn default_ports_are_distinct() {
        let mut ports: Vec<u16> = ServiceName::all().iter().map(|s| s.default_port()).collect();
        ports.sort_unstable();
        ports.dedup();
        assert_eq!(ports.len(), 4);
    }

    #[test]
    fn parse_services_dedupes_and_trims() {
        let services = parse_services("queue, stream,queue").unwrap();
        assert_eq!(services, vec![ServiceName::Queue, ServiceName::Stream]);
    }

    #[test]
    fn parse_bool_rejects_garbage() {
        assert!(parse_bool("LOCALCLOUD_USE_TLS", "true").unwrap());
        assert!(!parse_bool("LOCALCLOUD_USE_TLS", "0").unwrap());
        assert_matches!(
            parse_bool("LOCALCLOUD_USE_TLS", "maybe"),
            Err(HarnessError::Configuration { .. })
        );
    }

    #[test]
    fn parse_u64_rejects_non_numeric() {
        let err = parse_u64("LOCALCLOUD_READY_TIMEOUT_SECS", "soon").unwrap_err();
        assert_matches!(err, HarnessError::Configuration { field, value } => {
            assert_eq!(field, "LOCALCLOUD_READY_TIMEOUT_SECS");
            assert_eq!(value, "soon");
        });
    }
}
