//! Endpoint Resolution
//!
//! Maps the configured service set to concrete network locations. Resolution
//! is a pure function of the configuration: no I/O, no side effects, and
//! every malformed override is rejected here, before any process launch.

use std::collections::HashSet;

use url::Url;

use super::emulator::{EmulatorConfig, Protocol, ServiceName};
use crate::error::{HarnessError, HarnessResult};

/// Resolved network location of one emulated service. Immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub name: ServiceName,
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
}

impl ServiceDescriptor {
    /// `host:port` form, for TCP-level probing
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Full endpoint URL for HTTP clients
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol.scheme(), self.host, self.port)
    }
}

/// Produce one descriptor per requested service.
///
/// Precedence per service: full endpoint override, then port override with
/// the configured host, then the service's default port. Two descriptors may
/// never share host and port.
pub fn resolve(config: &EmulatorConfig) -> HarnessResult<Vec<ServiceDescriptor>> {
    if config.services.is_empty() {
        return Err(HarnessError::Configuration {
            field: "services".to_string(),
            value: "<empty>".to_string(),
        });
    }

    let default_protocol = if config.use_tls {
        Protocol::Encrypted
    } else {
        Protocol::Plain
    };

    let mut descriptors: Vec<ServiceDescriptor> = Vec::with_capacity(config.services.len());
    let mut bound: HashSet<(String, u16)> = HashSet::new();

    for &service in &config.services {
        // A repeated request for the same service yields one descriptor
        if descriptors.iter().any(|d| d.name == service) {
            continue;
        }

        let descriptor = match config.endpoints.get(&service) {
            Some(raw) => parse_endpoint(service, raw)?,
            None => {
                let port = config
                    .ports
                    .get(&service)
                    .copied()
                    .unwrap_or_else(|| service.default_port());
                if port == 0 {
                    return Err(HarnessError::Configuration {
                        field: format!("{service} port"),
                        value: "0".to_string(),
                    });
                }
                ServiceDescriptor {
                    name: service,
                    protocol: default_protocol,
                    host: config.host.clone(),
                    port,
                }
            }
        };

        if !bound.insert((descriptor.host.clone(), descriptor.port)) {
            return Err(HarnessError::Configuration {
                field: format!("{service} endpoint"),
                value: format!("{} already assigned to another service", descriptor.authority()),
            });
        }

        descriptors.push(descriptor);
    }

    Ok(descriptors)
}

fn parse_endpoint(service: ServiceName, raw: &str) -> HarnessResult<ServiceDescriptor> {
    let invalid = |value: &str| HarnessError::Configuration {
        field: format!("{service} endpoint"),
        value: value.to_string(),
    };

    let url = Url::parse(raw).map_err(|_| invalid(raw))?;

    let protocol = match url.scheme() {
        "http" => Protocol::Plain,
        "https" => Protocol::Encrypted,
        _ => return Err(invalid(raw)),
    };

    let host = url.host_str().ok_or_else(|| invalid(raw))?.to_string();
    let port = url.port_or_known_default().ok_or_else(|| invalid(raw))?;

    Ok(ServiceDescriptor {
        name: service,
        protocol,
        host,
        port,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn resolves_one_descriptor_per_service_with_distinct_endpoints() {
        let config = EmulatorConfig::default();
        let descriptors = resolve(&config).unwrap();

        assert_eq!(descriptors.len(), 4);
        for service in ServiceName::all() {
            assert_eq!(descriptors.iter().filter(|d| d.name == service).count(), 1);
        }

        let mut authorities: Vec<String> = descriptors.iter().map(|d| d.authority()).collect();
        authorities.sort();
        authorities.dedup();
        assert_eq!(authorities.len(), 4);
    }

    #[test]
    fn repeated_service_request_yields_one_descriptor() {
        let config = EmulatorConfig::builder()
            .services([ServiceName::Queue, ServiceName::Queue])
            .build();

        let descriptors = resolve(&config).unwrap();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].name, ServiceName::Queue);
    }

    #[test]
    fn port_override_is_respected() {
        let config = EmulatorConfig::builder()
            .services([ServiceName::Queue])
            .port(ServiceName::Queue, 9500)
            .build();

        let descriptors = resolve(&config).unwrap();
        assert_eq!(descriptors[0].port, 9500);
        assert_eq!(descriptors[0].base_url(), "http://127.0.0.1:9500");
    }

    #[test]
    fn tls_selects_encrypted_protocol() {
        let config = EmulatorConfig::builder()
            .services([ServiceName::Stream])
            .use_tls(true)
            .build();

        let descriptors = resolve(&config).unwrap();
        assert_eq!(descriptors[0].protocol, Protocol::Encrypted);
        assert!(descriptors[0].base_url().starts_with("https://"));
    }

    #[test]
    fn endpoint_override_scheme_selects_protocol() {
        let config = EmulatorConfig::builder()
            .services([ServiceName::Stream])
            .endpoint(ServiceName::Stream, "https://emulator.local:7443")
            .build();

        let descriptors = resolve(&config).unwrap();
        assert_eq!(descriptors[0].protocol, Protocol::Encrypted);
        assert_eq!(descriptors[0].host, "emulator.local");
        assert_eq!(descriptors[0].port, 7443);
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let config = EmulatorConfig::builder()
            .services([ServiceName::Stream])
            .endpoint(ServiceName::Stream, "ftp://localhost:21")
            .build();

        assert_matches!(resolve(&config), Err(HarnessError::Configuration { .. }));
    }

    #[test]
    fn malformed_endpoint_is_rejected() {
        let config = EmulatorConfig::builder()
            .services([ServiceName::Queue])
            .endpoint(ServiceName::Queue, "not a url")
            .build();

        assert_matches!(resolve(&config), Err(HarnessError::Configuration { .. }));
    }

    #[test]
    fn port_zero_is_rejected() {
        let config = EmulatorConfig::builder()
            .services([ServiceName::Queue])
            .port(ServiceName::Queue, 0)
            .build();

        assert_matches!(resolve(&config), Err(HarnessError::Configuration { .. }));
    }

    #[test]
    fn colliding_endpoints_are_rejected() {
        let config = EmulatorConfig::builder()
            .services([ServiceName::Queue, ServiceName::Stream])
            .port(ServiceName::Queue, 5000)
            .port(ServiceName::Stream, 5000)
            .build();

        assert_matches!(resolve(&config), Err(HarnessError::Configuration { .. }));
    }

    #[test]
    fn empty_service_set_is_rejected() {
        let config = EmulatorConfig::builder().services([]).build();
        assert_matches!(resolve(&config), Err(HarnessError::Configuration { .. }));
    }
}
