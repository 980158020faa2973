//! Common test utilities for the harness integration suite

use std::net::TcpListener;

use harness::{EmulatorConfig, ServiceName};

/// Bind a listener on an ephemeral port and keep it open so the prober can
/// reach it. The listener stands in for an emulated service.
pub fn bound_listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
    let port = listener.local_addr().expect("listener address").port();
    (listener, port)
}

/// A port that nothing listens on.
pub fn free_port() -> u16 {
    let (listener, port) = bound_listener();
    drop(listener);
    port
}

/// Configuration whose "emulator" is a harmless long-running process and
/// whose queue service points at the given port.
pub fn sleeper_config(queue_port: u16) -> EmulatorConfig {
    EmulatorConfig::builder()
        .services([ServiceName::Queue])
        .port(ServiceName::Queue, queue_port)
        .binary("sh")
        .arg("-c")
        .arg("sleep 60")
        .readiness_timeout(std::time::Duration::from_secs(3))
        .probe_interval(std::time::Duration::from_millis(20))
        .build()
}
