//! Service Readiness Probing
//!
//! "Process is running" and "service accepts requests" are different things,
//! and the gap between them is where flaky tests come from. The prober polls
//! every resolved endpoint concurrently until each one answers or a shared
//! deadline elapses; services come up at independent speeds, so serial
//! polling would multiply worst-case startup latency by the service count.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tokio::net::TcpStream;
use tokio::time::{Instant, sleep};

use crate::config::{Protocol, ServiceDescriptor};
use crate::error::{HarnessError, HarnessResult};

/// Outcome of probing one descriptor.
#[derive(Debug, Clone)]
pub struct ReadinessResult {
    pub descriptor: ServiceDescriptor,
    pub reachable: bool,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Aggregated probe outcome for one environment.
#[derive(Debug, Clone)]
pub struct ReadinessReport {
    pub results: Vec<ReadinessResult>,
    pub elapsed: Duration,
    pub completed_at: DateTime<Utc>,
}

impl ReadinessReport {
    pub fn all_reachable(&self) -> bool {
        self.results.iter().all(|r| r.reachable)
    }

    pub fn reachable_count(&self) -> usize {
        self.results.iter().filter(|r| r.reachable).count()
    }

    pub fn unreachable(&self) -> Vec<&ReadinessResult> {
        self.results.iter().filter(|r| !r.reachable).collect()
    }
}

pub struct ReadinessProber {
    interval: Duration,
    connect_timeout: Duration,
}

impl ReadinessProber {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            connect_timeout: Duration::from_secs(1),
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Probe every descriptor concurrently until all answer or `timeout` elapses.
    ///
    /// Returns a report when every service is reachable; otherwise fails with
    /// `ReadinessTimeout` carrying the per-service results for diagnostics.
    /// The call returns shortly after the deadline in the worst case, never
    /// blocking indefinitely.
    pub async fn await_ready(
        &self,
        descriptors: &[ServiceDescriptor],
        timeout: Duration,
    ) -> HarnessResult<ReadinessReport> {
        let started = Instant::now();
        let deadline = started + timeout;

        tracing::info!("🔍 Probing {} services (deadline {:?})", descriptors.len(), timeout);

        let probes = descriptors
            .iter()
            .map(|descriptor| self.probe_until_ready(descriptor.clone(), deadline));
        let results = join_all(probes).await;

        let report = ReadinessReport {
            results,
            elapsed: started.elapsed(),
            completed_at: Utc::now(),
        };

        if report.all_reachable() {
            tracing::info!(
                "✅ All {} services ready after {:?}",
                report.results.len(),
                report.elapsed
            );
            Ok(report)
        } else {
            for result in report.unreachable() {
                tracing::warn!(
                    "⚠️ {} never became reachable at {} ({} attempts, last error: {})",
                    result.descriptor.name,
                    result.descriptor.authority(),
                    result.attempts,
                    result.last_error.as_deref().unwrap_or("none")
                );
            }
            Err(HarnessError::ReadinessTimeout {
                timeout,
                results: report.results,
            })
        }
    }

    async fn probe_until_ready(&self, descriptor: ServiceDescriptor, deadline: Instant) -> ReadinessResult {
        let mut attempts = 0;
        let mut last_error = None;

        loop {
            attempts += 1;
            match self.probe_once(&descriptor).await {
                Ok(()) => {
                    tracing::debug!(
                        "✅ {} reachable at {} (attempt {})",
                        descriptor.name,
                        descriptor.authority(),
                        attempts
                    );
                    return ReadinessResult {
                        descriptor,
                        reachable: true,
                        attempts,
                        last_error: None,
                    };
                }
                Err(message) => last_error = Some(message),
            }

            let now = Instant::now();
            if now >= deadline {
                return ReadinessResult {
                    descriptor,
                    reachable: false,
                    attempts,
                    last_error,
                };
            }
            sleep(self.interval.min(deadline - now)).await;
        }
    }

    async fn probe_once(&self, descriptor: &ServiceDescriptor) -> Result<(), String> {
        match descriptor.protocol {
            // A completed TCP connect is enough: the service is accepting
            Protocol::Plain => {
                let connect = TcpStream::connect((descriptor.host.as_str(), descriptor.port));
                match tokio::time::timeout(self.connect_timeout, connect).await {
                    Ok(Ok(_stream)) => Ok(()),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(format!("connect timed out after {:?}", self.connect_timeout)),
                }
            }
            // The emulator serves a self-signed certificate; trust is relaxed
            // for this probe client only, never process-wide. Any HTTP answer
            // counts as reachable.
            Protocol::Encrypted => {
                let client = reqwest::Client::builder()
                    .danger_accept_invalid_certs(true)
                    .timeout(self.connect_timeout)
                    .build()
                    .map_err(|e| e.to_string())?;
                match client.get(descriptor.base_url()).send().await {
                    Ok(_response) => Ok(()),
                    Err(e) => Err(e.to_string()),
                }
            }
        }
    }
}
