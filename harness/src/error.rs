//! Harness-specific error types

use std::time::Duration;
use thiserror::Error;

use crate::runtime::prober::ReadinessResult;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Invalid configuration: {field} = {value}")]
    Configuration { field: String, value: String },

    #[error("Failed to launch emulator: {message}")]
    Startup { message: String },

    #[error("Services not ready within {timeout:?}: {}", unreachable_names(.results))]
    ReadinessTimeout {
        timeout: Duration,
        results: Vec<ReadinessResult>,
    },

    #[error("Operation failed after {attempts} attempts: {message}")]
    RetryExhausted { attempts: u32, message: String },

    #[error("Environment not ready: {message}")]
    NotReady { message: String },

    #[error("Client request failed: {message}")]
    Client { message: String },

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type HarnessResult<T> = Result<T, HarnessError>;

impl<E> From<crate::retry::RetryExhausted<E>> for HarnessError
where
    E: std::fmt::Display + std::fmt::Debug,
{
    fn from(err: crate::retry::RetryExhausted<E>) -> Self {
        HarnessError::RetryExhausted {
            attempts: err.attempts,
            message: err.last_error.to_string(),
        }
    }
}

fn unreachable_names(results: &[ReadinessResult]) -> String {
    let names: Vec<String> = results
        .iter()
        .filter(|r| !r.reachable)
        .map(|r| r.descriptor.name.to_string())
        .collect();
    names.join(", ")
}
