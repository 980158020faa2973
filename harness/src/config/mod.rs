//! Configuration Management
//!
//! Emulator configuration, environment ingestion, and endpoint resolution.

pub mod builder;
pub mod emulator;
pub mod resolver;

// Re-export main types
pub use builder::EmulatorConfigBuilder;
pub use emulator::{Credentials, EmulatorConfig, Protocol, ServiceName};
pub use resolver::{ServiceDescriptor, resolve};
