//! SurfaceScan Common - Configuration and logging
//!
//! Shared plumbing for the engine crates: the `EngineConfig` structure
//! (TOML file + environment overrides) and tracing-based logging setup.

pub mod config;
pub mod logging;

pub use config::{AdvisoryConfig, EngineConfig, ProbeConfig, TlsConfig};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogFormat};
