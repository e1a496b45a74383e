//! Configuration management for SurfaceScan components

use serde::{Deserialize, Serialize};
use std::path::Path;
use surfacescan_core::{Error, Result};

/// Main engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Prober settings
    #[serde(default)]
    pub probe: ProbeConfig,

    /// TLS auditor settings
    #[serde(default)]
    pub tls: TlsConfig,

    /// Advisory source settings
    #[serde(default)]
    pub advisory: AdvisoryConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {}", e)))
    }

    /// Create a configuration builder
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }

    /// Merge with environment variables (SURFACESCAN_ prefix)
    pub fn merge_env(mut self) -> Self {
        if let Ok(val) = std::env::var("SURFACESCAN_NMAP_PATH") {
            self.probe.nmap_path = val;
        }
        if let Ok(val) = std::env::var("SURFACESCAN_PROBE_TIMEOUT") {
            if let Ok(n) = val.parse() {
                self.probe.timeout_seconds = n;
            }
        }
        if let Ok(val) = std::env::var("SURFACESCAN_NVD_API_KEY") {
            self.advisory.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("SURFACESCAN_NVD_API_URL") {
            self.advisory.api_url = val;
        }
        if let Ok(val) = std::env::var("SURFACESCAN_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("SURFACESCAN_LOG_FORMAT") {
            self.logging.format = val;
        }
        self
    }
}

/// Prober configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Path to the nmap binary
    #[serde(default = "default_nmap_path")]
    pub nmap_path: String,

    /// Probe timeout in seconds
    #[serde(default = "default_probe_timeout")]
    pub timeout_seconds: u64,

    /// Attempt OS detection (degraded automatically without privileges)
    #[serde(default = "default_true")]
    pub detect_os: bool,

    /// Maximum concurrent probe invocations across all scans
    #[serde(default = "default_probe_concurrency")]
    pub max_concurrent: usize,
}

fn default_nmap_path() -> String {
    String::from("nmap")
}

fn default_probe_timeout() -> u64 {
    300
}

fn default_probe_concurrency() -> usize {
    2
}

fn default_true() -> bool {
    true
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            nmap_path: default_nmap_path(),
            timeout_seconds: default_probe_timeout(),
            detect_os: true,
            max_concurrent: default_probe_concurrency(),
        }
    }
}

/// TLS auditor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Per-port negotiation timeout in seconds
    #[serde(default = "default_tls_timeout")]
    pub timeout_seconds: u64,

    /// Maximum candidate ports audited per scan
    #[serde(default = "default_tls_max_ports")]
    pub max_ports: usize,

    /// Maximum concurrent audits across all scans
    #[serde(default = "default_tls_concurrency")]
    pub max_concurrent: usize,
}

fn default_tls_timeout() -> u64 {
    60
}

fn default_tls_max_ports() -> usize {
    3
}

fn default_tls_concurrency() -> usize {
    8
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_tls_timeout(),
            max_ports: default_tls_max_ports(),
            max_concurrent: default_tls_concurrency(),
        }
    }
}

/// Advisory source (NVD) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisoryConfig {
    /// NVD API base URL
    #[serde(default = "default_nvd_url")]
    pub api_url: String,

    /// NVD API key (optional, for higher rate limits)
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_advisory_timeout")]
    pub timeout_seconds: u64,

    /// Retry attempts on transient failure
    #[serde(default = "default_advisory_retries")]
    pub max_attempts: u32,

    /// Result cap per advisory query
    #[serde(default = "default_max_per_query")]
    pub max_results_per_query: u32,

    /// Finding cap per enriched service
    #[serde(default = "default_max_per_service")]
    pub max_findings_per_service: usize,
}

fn default_nvd_url() -> String {
    String::from("https://services.nvd.nist.gov/rest/json/cves/2.0")
}

fn default_advisory_timeout() -> u64 {
    30
}

fn default_advisory_retries() -> u32 {
    3
}

fn default_max_per_query() -> u32 {
    20
}

fn default_max_per_service() -> usize {
    10
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            api_url: default_nvd_url(),
            api_key: None,
            timeout_seconds: default_advisory_timeout(),
            max_attempts: default_advisory_retries(),
            max_results_per_query: default_max_per_query(),
            max_findings_per_service: default_max_per_service(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    String::from("info")
}

fn default_log_format() -> String {
    String::from("pretty")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Builder for constructing EngineConfig
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    pub fn nmap_path(mut self, path: impl Into<String>) -> Self {
        self.config.probe.nmap_path = path.into();
        self
    }

    pub fn probe_timeout(mut self, seconds: u64) -> Self {
        self.config.probe.timeout_seconds = seconds;
        self
    }

    pub fn detect_os(mut self, enabled: bool) -> Self {
        self.config.probe.detect_os = enabled;
        self
    }

    pub fn nvd_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.advisory.api_key = Some(key.into());
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
