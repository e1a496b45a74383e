//! Error types for the SurfaceScan engine

use thiserror::Error;

/// Result type alias using SurfaceScan Error
pub type Result<T> = std::result::Result<T, Error>;

/// SurfaceScan error types
#[derive(Error, Debug)]
pub enum Error {
    // === Probing Errors ===
    #[error("Probing tool not available: {0}")]
    ToolUnavailable(String),

    #[error("Probing tool timed out after {seconds}s")]
    ToolTimeout { seconds: u64 },

    #[error("Probing tool requires elevated privileges: {0}")]
    PrivilegeRequired(String),

    #[error("Probing tool failed: {0}")]
    ToolFailed(String),

    // === TLS Errors ===
    #[error("TLS negotiation failed for {target}:{port}: {message}")]
    Negotiation {
        target: String,
        port: u16,
        message: String,
    },

    #[error("DNS resolution failed for: {hostname}")]
    DnsResolutionFailed { hostname: String },

    // === Advisory Source Errors ===
    #[error("Advisory source error: {0}")]
    RemoteService(String),

    #[error("Advisory source rate limited: retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u32 },

    // === Target Errors ===
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    // === Lifecycle Errors ===
    #[error("Scan cancelled: {reason}")]
    ScanCancelled { reason: String },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Configuration(String),

    // === IO / Serialization ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RemoteService(_) | Error::RateLimited { .. } | Error::ToolTimeout { .. }
        )
    }

    /// Check if this error is recovered locally by the orchestrator
    /// (degrades a phase instead of aborting the scan)
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Error::ScanCancelled { .. } | Error::InvalidTarget(_) | Error::Configuration(_)
        )
    }

    /// Get an error code for logging/metrics
    pub fn code(&self) -> &'static str {
        match self {
            Error::ToolUnavailable(_) => "TOOL_UNAVAILABLE",
            Error::ToolTimeout { .. } => "TOOL_TIMEOUT",
            Error::PrivilegeRequired(_) => "TOOL_PRIVILEGE",
            Error::ToolFailed(_) => "TOOL_FAILED",
            Error::Negotiation { .. } => "TLS_NEGOTIATION",
            Error::DnsResolutionFailed { .. } => "DNS_FAILED",
            Error::RemoteService(_) => "REMOTE_SERVICE",
            Error::RateLimited { .. } => "RATE_LIMITED",
            Error::InvalidTarget(_) => "INVALID_TARGET",
            Error::ScanCancelled { .. } => "SCAN_CANCELLED",
            Error::Configuration(_) => "CONFIG_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(Error::RemoteService("503".into()).is_retryable());
        assert!(Error::RateLimited {
            retry_after_seconds: 6
        }
        .is_retryable());
        assert!(!Error::InvalidTarget("".into()).is_retryable());
    }

    #[test]
    fn test_recoverable() {
        assert!(Error::ToolFailed("nmap exited 1".into()).is_recoverable());
        assert!(Error::PrivilegeRequired("-O".into()).is_recoverable());
        assert!(!Error::ScanCancelled {
            reason: "timeout".into()
        }
        .is_recoverable());
        assert!(!Error::InvalidTarget("http://".into()).is_recoverable());
    }

    #[test]
    fn test_codes() {
        assert_eq!(
            Error::ToolTimeout { seconds: 300 }.code(),
            "TOOL_TIMEOUT"
        );
        assert_eq!(
            Error::DnsResolutionFailed {
                hostname: "x".into()
            }
            .code(),
            "DNS_FAILED"
        );
    }
}
