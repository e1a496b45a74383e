//! TLS audit result types

use crate::cert::CertificateReport;
use crate::grade::Grade;
use serde::{Deserialize, Serialize};
use surfacescan_core::Finding;

/// Protocol versions accepted by the server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolSupport {
    pub ssl2: bool,
    pub ssl3: bool,
    pub tls10: bool,
    pub tls11: bool,
    pub tls12: bool,
    pub tls13: bool,
}

impl ProtocolSupport {
    /// Whether any obsolete protocol (SSL 2.0 through TLS 1.1) is enabled
    pub fn any_obsolete(&self) -> bool {
        self.ssl2 || self.ssl3 || self.tls10 || self.tls11
    }
}

/// Complete result of auditing one port
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsAuditReport {
    pub target: String,
    pub port: u16,

    /// Accepted protocol versions
    pub protocols: ProtocolSupport,

    /// Cipher suites classified by strength
    #[serde(default)]
    pub weak_ciphers: Vec<String>,
    #[serde(default)]
    pub strong_ciphers: Vec<String>,

    /// Served certificate, when one could be retrieved
    pub certificate: Option<CertificateReport>,

    /// Weaknesses found on this port
    #[serde(default)]
    pub findings: Vec<Finding>,

    /// Letter grade, absent when the audit failed outright
    pub grade: Option<Grade>,

    /// Audit wall time
    pub elapsed_seconds: f64,

    /// Negotiation failure for this port only
    pub error: Option<String>,
}

impl TlsAuditReport {
    pub fn new(target: impl Into<String>, port: u16) -> Self {
        Self {
            target: target.into(),
            port,
            protocols: ProtocolSupport::default(),
            weak_ciphers: Vec::new(),
            strong_ciphers: Vec::new(),
            certificate: None,
            findings: Vec::new(),
            grade: None,
            elapsed_seconds: 0.0,
            error: None,
        }
    }

    /// Failed audit carrying only the error
    pub fn failed(target: impl Into<String>, port: u16, error: impl Into<String>) -> Self {
        let mut report = Self::new(target, port);
        report.error = Some(error.into());
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_obsolete() {
        let mut protocols = ProtocolSupport {
            tls12: true,
            tls13: true,
            ..Default::default()
        };
        assert!(!protocols.any_obsolete());
        protocols.tls10 = true;
        assert!(protocols.any_obsolete());
    }

    #[test]
    fn test_failed_report() {
        let report = TlsAuditReport::failed("example.com", 8443, "connection refused");
        assert_eq!(report.port, 8443);
        assert!(report.grade.is_none());
        assert_eq!(report.error.as_deref(), Some("connection refused"));
        assert!(report.findings.is_empty());
    }
}
