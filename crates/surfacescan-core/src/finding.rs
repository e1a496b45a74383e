//! Finding definitions - vulnerabilities and exposures discovered during a scan

use crate::severity::{FindingCategory, Severity};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A vulnerability or exposure finding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Unique finding ID
    pub id: Uuid,

    /// Service context
    pub port: Option<u16>,
    pub protocol: Option<String>,
    pub service_name: Option<String>,
    pub service_version: Option<String>,

    /// Finding details
    pub category: FindingCategory,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub recommendation: Option<String>,

    /// CVE references
    #[serde(default)]
    pub cve_ids: Vec<String>,

    /// CVSS scoring (scheme version recorded alongside the score)
    pub cvss_score: Option<f64>,
    pub cvss_vector: Option<String>,
    pub cvss_version: Option<String>,

    /// External references
    #[serde(default)]
    pub references: Vec<String>,
}

impl Finding {
    /// Create a new finding builder
    pub fn builder(category: FindingCategory, title: impl Into<String>) -> FindingBuilder {
        FindingBuilder::new(category, title)
    }
}

/// Builder for constructing findings
pub struct FindingBuilder {
    finding: Finding,
}

impl FindingBuilder {
    pub fn new(category: FindingCategory, title: impl Into<String>) -> Self {
        Self {
            finding: Finding {
                id: Uuid::new_v4(),
                port: None,
                protocol: None,
                service_name: None,
                service_version: None,
                category,
                severity: Severity::Info,
                title: title.into(),
                description: String::new(),
                recommendation: None,
                cve_ids: Vec::new(),
                cvss_score: None,
                cvss_vector: None,
                cvss_version: None,
                references: Vec::new(),
            },
        }
    }

    pub fn port(mut self, port: u16, protocol: impl Into<String>) -> Self {
        self.finding.port = Some(port);
        self.finding.protocol = Some(protocol.into());
        self
    }

    pub fn service(mut self, name: impl Into<String>, version: Option<String>) -> Self {
        self.finding.service_name = Some(name.into());
        self.finding.service_version = version;
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.finding.severity = severity;
        self
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.finding.description = desc.into();
        self
    }

    pub fn recommendation(mut self, rec: impl Into<String>) -> Self {
        self.finding.recommendation = Some(rec.into());
        self
    }

    pub fn cve(mut self, cve_id: impl Into<String>) -> Self {
        self.finding.cve_ids.push(cve_id.into());
        self
    }

    pub fn cves(mut self, cve_ids: Vec<String>) -> Self {
        self.finding.cve_ids = cve_ids;
        self
    }

    pub fn cvss(mut self, score: f64) -> Self {
        self.finding.cvss_score = Some(score);
        self
    }

    pub fn cvss_vector(mut self, vector: impl Into<String>, version: impl Into<String>) -> Self {
        self.finding.cvss_vector = Some(vector.into());
        self.finding.cvss_version = Some(version.into());
        self
    }

    pub fn reference(mut self, url: impl Into<String>) -> Self {
        self.finding.references.push(url.into());
        self
    }

    pub fn references(mut self, urls: Vec<String>) -> Self {
        self.finding.references = urls;
        self
    }

    pub fn build(self) -> Finding {
        self.finding
    }
}

/// An exposed network service, unique per (port, protocol) within one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub port: u16,
    pub protocol: String,
    pub state: PortState,
    pub name: String,
    pub product: Option<String>,
    pub version: Option<String>,
    pub banner: Option<String>,
    /// Platform identifier (CPE) reported by the probing tool
    pub platform_id: Option<String>,
}

impl Service {
    pub fn open(port: u16, protocol: &str, name: &str) -> Self {
        Self {
            port,
            protocol: protocol.to_string(),
            state: PortState::Open,
            name: name.to_string(),
            product: None,
            version: None,
            banner: None,
            platform_id: None,
        }
    }

    /// Combined "product version" display string, as stored on findings
    pub fn version_display(&self) -> Option<String> {
        let joined = format!(
            "{} {}",
            self.product.as_deref().unwrap_or(""),
            self.version.as_deref().unwrap_or("")
        );
        let joined = joined.trim().to_string();
        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    }

    /// Whether the service carries enough identity to be enriched
    pub fn is_enrichable(&self) -> bool {
        self.version.is_some() || self.product.is_some() || self.platform_id.is_some()
    }
}

/// Port state as reported by the probing tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    Open,
    Closed,
    Filtered,
    #[serde(rename = "open|filtered")]
    OpenFiltered,
}

impl PortState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortState::Open => "open",
            PortState::Closed => "closed",
            PortState::Filtered => "filtered",
            PortState::OpenFiltered => "open|filtered",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "open" => PortState::Open,
            "closed" => PortState::Closed,
            "filtered" => PortState::Filtered,
            _ => PortState::OpenFiltered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finding_builder() {
        let finding = Finding::builder(FindingCategory::ServiceVuln, "CVE-2021-41773")
            .port(443, "tcp")
            .service("http", Some("Apache httpd 2.4.49".into()))
            .severity(Severity::Critical)
            .description("Path traversal in Apache HTTP Server 2.4.49")
            .recommendation("Update Apache to 2.4.51 or later")
            .cve("CVE-2021-41773")
            .cvss(9.8)
            .cvss_vector("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:C/C:H/I:H/A:H", "3.1")
            .reference("https://httpd.apache.org/security/vulnerabilities_24.html")
            .build();

        assert_eq!(finding.severity, Severity::Critical);
        assert_eq!(finding.port, Some(443));
        assert_eq!(finding.cve_ids, vec!["CVE-2021-41773"]);
        assert_eq!(finding.cvss_version.as_deref(), Some("3.1"));
    }

    #[test]
    fn test_service_version_display() {
        let mut svc = Service::open(22, "tcp", "ssh");
        assert_eq!(svc.version_display(), None);
        svc.product = Some("OpenSSH".into());
        svc.version = Some("8.9p1".into());
        assert_eq!(svc.version_display().as_deref(), Some("OpenSSH 8.9p1"));
    }

    #[test]
    fn test_enrichable() {
        let mut svc = Service::open(80, "tcp", "http");
        assert!(!svc.is_enrichable());
        svc.platform_id = Some("cpe:2.3:a:nginx:nginx:1.18.0".into());
        assert!(svc.is_enrichable());
    }

    #[test]
    fn test_port_state_roundtrip() {
        assert_eq!(PortState::parse("open"), PortState::Open);
        assert_eq!(PortState::parse("open|filtered"), PortState::OpenFiltered);
        assert_eq!(PortState::OpenFiltered.as_str(), "open|filtered");
    }
}
