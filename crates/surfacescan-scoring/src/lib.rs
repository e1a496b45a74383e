//! SurfaceScan Scoring - Exposure score calculation
//!
//! A pure function from the union of scan findings to one bounded score,
//! a risk level, and a per-source breakdown. All weights and port classes
//! are compile-time constants so identical inputs always produce identical
//! scores, including under concurrent scans.

use serde::{Deserialize, Serialize};
use surfacescan_core::{Finding, Service, Severity};
use tracing::debug;

/// Finding weights by severity
const WEIGHT_CRITICAL: u32 = 25;
const WEIGHT_HIGH: u32 = 15;
const WEIGHT_MEDIUM: u32 = 8;
const WEIGHT_LOW: u32 = 3;
const WEIGHT_INFO: u32 = 1;

/// Port exposure weights
const WEIGHT_PORT_CRITICAL: u32 = 15;
const WEIGHT_PORT_HIGH: u32 = 10;
const WEIGHT_PORT_OTHER: u32 = 5;

/// Inherently insecure service weight
const WEIGHT_RISKY_SERVICE: u32 = 10;

/// Penalty for a TLS grade the table does not know
const UNKNOWN_GRADE_PENALTY: u32 = 20;

/// Ports that should never face the internet: cleartext remote shells,
/// file transfer, legacy RPC, SMB, direct database access
pub const CRITICAL_PORTS: &[u16] = &[
    21,   // FTP
    23,   // Telnet
    69,   // TFTP
    111,  // RPC
    135,  // MSRPC
    137,  // NetBIOS
    138,  // NetBIOS
    139,  // NetBIOS
    445,  // SMB
    512,  // rexec
    513,  // rlogin
    514,  // rsh/syslog
    1433, // MSSQL
    1521, // Oracle
    2049, // NFS
    5800, // VNC HTTP
    5900, // VNC
    6000, // X11
];

/// High-risk exposure: remote desktop, databases, mail, directory, caches
pub const HIGH_RISK_PORTS: &[u16] = &[
    22,    // SSH
    25,    // SMTP
    53,    // DNS
    110,   // POP3
    143,   // IMAP
    161,   // SNMP
    389,   // LDAP
    636,   // LDAPS
    1723,  // PPTP VPN
    3306,  // MySQL
    3389,  // RDP
    5432,  // PostgreSQL
    5985,  // WinRM HTTP
    5986,  // WinRM HTTPS
    6379,  // Redis
    8080,  // HTTP Alt
    9200,  // Elasticsearch
    27017, // MongoDB
];

/// Inherently insecure cleartext protocols, matched by substring on the
/// reported service name
pub const RISKY_SERVICES: &[&str] = &[
    "telnet", "ftp", "rsh", "rlogin", "rexec", "finger", "tftp", "snmp",
];

/// TLS grade penalty table
const GRADE_PENALTIES: &[(&str, u32)] = &[("A", 0), ("B", 5), ("C", 15), ("D", 25), ("F", 40)];

/// Risk level derived from the displayed score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    #[default]
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Map a displayed score to a risk level
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s >= 80 => RiskLevel::Critical,
            s if s >= 60 => RiskLevel::High,
            s if s >= 40 => RiskLevel::Medium,
            s if s >= 20 => RiskLevel::Low,
            _ => RiskLevel::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Info => "INFO",
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Exposure score with its full breakdown
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Displayed score, capped at 100
    pub score: u32,
    /// Uncapped sum of the four sub-scores
    pub raw_score: u32,
    pub risk_level: RiskLevel,

    /// Sub-scores
    pub vuln_score: u32,
    pub port_score: u32,
    pub tls_score: u32,
    pub service_score: u32,

    /// Finding counts by severity
    pub nb_critical: u32,
    pub nb_high: u32,
    pub nb_medium: u32,
    pub nb_low: u32,
    pub nb_info: u32,
    pub total_vulnerabilities: u32,

    /// Service counts and classified ports
    pub nb_services_exposed: u32,
    #[serde(default)]
    pub critical_ports: Vec<u16>,
    #[serde(default)]
    pub high_risk_ports: Vec<u16>,
    #[serde(default)]
    pub other_ports: Vec<u16>,
    #[serde(default)]
    pub risky_services: Vec<String>,

    /// Grade echo
    pub tls_grade: Option<String>,
}

/// Exposure score calculator
///
/// Stateless; construct once and share freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExposureScorer;

impl ExposureScorer {
    pub fn new() -> Self {
        Self
    }

    /// Compute the exposure score for one scan's merged findings
    pub fn score(
        &self,
        findings: &[Finding],
        services: &[Service],
        tls_grade: Option<&str>,
    ) -> ScoreBreakdown {
        let mut breakdown = ScoreBreakdown::default();

        let vuln_score = self.vuln_score(findings, &mut breakdown);
        let port_score = self.port_score(services, &mut breakdown);
        let tls_score = self.tls_score(tls_grade, &mut breakdown);
        let service_score = self.service_score(services, &mut breakdown);

        breakdown.vuln_score = vuln_score;
        breakdown.port_score = port_score;
        breakdown.tls_score = tls_score;
        breakdown.service_score = service_score;

        breakdown.raw_score = breakdown.vuln_score
            + breakdown.port_score
            + breakdown.tls_score
            + breakdown.service_score;
        breakdown.score = breakdown.raw_score.min(100);
        breakdown.risk_level = RiskLevel::from_score(breakdown.score);

        breakdown.total_vulnerabilities = findings.len() as u32;
        breakdown.nb_services_exposed = services.len() as u32;

        debug!(
            score = breakdown.score,
            raw = breakdown.raw_score,
            risk = %breakdown.risk_level,
            "Exposure score computed"
        );

        breakdown
    }

    fn vuln_score(&self, findings: &[Finding], breakdown: &mut ScoreBreakdown) -> u32 {
        let mut score = 0;
        for finding in findings {
            score += match finding.severity {
                Severity::Critical => {
                    breakdown.nb_critical += 1;
                    WEIGHT_CRITICAL
                }
                Severity::High => {
                    breakdown.nb_high += 1;
                    WEIGHT_HIGH
                }
                Severity::Medium => {
                    breakdown.nb_medium += 1;
                    WEIGHT_MEDIUM
                }
                Severity::Low => {
                    breakdown.nb_low += 1;
                    WEIGHT_LOW
                }
                Severity::Info => {
                    breakdown.nb_info += 1;
                    WEIGHT_INFO
                }
            };
        }
        score
    }

    fn port_score(&self, services: &[Service], breakdown: &mut ScoreBreakdown) -> u32 {
        let mut score = 0;
        for svc in services {
            if CRITICAL_PORTS.contains(&svc.port) {
                score += WEIGHT_PORT_CRITICAL;
                breakdown.critical_ports.push(svc.port);
            } else if HIGH_RISK_PORTS.contains(&svc.port) {
                score += WEIGHT_PORT_HIGH;
                breakdown.high_risk_ports.push(svc.port);
            } else {
                score += WEIGHT_PORT_OTHER;
                breakdown.other_ports.push(svc.port);
            }
        }
        score
    }

    fn tls_score(&self, tls_grade: Option<&str>, breakdown: &mut ScoreBreakdown) -> u32 {
        let Some(grade) = tls_grade else {
            return 0;
        };

        let grade = grade.to_ascii_uppercase();
        let penalty = GRADE_PENALTIES
            .iter()
            .find(|(letter, _)| *letter == grade)
            .map(|(_, penalty)| *penalty)
            .unwrap_or(UNKNOWN_GRADE_PENALTY);

        breakdown.tls_grade = Some(grade);
        penalty
    }

    fn service_score(&self, services: &[Service], breakdown: &mut ScoreBreakdown) -> u32 {
        let mut score = 0;
        for svc in services {
            let name = svc.name.to_ascii_lowercase();
            if RISKY_SERVICES.iter().any(|risky| name.contains(risky)) {
                score += WEIGHT_RISKY_SERVICE;
                breakdown.risky_services.push(name);
            }
        }
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surfacescan_core::FindingCategory;

    fn finding(severity: Severity) -> Finding {
        Finding::builder(FindingCategory::ServiceVuln, "test")
            .severity(severity)
            .build()
    }

    fn service(port: u16, name: &str) -> Service {
        Service::open(port, "tcp", name)
    }

    #[test]
    fn test_empty_scan_scores_zero() {
        // Example 1: nothing found at all
        let breakdown = ExposureScorer::new().score(&[], &[], None);
        assert_eq!(breakdown.raw_score, 0);
        assert_eq!(breakdown.score, 0);
        assert_eq!(breakdown.risk_level, RiskLevel::Info);
        assert_eq!(breakdown.total_vulnerabilities, 0);
        assert_eq!(breakdown.nb_services_exposed, 0);
    }

    #[test]
    fn test_critical_vuln_plus_critical_port() {
        // Example 2: one CRITICAL finding + one critical-table port
        let findings = vec![finding(Severity::Critical)];
        let services = vec![service(23, "telnet")];
        let breakdown = ExposureScorer::new().score(&findings, &services, None);

        assert_eq!(breakdown.vuln_score, 25);
        assert_eq!(breakdown.port_score, 15);
        // telnet also trips the risky-service table
        assert_eq!(breakdown.service_score, 10);
        assert_eq!(breakdown.raw_score, 50);
        assert_eq!(breakdown.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_critical_port_alone() {
        // Example 2 in its pure form: vuln 25 + port 15 = 40, MEDIUM
        let findings = vec![finding(Severity::Critical)];
        let services = vec![service(1433, "ms-sql-s")];
        let breakdown = ExposureScorer::new().score(&findings, &services, None);

        assert_eq!(breakdown.raw_score, 25 + 15);
        assert_eq!(breakdown.risk_level, RiskLevel::Medium);
        assert_eq!(breakdown.critical_ports, vec![1433]);
    }

    #[test]
    fn test_tls_grade_f_alone() {
        // Example 3: grade F alone scores 40, MEDIUM
        let breakdown = ExposureScorer::new().score(&[], &[], Some("F"));
        assert_eq!(breakdown.tls_score, 40);
        assert_eq!(breakdown.raw_score, 40);
        assert_eq!(breakdown.risk_level, RiskLevel::Medium);
        assert_eq!(breakdown.tls_grade.as_deref(), Some("F"));
    }

    #[test]
    fn test_five_high_findings() {
        // Example 4: 5 HIGH findings = 75, HIGH
        let findings: Vec<_> = (0..5).map(|_| finding(Severity::High)).collect();
        let breakdown = ExposureScorer::new().score(&findings, &[], None);
        assert_eq!(breakdown.raw_score, 75);
        assert_eq!(breakdown.score, 75);
        assert_eq!(breakdown.risk_level, RiskLevel::High);
        assert_eq!(breakdown.nb_high, 5);
    }

    #[test]
    fn test_port_classes_only() {
        // Example 5: one critical port + one high-risk port = 25, LOW
        let services = vec![service(445, "microsoft-ds"), service(3389, "ms-wbt-server")];
        let breakdown = ExposureScorer::new().score(&[], &services, None);
        assert_eq!(breakdown.raw_score, 15 + 10);
        assert_eq!(breakdown.risk_level, RiskLevel::Low);
        assert_eq!(breakdown.critical_ports, vec![445]);
        assert_eq!(breakdown.high_risk_ports, vec![3389]);
    }

    #[test]
    fn test_raw_score_is_sum_of_subscores() {
        let findings = vec![
            finding(Severity::Critical),
            finding(Severity::Medium),
            finding(Severity::Info),
        ];
        let services = vec![
            service(21, "ftp"),
            service(22, "ssh"),
            service(8443, "https-alt"),
        ];
        let breakdown = ExposureScorer::new().score(&findings, &services, Some("C"));

        assert_eq!(
            breakdown.raw_score,
            breakdown.vuln_score
                + breakdown.port_score
                + breakdown.tls_score
                + breakdown.service_score
        );
        assert_eq!(breakdown.vuln_score, 25 + 8 + 1);
        assert_eq!(breakdown.port_score, 15 + 10 + 5);
        assert_eq!(breakdown.tls_score, 15);
        assert_eq!(breakdown.service_score, 10);
        assert_eq!(breakdown.score, breakdown.raw_score.min(100));
    }

    #[test]
    fn test_displayed_score_capped_at_100() {
        let findings: Vec<_> = (0..10).map(|_| finding(Severity::Critical)).collect();
        let breakdown = ExposureScorer::new().score(&findings, &[], Some("F"));
        assert_eq!(breakdown.raw_score, 290);
        assert_eq!(breakdown.score, 100);
        assert_eq!(breakdown.risk_level, RiskLevel::Critical);
    }

    #[test]
    fn test_unknown_grade_penalty() {
        let breakdown = ExposureScorer::new().score(&[], &[], Some("E"));
        assert_eq!(breakdown.tls_score, 20);
    }

    #[test]
    fn test_grade_is_case_insensitive() {
        let breakdown = ExposureScorer::new().score(&[], &[], Some("b"));
        assert_eq!(breakdown.tls_score, 5);
        assert_eq!(breakdown.tls_grade.as_deref(), Some("B"));
    }

    #[test]
    fn test_risk_level_boundaries() {
        assert_eq!(RiskLevel::from_score(80), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(79), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(60), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(59), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(40), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(39), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(20), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(19), RiskLevel::Info);
    }

    #[test]
    fn test_determinism() {
        let findings = vec![finding(Severity::High), finding(Severity::Low)];
        let services = vec![service(22, "ssh"), service(80, "http")];

        let scorer = ExposureScorer::new();
        let first = scorer.score(&findings, &services, Some("B"));
        let second = scorer.score(&findings, &services, Some("B"));

        assert_eq!(first.score, second.score);
        assert_eq!(first.raw_score, second.raw_score);
        assert_eq!(first.risk_level, second.risk_level);
        assert_eq!(first.vuln_score, second.vuln_score);
        assert_eq!(first.port_score, second.port_score);
        assert_eq!(first.tls_score, second.tls_score);
        assert_eq!(first.service_score, second.service_score);
    }

    #[test]
    fn test_severity_tallies_match_distribution() {
        let findings = vec![
            finding(Severity::Critical),
            finding(Severity::Critical),
            finding(Severity::High),
            finding(Severity::Low),
            finding(Severity::Info),
        ];
        let breakdown = ExposureScorer::new().score(&findings, &[], None);
        assert_eq!(breakdown.nb_critical, 2);
        assert_eq!(breakdown.nb_high, 1);
        assert_eq!(breakdown.nb_medium, 0);
        assert_eq!(breakdown.nb_low, 1);
        assert_eq!(breakdown.nb_info, 1);
        assert_eq!(breakdown.total_vulnerabilities, 5);
    }
}
