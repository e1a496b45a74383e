//! Scan result aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surfacescan_core::{Finding, Service, Severity, Target};
use surfacescan_probe::Fingerprint;
use surfacescan_scoring::ScoreBreakdown;
use surfacescan_tls::TlsAuditReport;

/// Scan run lifecycle state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScanStatus {
    #[default]
    Pending,
    Running,
    Success,
    Error,
}

/// Opaque correlation identifiers passed through from the caller.
/// The engine never interprets these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
    pub target_id: Option<String>,
    pub scan_id: Option<String>,
}

/// Complete result of one scan run.
///
/// Created PENDING, owned and mutated by the orchestrator while RUNNING,
/// immutable once SUCCESS or ERROR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub status: ScanStatus,
    pub target: Target,
    #[serde(default)]
    pub correlation: Correlation,

    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_seconds: f64,

    #[serde(default)]
    pub services: Vec<Service>,
    pub fingerprint: Fingerprint,
    #[serde(default)]
    pub tls_reports: Vec<TlsAuditReport>,
    pub tls_grade: Option<String>,
    #[serde(default)]
    pub findings: Vec<Finding>,
    pub breakdown: ScoreBreakdown,
    pub summary: ScanSummary,

    /// Advisory notes for degraded phases
    #[serde(default)]
    pub notes: Vec<String>,
    /// Probe command line, for audit trails
    pub raw_command: Option<String>,

    pub error_message: Option<String>,
}

impl ScanResult {
    /// New PENDING result for a target
    pub fn pending(target: Target, correlation: Correlation) -> Self {
        Self {
            status: ScanStatus::Pending,
            target,
            correlation,
            started_at: None,
            finished_at: None,
            duration_seconds: 0.0,
            services: Vec::new(),
            fingerprint: Fingerprint::default(),
            tls_reports: Vec::new(),
            tls_grade: None,
            findings: Vec::new(),
            breakdown: ScoreBreakdown::default(),
            summary: ScanSummary::default(),
            notes: Vec::new(),
            raw_command: None,
            error_message: None,
        }
    }

    /// Transition to RUNNING and stamp the start time
    pub fn begin(&mut self) {
        self.status = ScanStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Terminal SUCCESS; stamps finish time and duration
    pub fn succeed(&mut self) {
        self.status = ScanStatus::Success;
        self.finish();
    }

    /// Terminal ERROR with a non-empty message; stamps finish time and duration
    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.status = ScanStatus::Error;
        self.error_message = Some(if message.is_empty() {
            String::from("scan failed")
        } else {
            message
        });
        self.finish();
    }

    fn finish(&mut self) {
        let finished = Utc::now();
        self.finished_at = Some(finished);
        if let Some(started) = self.started_at {
            self.duration_seconds = (finished - started)
                .to_std()
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0);
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, ScanStatus::Success | ScanStatus::Error)
    }
}

/// Summary counts over one scan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanSummary {
    pub nb_services_exposed: u32,
    pub ports_scanned: u32,

    pub nb_vuln_critical: u32,
    pub nb_vuln_high: u32,
    pub nb_vuln_medium: u32,
    pub nb_vuln_low: u32,
    pub nb_vuln_info: u32,
    pub nb_vuln_total: u32,

    pub exposure_score: u32,
    pub risk_level: String,
    pub tls_grade: Option<String>,

    /// Fingerprint echo
    pub os_name: Option<String>,
    pub ip_address: Option<String>,
    pub hostname: Option<String>,
}

/// Build the summary from merged scan outputs
pub fn build_summary(
    services: &[Service],
    findings: &[Finding],
    breakdown: &ScoreBreakdown,
    tls_grade: Option<&str>,
    fingerprint: &Fingerprint,
) -> ScanSummary {
    let mut summary = ScanSummary {
        nb_services_exposed: services.len() as u32,
        ports_scanned: services.len() as u32,
        nb_vuln_total: findings.len() as u32,
        exposure_score: breakdown.score,
        risk_level: breakdown.risk_level.to_string(),
        tls_grade: tls_grade.map(String::from),
        os_name: fingerprint.os.as_ref().and_then(|os| os.name.clone()),
        ip_address: fingerprint.ip_address.clone(),
        hostname: fingerprint.hostname.clone(),
        ..Default::default()
    };

    for finding in findings {
        match finding.severity {
            Severity::Critical => summary.nb_vuln_critical += 1,
            Severity::High => summary.nb_vuln_high += 1,
            Severity::Medium => summary.nb_vuln_medium += 1,
            Severity::Low => summary.nb_vuln_low += 1,
            Severity::Info => summary.nb_vuln_info += 1,
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use surfacescan_core::{FindingCategory, TargetKind};

    fn target() -> Target {
        Target::new(TargetKind::Domain, "example.com").unwrap()
    }

    #[test]
    fn test_lifecycle_success() {
        let mut result = ScanResult::pending(target(), Correlation::default());
        assert_eq!(result.status, ScanStatus::Pending);
        assert!(!result.is_terminal());

        result.begin();
        assert_eq!(result.status, ScanStatus::Running);
        assert!(result.started_at.is_some());

        result.succeed();
        assert_eq!(result.status, ScanStatus::Success);
        assert!(result.is_terminal());
        assert!(result.finished_at.is_some());
    }

    #[test]
    fn test_error_always_has_message_and_duration() {
        let mut result = ScanResult::pending(target(), Correlation::default());
        result.begin();
        result.fail("");

        assert_eq!(result.status, ScanStatus::Error);
        assert!(!result.error_message.as_deref().unwrap().is_empty());
        assert!(result.finished_at.is_some());
    }

    #[test]
    fn test_duration_matches_timestamps() {
        let mut result = ScanResult::pending(target(), Correlation::default());
        result.begin();
        std::thread::sleep(std::time::Duration::from_millis(20));
        result.succeed();

        let started = result.started_at.unwrap();
        let finished = result.finished_at.unwrap();
        let wall = (finished - started).to_std().unwrap().as_secs_f64();
        assert!((wall - result.duration_seconds).abs() < 0.005);
        assert!(result.duration_seconds >= 0.02);
    }

    #[test]
    fn test_summary_tallies() {
        let findings = vec![
            Finding::builder(FindingCategory::ServiceVuln, "a")
                .severity(Severity::Critical)
                .build(),
            Finding::builder(FindingCategory::TlsWeak, "b")
                .severity(Severity::Medium)
                .build(),
            Finding::builder(FindingCategory::PortExposed, "c")
                .severity(Severity::High)
                .build(),
        ];
        let services = vec![Service::open(80, "tcp", "http")];
        let breakdown = ScoreBreakdown {
            score: 48,
            risk_level: surfacescan_scoring::RiskLevel::Medium,
            ..Default::default()
        };

        let summary = build_summary(
            &services,
            &findings,
            &breakdown,
            Some("B"),
            &Fingerprint::default(),
        );

        assert_eq!(summary.nb_services_exposed, 1);
        assert_eq!(summary.nb_vuln_total, 3);
        assert_eq!(summary.nb_vuln_critical, 1);
        assert_eq!(summary.nb_vuln_high, 1);
        assert_eq!(summary.nb_vuln_medium, 1);
        assert_eq!(summary.exposure_score, 48);
        assert_eq!(summary.risk_level, "MEDIUM");
        assert_eq!(summary.tls_grade.as_deref(), Some("B"));
    }
}
