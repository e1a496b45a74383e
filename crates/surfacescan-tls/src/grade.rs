//! TLS letter grading
//!
//! Deterministic deduction table over one port's audit report. The same
//! report always produces the same grade.

use crate::report::TlsAuditReport;
use serde::{Deserialize, Serialize};
use surfacescan_core::Severity;

/// Transport-security letter grade for one negotiated endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }

    /// Map a numeric score to a letter
    pub fn from_points(points: i32) -> Self {
        match points {
            p if p >= 90 => Grade::A,
            p if p >= 80 => Grade::B,
            p if p >= 65 => Grade::C,
            p if p >= 50 => Grade::D,
            _ => Grade::F,
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compute the numeric grading score for an audit report.
///
/// Starts at 100 and applies fixed deductions:
/// obsolete protocols (SSL2 -50, SSL3 -40, TLS1.0 -20, TLS1.1 -10),
/// +10 for TLS 1.3, per-finding severity (CRITICAL -40, HIGH -25,
/// MEDIUM -15, LOW -5), -2 per weak cipher, -30 expired certificate,
/// -20 self-signed.
pub fn score_points(report: &TlsAuditReport) -> i32 {
    let mut score: i32 = 100;

    let protocols = &report.protocols;
    if protocols.ssl2 {
        score -= 50;
    }
    if protocols.ssl3 {
        score -= 40;
    }
    if protocols.tls10 {
        score -= 20;
    }
    if protocols.tls11 {
        score -= 10;
    }
    if protocols.tls13 {
        score += 10;
    }

    for finding in &report.findings {
        score -= match finding.severity {
            Severity::Critical => 40,
            Severity::High => 25,
            Severity::Medium => 15,
            Severity::Low => 5,
            Severity::Info => 0,
        };
    }

    score -= 2 * report.weak_ciphers.len() as i32;

    if let Some(cert) = &report.certificate {
        if cert.is_expired {
            score -= 30;
        }
        if cert.is_self_signed {
            score -= 20;
        }
    }

    score
}

/// Grade an audit report
pub fn calculate(report: &TlsAuditReport) -> Grade {
    Grade::from_points(score_points(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::CertificateReport;
    use surfacescan_core::{Finding, FindingCategory};

    fn base_report() -> TlsAuditReport {
        let mut report = TlsAuditReport::new("example.com", 443);
        report.protocols.tls12 = true;
        report
    }

    fn finding(severity: Severity) -> Finding {
        Finding::builder(FindingCategory::TlsWeak, "test")
            .severity(severity)
            .build()
    }

    fn cert(expired: bool, self_signed: bool) -> CertificateReport {
        CertificateReport {
            subject: "CN=a".into(),
            issuer: if self_signed { "CN=a" } else { "CN=b" }.into(),
            serial_number: "01".into(),
            not_before: None,
            not_after: None,
            is_expired: expired,
            days_until_expiry: None,
            is_self_signed: self_signed,
            signature_algorithm: None,
            san_domains: vec![],
        }
    }

    #[test]
    fn test_clean_modern_config_grades_a() {
        let mut report = base_report();
        report.protocols.tls13 = true;
        assert_eq!(score_points(&report), 110);
        assert_eq!(calculate(&report), Grade::A);
    }

    #[test]
    fn test_protocol_deductions() {
        let mut report = base_report();
        report.protocols.tls11 = true;
        assert_eq!(score_points(&report), 90);
        report.protocols.tls10 = true;
        assert_eq!(score_points(&report), 70);
        report.protocols.ssl3 = true;
        assert_eq!(score_points(&report), 30);
        report.protocols.ssl2 = true;
        assert_eq!(score_points(&report), -20);
        assert_eq!(calculate(&report), Grade::F);
    }

    #[test]
    fn test_severity_deductions() {
        let mut report = base_report();
        report.findings.push(finding(Severity::Critical));
        assert_eq!(score_points(&report), 60);
        report.findings.push(finding(Severity::High));
        assert_eq!(score_points(&report), 35);
        report.findings.push(finding(Severity::Medium));
        assert_eq!(score_points(&report), 20);
        report.findings.push(finding(Severity::Low));
        assert_eq!(score_points(&report), 15);
        report.findings.push(finding(Severity::Info));
        assert_eq!(score_points(&report), 15);
    }

    #[test]
    fn test_weak_cipher_deduction() {
        let mut report = base_report();
        report.weak_ciphers = vec!["a".into(), "b".into(), "c".into()];
        assert_eq!(score_points(&report), 94);
    }

    #[test]
    fn test_certificate_deductions() {
        let mut report = base_report();
        report.certificate = Some(cert(true, false));
        assert_eq!(score_points(&report), 70);
        report.certificate = Some(cert(false, true));
        assert_eq!(score_points(&report), 80);
        report.certificate = Some(cert(true, true));
        assert_eq!(score_points(&report), 50);
        assert_eq!(calculate(&report), Grade::D);
    }

    #[test]
    fn test_letter_boundaries() {
        assert_eq!(Grade::from_points(90), Grade::A);
        assert_eq!(Grade::from_points(89), Grade::B);
        assert_eq!(Grade::from_points(80), Grade::B);
        assert_eq!(Grade::from_points(79), Grade::C);
        assert_eq!(Grade::from_points(65), Grade::C);
        assert_eq!(Grade::from_points(64), Grade::D);
        assert_eq!(Grade::from_points(50), Grade::D);
        assert_eq!(Grade::from_points(49), Grade::F);
        assert_eq!(Grade::from_points(-100), Grade::F);
    }

    #[test]
    fn test_monotonic_in_weakness() {
        // Strictly weaker configuration never grades better
        let mut weaker = base_report();
        let baseline = score_points(&weaker);

        weaker.protocols.tls10 = true;
        let with_tls10 = score_points(&weaker);
        assert!(with_tls10 < baseline);

        weaker.weak_ciphers.push("TLS_RSA_WITH_RC4_128_SHA".into());
        let with_rc4 = score_points(&weaker);
        assert!(with_rc4 < with_tls10);

        weaker.findings.push(finding(Severity::High));
        assert!(score_points(&weaker) < with_rc4);
    }
}
