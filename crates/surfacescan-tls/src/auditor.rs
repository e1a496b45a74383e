//! TLS auditor - one audit per candidate port

use crate::cert;
use crate::grade;
use crate::probe::{self, wire};
use crate::report::TlsAuditReport;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::{Duration, Instant};
use surfacescan_common::TlsConfig;
use surfacescan_core::{Finding, FindingCategory, Severity};
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};

/// Per-connection timeout used by individual probes
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw handshake evidence collected for one port
#[derive(Debug, Default, Clone)]
struct HandshakeEvidence {
    ssl2: bool,
    ssl3_cipher: Option<u16>,
    tls10: bool,
    tls11: bool,
    tls12: bool,
    tls13_cipher: Option<u16>,
    accepted_tls12: Vec<&'static str>,
    compression: bool,
    heartbeat_vulnerable: bool,
    insecure_renegotiation: bool,
    static_rsa: bool,
    connect_error: Option<String>,
}

/// TLS/SSL auditor
///
/// Stateless apart from configuration; negotiation failures never escape
/// [`TlsAuditor::audit`] - they populate the per-port report instead.
#[derive(Debug, Clone)]
pub struct TlsAuditor {
    timeout: Duration,
}

impl TlsAuditor {
    pub fn new(config: &TlsConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    /// Audit one port. The returned report carries an `error` instead of
    /// findings when the port could not be negotiated at all.
    pub async fn audit(&self, host: &str, port: u16) -> TlsAuditReport {
        let started = Instant::now();
        info!(%host, port, "Starting TLS audit");

        let mut report = match tokio::time::timeout(self.timeout, self.run_audit(host, port)).await
        {
            Ok(report) => report,
            Err(_) => TlsAuditReport::failed(
                host,
                port,
                format!("audit timed out after {}s", self.timeout.as_secs()),
            ),
        };

        report.elapsed_seconds = started.elapsed().as_secs_f64();
        match (&report.grade, &report.error) {
            (Some(grade), _) => info!(%host, port, %grade, "TLS audit complete"),
            (None, Some(error)) => debug!(%host, port, error, "TLS audit failed"),
            _ => {}
        }
        report
    }

    async fn run_audit(&self, host: &str, port: u16) -> TlsAuditReport {
        let mut report = TlsAuditReport::new(host, port);

        // DNS resolution failure is its own negotiation sub-case
        let addr = {
            let host = host.to_string();
            let resolved =
                spawn_blocking(move || resolve_addr(&host, port)).await.unwrap_or_else(|e| {
                    Err(format!("resolver task failed: {}", e))
                });
            match resolved {
                Ok(addr) => addr,
                Err(message) => {
                    report.error = Some(message);
                    return report;
                }
            }
        };

        let evidence = {
            let host = host.to_string();
            spawn_blocking(move || collect_evidence(&host, &addr))
                .await
                .unwrap_or_else(|e| HandshakeEvidence {
                    connect_error: Some(format!("probe task failed: {}", e)),
                    ..Default::default()
                })
        };

        if let Some(connect_error) = &evidence.connect_error {
            report.error = Some(connect_error.clone());
            return report;
        }

        report.protocols.ssl2 = evidence.ssl2;
        report.protocols.ssl3 = evidence.ssl3_cipher.is_some();
        report.protocols.tls10 = evidence.tls10;
        report.protocols.tls11 = evidence.tls11;
        report.protocols.tls12 = evidence.tls12;
        report.protocols.tls13 = evidence.tls13_cipher.is_some();

        // Everything accepted under SSL 3.0 counts as weak
        if let Some(name) = evidence.ssl3_cipher.and_then(probe::suite_name) {
            report.weak_ciphers.push(format!("SSL3:{}", name));
        }
        for name in &evidence.accepted_tls12 {
            if probe::is_weak_cipher(name) {
                report.weak_ciphers.push(format!("TLS1.2:{}", name));
            } else {
                report.strong_ciphers.push(format!("TLS1.2:{}", name));
            }
        }
        if let Some(name) = evidence.tls13_cipher.and_then(probe::tls13_suite_name) {
            report.strong_ciphers.push(format!("TLS1.3:{}", name));
        }

        // Certificate retrieval is best-effort; a refusal is not fatal here
        let cert_result = {
            let host = host.to_string();
            spawn_blocking(move || cert::fetch_certificate(&host, &addr, PROBE_TIMEOUT)).await
        };
        match cert_result {
            Ok(Ok(certificate)) => report.certificate = certificate,
            Ok(Err(e)) => {
                warn!(%host, port, "Certificate retrieval failed: {}", e);
                if !report.protocols.any_obsolete()
                    && !report.protocols.tls12
                    && !report.protocols.tls13
                {
                    // Nothing negotiated at all: the port is not speaking TLS
                    report.error = Some(e);
                    return report;
                }
            }
            Err(e) => warn!(%host, port, "Certificate task failed: {}", e),
        }

        report.findings = derive_findings(&report, &evidence);
        report.grade = Some(grade::calculate(&report));
        report
    }
}

fn resolve_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    (host, port)
        .to_socket_addrs()
        .map_err(|e| format!("DNS resolution failed for {}: {}", host, e))?
        .next()
        .ok_or_else(|| format!("DNS resolution failed for {}: no addresses", host))
}

/// Run the full probe battery against one resolved address
fn collect_evidence(host: &str, addr: &SocketAddr) -> HandshakeEvidence {
    let mut evidence = HandshakeEvidence::default();

    // One connectivity gate before the battery
    if let Err(e) = probe::connect_tcp(addr, PROBE_TIMEOUT) {
        evidence.connect_error = Some(e);
        return evidence;
    }

    evidence.ssl2 = probe::probe_sslv2(addr, PROBE_TIMEOUT);
    evidence.ssl3_cipher =
        probe::probe_protocol_version(host, addr, wire::VERSION_SSL30, PROBE_TIMEOUT);
    evidence.tls10 =
        probe::probe_protocol_version(host, addr, wire::VERSION_TLS10, PROBE_TIMEOUT).is_some();
    evidence.tls11 =
        probe::probe_protocol_version(host, addr, wire::VERSION_TLS11, PROBE_TIMEOUT).is_some();
    evidence.tls12 =
        probe::probe_protocol_version(host, addr, wire::VERSION_TLS12, PROBE_TIMEOUT).is_some();
    evidence.tls13_cipher = probe::probe_tls13(host, addr, PROBE_TIMEOUT);

    if evidence.tls12 {
        for (suite, name) in probe::TLS12_PROBE_SUITES {
            if probe::probe_cipher_suite(host, addr, *suite, PROBE_TIMEOUT) {
                evidence.accepted_tls12.push(name);
            }
        }
        evidence.compression = probe::probe_compression(host, addr, PROBE_TIMEOUT);
        evidence.static_rsa = probe::probe_static_rsa(host, addr, PROBE_TIMEOUT);
        evidence.insecure_renegotiation =
            probe::probe_secure_renegotiation(host, addr, PROBE_TIMEOUT) == Some(false);
        evidence.heartbeat_vulnerable = probe::probe_heartbeat(host, addr, PROBE_TIMEOUT);
    }

    evidence
}

/// Derive the fixed set of named weaknesses from the collected evidence
fn derive_findings(report: &TlsAuditReport, evidence: &HandshakeEvidence) -> Vec<Finding> {
    let port = report.port;
    let mut findings = Vec::new();

    let tls_finding = |title: &str, severity: Severity| {
        Finding::builder(FindingCategory::TlsWeak, title)
            .port(port, "tcp")
            .service("https", None)
            .severity(severity)
    };

    if evidence.heartbeat_vulnerable {
        findings.push(
            tls_finding("Heartbleed", Severity::Critical)
                .description(
                    "Server leaks memory through malformed TLS heartbeat requests (CVE-2014-0160)",
                )
                .recommendation("Update OpenSSL immediately and rotate certificates and credentials")
                .cve("CVE-2014-0160")
                .cvss(9.8)
                .build(),
        );
    }

    if evidence.static_rsa {
        findings.push(
            tls_finding("ROBOT Attack", Severity::High)
                .description(
                    "Server accepts static RSA key exchange, exposing an RSA padding oracle",
                )
                .recommendation("Disable RSA key-exchange cipher suites")
                .cve("CVE-2017-13099")
                .cvss(7.5)
                .build(),
        );
    }

    if evidence.compression {
        findings.push(
            tls_finding("TLS Compression (CRIME)", Severity::Medium)
                .description("TLS compression is enabled, allowing the CRIME compression oracle")
                .recommendation("Disable TLS compression")
                .cve("CVE-2012-4929")
                .cvss(5.9)
                .build(),
        );
    }

    if evidence.insecure_renegotiation {
        findings.push(
            tls_finding("Insecure Session Renegotiation", Severity::Medium)
                .description("Server does not advertise secure renegotiation")
                .recommendation("Enable RFC 5746 secure renegotiation or disable renegotiation")
                .cve("CVE-2009-3555")
                .cvss(5.8)
                .build(),
        );
    }

    if report.protocols.ssl2 {
        findings.push(
            tls_finding("SSL 2.0 Enabled", Severity::Critical)
                .description("SSL 2.0 is an obsolete, insecure protocol")
                .recommendation("Disable SSL 2.0")
                .cvss(9.0)
                .build(),
        );
    }

    if report.protocols.ssl3 {
        findings.push(
            tls_finding("SSL 3.0 Enabled (POODLE)", Severity::High)
                .description("SSL 3.0 is vulnerable to the POODLE padding oracle")
                .recommendation("Disable SSL 3.0")
                .cve("CVE-2014-3566")
                .cvss(7.5)
                .build(),
        );
    }

    if report.protocols.tls10 {
        findings.push(
            tls_finding("TLS 1.0 Enabled", Severity::Medium)
                .description("TLS 1.0 is obsolete and should no longer be used")
                .recommendation("Migrate to TLS 1.2 or 1.3")
                .cvss(5.0)
                .build(),
        );
    }

    if report.protocols.tls11 {
        findings.push(
            tls_finding("TLS 1.1 Enabled", Severity::Low)
                .description("TLS 1.1 is obsolete")
                .recommendation("Migrate to TLS 1.2 or 1.3")
                .cvss(3.0)
                .build(),
        );
    }

    if let Some(cert) = &report.certificate {
        if cert.is_expired {
            findings.push(
                tls_finding("Expired Certificate", Severity::High)
                    .description("The served TLS certificate has expired")
                    .recommendation("Renew the certificate immediately")
                    .cvss(7.0)
                    .build(),
            );
        }
        if cert.is_self_signed {
            findings.push(
                tls_finding("Self-Signed Certificate", Severity::Medium)
                    .description("The served certificate is self-signed")
                    .recommendation("Use a certificate issued by a trusted CA")
                    .cvss(5.0)
                    .build(),
            );
        }
    }

    if !report.weak_ciphers.is_empty() {
        findings.push(
            tls_finding("Weak Cipher Suites", Severity::Medium)
                .description(format!(
                    "{} weak cipher suites accepted",
                    report.weak_ciphers.len()
                ))
                .recommendation("Disable weak cipher suites and keep only modern ciphers")
                .cvss(5.5)
                .build(),
        );
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence() -> HandshakeEvidence {
        HandshakeEvidence::default()
    }

    #[test]
    fn test_clean_config_yields_no_findings() {
        let mut report = TlsAuditReport::new("example.com", 443);
        report.protocols.tls12 = true;
        report.protocols.tls13 = true;

        let findings = derive_findings(&report, &evidence());
        assert!(findings.is_empty());
    }

    #[test]
    fn test_obsolete_protocols_yield_findings() {
        let mut report = TlsAuditReport::new("example.com", 443);
        report.protocols.ssl3 = true;
        report.protocols.tls10 = true;
        report.protocols.tls11 = true;

        let findings = derive_findings(&report, &evidence());
        assert_eq!(findings.len(), 3);
        assert_eq!(findings[0].title, "SSL 3.0 Enabled (POODLE)");
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].cve_ids, vec!["CVE-2014-3566"]);
        assert_eq!(findings[1].severity, Severity::Medium);
        assert_eq!(findings[2].severity, Severity::Low);
    }

    #[test]
    fn test_heartbeat_finding_is_critical() {
        let report = TlsAuditReport::new("example.com", 443);
        let mut ev = evidence();
        ev.heartbeat_vulnerable = true;

        let findings = derive_findings(&report, &ev);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Critical);
        assert_eq!(findings[0].cve_ids, vec!["CVE-2014-0160"]);
        assert_eq!(findings[0].cvss_score, Some(9.8));
        assert_eq!(findings[0].port, Some(443));
    }

    #[test]
    fn test_weak_cipher_aggregate_finding() {
        let mut report = TlsAuditReport::new("example.com", 443);
        report.protocols.tls12 = true;
        report.weak_ciphers = vec![
            "TLS1.2:TLS_RSA_WITH_RC4_128_SHA".into(),
            "TLS1.2:TLS_RSA_WITH_DES_CBC_SHA".into(),
        ];

        let findings = derive_findings(&report, &evidence());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].title, "Weak Cipher Suites");
        assert!(findings[0].description.contains("2 weak cipher suites"));
    }

    #[test]
    fn test_certificate_findings() {
        let mut report = TlsAuditReport::new("example.com", 443);
        report.certificate = Some(crate::cert::CertificateReport {
            subject: "CN=x".into(),
            issuer: "CN=x".into(),
            serial_number: "01".into(),
            not_before: None,
            not_after: None,
            is_expired: true,
            days_until_expiry: Some(-10),
            is_self_signed: true,
            signature_algorithm: None,
            san_domains: vec![],
        });

        let findings = derive_findings(&report, &evidence());
        let titles: Vec<_> = findings.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(titles, vec!["Expired Certificate", "Self-Signed Certificate"]);
    }

    #[tokio::test]
    async fn test_unresolvable_host_reports_dns_error() {
        let auditor = TlsAuditor::new(&surfacescan_common::TlsConfig::default());
        let report = auditor.audit("does-not-exist.invalid", 443).await;
        assert!(report.grade.is_none());
        let error = report.error.unwrap();
        assert!(error.contains("DNS resolution failed"), "{}", error);
    }
}
