//! Static exposure rules applied independently of the scorer

use surfacescan_core::{Finding, FindingCategory, Service, Severity};

/// Sensitive ports that warrant a finding on mere exposure, advisory
/// match or not
const SENSITIVE_PORTS: &[(u16, &str, &str)] = &[
    (21, "FTP", "FTP is obsolete and transfers credentials in cleartext"),
    (23, "Telnet", "Telnet transmits all traffic in cleartext"),
    (139, "NetBIOS", "NetBIOS exposes internal naming and session details"),
    (445, "SMB", "SMB is a frequent target for remote attacks"),
    (1433, "MSSQL", "Database listener exposed to the network"),
    (3389, "RDP", "RDP is a frequent target for brute-force attacks"),
    (5900, "VNC", "VNC exposes remote desktop access"),
];

/// Emit one HIGH finding per exposed sensitive port
pub fn exposed_port_findings(services: &[Service]) -> Vec<Finding> {
    let mut findings = Vec::new();

    for svc in services {
        let Some((port, name, description)) = SENSITIVE_PORTS
            .iter()
            .find(|(port, _, _)| *port == svc.port)
        else {
            continue;
        };

        findings.push(
            Finding::builder(
                FindingCategory::PortExposed,
                format!("Sensitive port exposed: {}/{}", port, name),
            )
            .port(*port, svc.protocol.clone())
            .service(svc.name.clone(), svc.version_display())
            .severity(Severity::High)
            .description(*description)
            .recommendation(format!(
                "Close port {} or restrict it behind a VPN or firewall",
                port
            ))
            .cvss(7.5)
            .build(),
        );
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_sensitive_port_emits_one_finding() {
        let services = vec![
            Service::open(23, "tcp", "telnet"),
            Service::open(3389, "tcp", "ms-wbt-server"),
        ];
        let findings = exposed_port_findings(&services);

        assert_eq!(findings.len(), 2);
        assert!(findings
            .iter()
            .all(|f| f.severity == Severity::High && f.category == FindingCategory::PortExposed));
        assert_eq!(findings[0].title, "Sensitive port exposed: 23/Telnet");
        assert_eq!(findings[0].cvss_score, Some(7.5));
        assert_eq!(findings[1].port, Some(3389));
    }

    #[test]
    fn test_ordinary_ports_emit_nothing() {
        let services = vec![
            Service::open(80, "tcp", "http"),
            Service::open(443, "tcp", "https"),
            Service::open(22, "tcp", "ssh"),
        ];
        assert!(exposed_port_findings(&services).is_empty());
    }

    #[test]
    fn test_no_services_no_findings() {
        assert!(exposed_port_findings(&[]).is_empty());
    }
}
