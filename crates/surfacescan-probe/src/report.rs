//! Probe result types

use serde::{Deserialize, Serialize};
use surfacescan_core::Service;

/// Web-relevant ports used for technology extraction
const WEB_SERVICE_PORTS: &[u16] = &[80, 443, 8080, 8443];

/// Result of one probe invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    /// Target as handed to the tool
    pub target: String,
    /// Host state reported by the tool (up/down/unknown)
    pub host_state: String,
    /// Open services, unique per (port, protocol)
    pub services: Vec<Service>,
    /// Infrastructure fingerprint assembled from the probe
    pub fingerprint: Fingerprint,
    /// Command line executed, for audit trails
    pub command_line: Option<String>,
    /// Elapsed time reported by the tool
    pub elapsed_seconds: f64,
}

/// Infrastructure fingerprint - owned by the prober, read-only downstream
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Best OS guess, when detection ran and matched
    pub os: Option<OsGuess>,
    /// All OS candidates, best first
    #[serde(default)]
    pub os_candidates: Vec<OsGuess>,
    /// Note recording degraded OS detection (e.g., missing privileges)
    pub os_note: Option<String>,
    /// Resolved IP address
    pub ip_address: Option<String>,
    /// Reverse hostname
    pub hostname: Option<String>,
    /// Web server product seen on a web port (e.g., "nginx 1.18.0")
    pub web_server: Option<String>,
    /// Detected web technologies
    #[serde(default)]
    pub technologies: Vec<String>,
}

/// One operating-system guess from the probing tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsGuess {
    /// Full match name (e.g., "Linux 5.0 - 5.14")
    pub name: Option<String>,
    /// OS family (e.g., "Linux", "Windows")
    pub family: Option<String>,
    /// Vendor (e.g., "Microsoft")
    pub vendor: Option<String>,
    /// Generation (e.g., "5.X", "2019")
    pub generation: Option<String>,
    /// Device type (e.g., "general purpose", "router")
    pub os_type: Option<String>,
    /// Match confidence, 0-100
    pub confidence: u8,
    /// Platform identifier (CPE) for the OS
    pub platform_id: Option<String>,
}

impl Fingerprint {
    /// Fill web-server and technology fields from the open service list
    pub fn extract_web_technologies(&mut self, services: &[Service]) {
        for svc in services {
            if !WEB_SERVICE_PORTS.contains(&svc.port) {
                continue;
            }
            if let Some(product) = &svc.product {
                if self.web_server.is_none() {
                    self.web_server = Some(
                        svc.version_display()
                            .unwrap_or_else(|| product.clone()),
                    );
                }
                if !self.technologies.contains(product) {
                    self.technologies.push(product.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web_service(port: u16, product: &str, version: Option<&str>) -> Service {
        let mut svc = Service::open(port, "tcp", "http");
        svc.product = Some(product.to_string());
        svc.version = version.map(String::from);
        svc
    }

    #[test]
    fn test_extract_web_technologies() {
        let services = vec![
            Service::open(22, "tcp", "ssh"),
            web_service(80, "nginx", Some("1.18.0")),
            web_service(8080, "Apache Tomcat", None),
        ];

        let mut fp = Fingerprint::default();
        fp.extract_web_technologies(&services);

        assert_eq!(fp.web_server.as_deref(), Some("nginx 1.18.0"));
        assert_eq!(fp.technologies, vec!["nginx", "Apache Tomcat"]);
    }

    #[test]
    fn test_non_web_ports_ignored() {
        let mut ssh = Service::open(22, "tcp", "ssh");
        ssh.product = Some("OpenSSH".into());

        let mut fp = Fingerprint::default();
        fp.extract_web_technologies(&[ssh]);

        assert!(fp.web_server.is_none());
        assert!(fp.technologies.is_empty());
    }
}
