//! Prober - assembles and runs external nmap invocations

use crate::report::{Fingerprint, ProbeReport};
use crate::xml::{parse_nmap_xml, NmapDocument};
use std::process::Stdio;
use std::time::Duration;
use surfacescan_common::ProbeConfig;
use surfacescan_core::{Error, PortState, Result, Target};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Curated common ports for the quick profile
const COMMON_PORTS: &str =
    "21,22,23,25,53,80,110,111,135,139,143,443,445,993,995,1723,3306,3389,5432,5900,8080,8443";

/// Web-relevant ports for the web profile
const WEB_PORTS: &str = "80,443,8080,8443,8000,8888,9000,9443";

/// Probe profile selecting port coverage and probe depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanProfile {
    /// Curated common-port list, version detection, optional OS guess
    #[default]
    Quick,
    /// Web-relevant ports plus banner scripts
    Web,
    /// Tool-default broad port range, version + script probes, optional OS guess
    Full,
}

impl ScanProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanProfile::Quick => "quick",
            ScanProfile::Web => "web",
            ScanProfile::Full => "full",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "web" => ScanProfile::Web,
            "full" => ScanProfile::Full,
            _ => ScanProfile::Quick,
        }
    }

    /// Port specification, None for the tool's default range
    fn ports(&self) -> Option<&'static str> {
        match self {
            ScanProfile::Quick => Some(COMMON_PORTS),
            ScanProfile::Web => Some(WEB_PORTS),
            ScanProfile::Full => None,
        }
    }

    /// Whether this profile ever runs OS detection
    fn supports_os_detection(&self) -> bool {
        !matches!(self, ScanProfile::Web)
    }

    /// Base probe arguments, without OS detection
    fn base_args(&self) -> Vec<&'static str> {
        match self {
            ScanProfile::Quick => vec!["-sV", "-T4"],
            ScanProfile::Web => vec!["-sV", "-T4", "--script=http-title,http-headers"],
            ScanProfile::Full => vec!["-sV", "-sC", "-T4"],
        }
    }
}

impl std::fmt::Display for ScanProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Port and service prober
///
/// Stateless apart from configuration; one instance may serve many
/// concurrent scans. Throttling is the caller's concern.
#[derive(Debug, Clone)]
pub struct Prober {
    config: ProbeConfig,
}

impl Prober {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// Probe a target, returning open services and an infrastructure fingerprint
    pub async fn probe(&self, target: &Target, profile: ScanProfile) -> Result<ProbeReport> {
        let detect_os = self.config.detect_os && profile.supports_os_detection();

        info!(
            target = %target,
            profile = %profile,
            detect_os,
            "Starting probe"
        );

        let outcome = self.run_probe(target, profile, detect_os).await;

        let (doc, os_note) = match outcome {
            Ok(doc) => (doc, None),
            // OS detection needs raw sockets; retry the identical probe
            // without it instead of failing the phase
            Err(Error::PrivilegeRequired(msg)) if detect_os => {
                warn!(
                    target = %target,
                    "OS detection requires elevated privileges, retrying without it"
                );
                let doc = self.run_probe(target, profile, false).await?;
                (
                    doc,
                    Some(format!("OS detection disabled (requires privileges): {}", msg)),
                )
            }
            Err(e) => return Err(e),
        };

        Ok(self.build_report(target, doc, os_note))
    }

    async fn run_probe(
        &self,
        target: &Target,
        profile: ScanProfile,
        detect_os: bool,
    ) -> Result<NmapDocument> {
        let mut args: Vec<String> = profile.base_args().iter().map(|s| s.to_string()).collect();

        if detect_os {
            args.push("-O".into());
            args.push("--osscan-guess".into());
        }

        args.push(format!("--host-timeout={}s", self.config.timeout_seconds));

        if let Some(ports) = profile.ports() {
            args.push("-p".into());
            args.push(ports.into());
        }

        args.push("-oX".into());
        args.push("-".into());
        args.push(target.value.clone());

        debug!(nmap = %self.config.nmap_path, ?args, "Invoking probing tool");

        let child = Command::new(&self.config.nmap_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    Error::ToolUnavailable(self.config.nmap_path.clone())
                }
                std::io::ErrorKind::PermissionDenied => Error::PrivilegeRequired(e.to_string()),
                _ => Error::ToolFailed(e.to_string()),
            })?;

        // Outer guard beyond the tool's own host timeout
        let grace = Duration::from_secs(self.config.timeout_seconds + 30);
        let output = match timeout(grace, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| Error::ToolFailed(e.to_string()))?,
            Err(_) => {
                return Err(Error::ToolTimeout {
                    seconds: self.config.timeout_seconds,
                })
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            if is_privilege_error(&stderr) {
                return Err(Error::PrivilegeRequired(first_line(&stderr)));
            }
            return Err(Error::ToolFailed(format!(
                "exit status {}: {}",
                output.status,
                first_line(&stderr)
            )));
        }
        // Some builds exit 0 but report the privilege problem on stderr
        if is_privilege_error(&stderr) {
            return Err(Error::PrivilegeRequired(first_line(&stderr)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_nmap_xml(&stdout)
    }

    fn build_report(
        &self,
        target: &Target,
        doc: NmapDocument,
        os_note: Option<String>,
    ) -> ProbeReport {
        // Only open services are exposed surface
        let services: Vec<_> = doc
            .services
            .into_iter()
            .filter(|s| s.state == PortState::Open)
            .collect();

        let mut fingerprint = Fingerprint {
            os: doc.os_matches.first().cloned(),
            os_candidates: doc.os_matches,
            os_note,
            ip_address: doc.ip_address,
            hostname: doc.hostname,
            web_server: None,
            technologies: Vec::new(),
        };
        fingerprint.extract_web_technologies(&services);

        info!(
            target = %target,
            services = services.len(),
            elapsed = doc.elapsed_seconds,
            "Probe complete"
        );

        ProbeReport {
            target: target.value.clone(),
            host_state: doc.host_state,
            services,
            fingerprint,
            command_line: doc.command_line,
            elapsed_seconds: doc.elapsed_seconds,
        }
    }
}

fn is_privilege_error(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("requires root privileges") || lower.contains("requires privileged access")
}

fn first_line(s: &str) -> String {
    s.lines().next().unwrap_or("").trim().to_string()
}
