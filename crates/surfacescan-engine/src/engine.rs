//! Scan orchestrator

use crate::result::{build_summary, Correlation, ScanResult};
use crate::rules;
use std::sync::Arc;
use std::time::Duration;
use surfacescan_advisory::Enricher;
use surfacescan_common::EngineConfig;
use surfacescan_core::{Finding, Result, Service, Target};
use surfacescan_probe::{Prober, ScanProfile};
use surfacescan_scoring::ExposureScorer;
use surfacescan_tls::TlsAuditor;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Default secure port audited when the prober surfaced no TLS candidates
const DEFAULT_TLS_PORT: u16 = 443;

/// Well-known secure-web ports treated as TLS candidates
const TLS_CANDIDATE_PORTS: &[u16] = &[443, 8443, 9443];

/// Scan orchestrator
///
/// Owns its collaborators and the worker-pool permits; holds no per-run
/// state, so one engine may serve many concurrent scans. Probing is
/// throttled harder than TLS negotiation because the external tool is the
/// heavier resource.
pub struct ScanEngine {
    config: EngineConfig,
    prober: Prober,
    auditor: TlsAuditor,
    enricher: Enricher,
    scorer: ExposureScorer,
    probe_permits: Arc<Semaphore>,
    tls_permits: Arc<Semaphore>,
}

impl ScanEngine {
    /// Construct an engine from configuration
    pub fn new(config: EngineConfig) -> Result<Self> {
        let prober = Prober::new(config.probe.clone());
        let auditor = TlsAuditor::new(&config.tls);
        let enricher = Enricher::new(&config.advisory)?;
        let probe_permits = Arc::new(Semaphore::new(config.probe.max_concurrent.max(1)));
        let tls_permits = Arc::new(Semaphore::new(config.tls.max_concurrent.max(1)));

        Ok(Self {
            config,
            prober,
            auditor,
            enricher,
            scorer: ExposureScorer::new(),
            probe_permits,
            tls_permits,
        })
    }

    /// Run one scan with the default quick profile
    pub async fn run(&self, target: Target, correlation: Correlation) -> ScanResult {
        self.run_with_profile(target, correlation, ScanProfile::Quick)
            .await
    }

    /// Run one scan under a whole-scan deadline. On cancellation the
    /// partially completed phase outputs are discarded and the result is
    /// ERROR with the cancellation reason.
    pub async fn run_with_timeout(
        &self,
        target: Target,
        correlation: Correlation,
        profile: ScanProfile,
        deadline: Duration,
    ) -> ScanResult {
        let mut fallback = ScanResult::pending(target.clone(), correlation.clone());
        fallback.begin();

        match tokio::time::timeout(deadline, self.run_with_profile(target, correlation, profile))
            .await
        {
            Ok(result) => result,
            Err(_) => {
                fallback.fail(format!(
                    "scan cancelled: exceeded deadline of {}s",
                    deadline.as_secs()
                ));
                fallback
            }
        }
    }

    /// Run one scan: probe, TLS audit, enrichment, static rules, scoring
    pub async fn run_with_profile(
        &self,
        target: Target,
        correlation: Correlation,
        profile: ScanProfile,
    ) -> ScanResult {
        let mut result = ScanResult::pending(target.clone(), correlation);
        result.begin();

        info!(target = %target, %profile, "Starting scan");

        // Phase 1: ports, services, OS
        self.probe_phase(&target, profile, &mut result).await;

        // Phase 2: TLS audit on candidate ports
        let tls_findings = self.tls_phase(&target, &mut result).await;

        // Phase 3: advisory enrichment
        let cve_findings = self.enrich_phase(&result.services).await;

        // Phase 4: static exposed-port rule
        let port_findings = rules::exposed_port_findings(&result.services);

        // Phase 5: merge and score
        let mut findings = port_findings;
        findings.extend(tls_findings);
        findings.extend(cve_findings);
        result.findings = findings;

        result.breakdown = self.scorer.score(
            &result.findings,
            &result.services,
            result.tls_grade.as_deref(),
        );

        // Phase 6: summary
        result.summary = build_summary(
            &result.services,
            &result.findings,
            &result.breakdown,
            result.tls_grade.as_deref(),
            &result.fingerprint,
        );

        result.succeed();
        info!(
            target = %result.target,
            score = result.breakdown.score,
            risk = %result.breakdown.risk_level,
            findings = result.findings.len(),
            duration = result.duration_seconds,
            "Scan complete"
        );
        result
    }

    async fn probe_phase(&self, target: &Target, profile: ScanProfile, result: &mut ScanResult) {
        let _permit = self.probe_permits.acquire().await.unwrap();

        match self.prober.probe(target, profile).await {
            Ok(report) => {
                result.services = report.services;
                result.fingerprint = report.fingerprint;
                result.raw_command = report.command_line;
            }
            // Prober failure alone never aborts the scan
            Err(e) => {
                warn!(target = %target, code = e.code(), "Probe phase degraded: {}", e);
                result
                    .notes
                    .push(format!("probing produced no services: {}", e));
            }
        }
    }

    async fn tls_phase(&self, target: &Target, result: &mut ScanResult) -> Vec<Finding> {
        let candidates = select_tls_ports(&result.services, self.config.tls.max_ports);
        let mut findings = Vec::new();

        for port in &candidates {
            let _permit = self.tls_permits.acquire().await.unwrap();
            let report = self.auditor.audit(&target.value, *port).await;

            if report.error.is_none() {
                if let Some(grade) = report.grade {
                    result.tls_grade = Some(grade.to_string());
                }
                findings.extend(report.findings.iter().cloned());
            }
            result.tls_reports.push(report);
        }

        if !candidates.is_empty() && result.tls_reports.iter().all(|r| r.error.is_some()) {
            result
                .notes
                .push("TLS audit failed on all candidate ports".into());
        }

        findings
    }

    async fn enrich_phase(&self, services: &[Service]) -> Vec<Finding> {
        let mut findings = Vec::new();
        for svc in services.iter().filter(|svc| svc.is_enrichable()) {
            findings.extend(self.enricher.enrich(svc).await);
        }
        findings
    }
}

/// Choose up to `max` TLS candidate ports: secure-web ports and services
/// that identify as https/ssl, else the default secure port
fn select_tls_ports(services: &[Service], max: usize) -> Vec<u16> {
    let mut ports = Vec::new();

    for svc in services {
        let name = svc.name.to_ascii_lowercase();
        let is_candidate =
            TLS_CANDIDATE_PORTS.contains(&svc.port) || name.contains("https") || name.contains("ssl");
        if is_candidate && !ports.contains(&svc.port) {
            ports.push(svc.port);
        }
    }

    if ports.is_empty() {
        ports.push(DEFAULT_TLS_PORT);
    }

    ports.truncate(max.max(1));
    ports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ScanStatus;
    use surfacescan_core::TargetKind;

    fn service(port: u16, name: &str) -> Service {
        Service::open(port, "tcp", name)
    }

    #[test]
    fn test_select_tls_ports_from_services() {
        let services = vec![
            service(22, "ssh"),
            service(443, "https"),
            service(8443, "https-alt"),
        ];
        assert_eq!(select_tls_ports(&services, 3), vec![443, 8443]);
    }

    #[test]
    fn test_select_tls_ports_by_service_name() {
        let services = vec![service(8000, "ssl/http"), service(993, "imaps-ssl")];
        assert_eq!(select_tls_ports(&services, 3), vec![8000, 993]);
    }

    #[test]
    fn test_select_tls_ports_defaults_to_443() {
        let services = vec![service(22, "ssh"), service(80, "http")];
        assert_eq!(select_tls_ports(&services, 3), vec![443]);
        assert_eq!(select_tls_ports(&[], 3), vec![443]);
    }

    #[test]
    fn test_select_tls_ports_caps_candidates() {
        let services = vec![
            service(443, "https"),
            service(8443, "https"),
            service(9443, "https"),
            service(4443, "ssl/http"),
        ];
        assert_eq!(select_tls_ports(&services, 3), vec![443, 8443, 9443]);
    }

    #[test]
    fn test_select_tls_ports_dedups() {
        let services = vec![service(443, "https"), service(443, "ssl/http")];
        assert_eq!(select_tls_ports(&services, 3), vec![443]);
    }

    #[tokio::test]
    async fn test_cancelled_scan_is_error_with_reason() {
        let engine = ScanEngine::new(EngineConfig::default()).unwrap();
        let target = Target::new(TargetKind::Ip, "192.0.2.1").unwrap();

        let result = engine
            .run_with_timeout(
                target,
                Correlation::default(),
                ScanProfile::Quick,
                Duration::ZERO,
            )
            .await;

        assert_eq!(result.status, ScanStatus::Error);
        let message = result.error_message.unwrap();
        assert!(message.contains("cancelled"), "{}", message);
        assert!(result.started_at.is_some());
        assert!(result.finished_at.is_some());
        // Partial output discarded
        assert!(result.services.is_empty());
        assert!(result.findings.is_empty());
    }
}
