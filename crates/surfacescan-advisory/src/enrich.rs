//! Service enrichment against the advisory source

use crate::client::{AdvisoryClient, CveRecord};
use crate::platform;
use surfacescan_common::AdvisoryConfig;
use surfacescan_core::{Finding, FindingCategory, Result, Service};
use tracing::{debug, warn};

/// Keyword fallback returns fewer candidates than a platform match
const KEYWORD_MAX_RESULTS: u32 = 5;

/// Description length cap on stored findings
const DESCRIPTION_CAP: usize = 500;

/// Vulnerability enricher
///
/// `enrich` never propagates remote failures; a service that cannot be
/// enriched contributes nothing.
pub struct Enricher {
    client: AdvisoryClient,
    max_results_per_query: u32,
    max_findings_per_service: usize,
}

impl Enricher {
    pub fn new(config: &AdvisoryConfig) -> Result<Self> {
        Ok(Self {
            client: AdvisoryClient::new(config)?,
            max_results_per_query: config.max_results_per_query,
            max_findings_per_service: config.max_findings_per_service,
        })
    }

    /// Enrich one service with known-vulnerability findings
    pub async fn enrich(&self, service: &Service) -> Vec<Finding> {
        if !service.is_enrichable() {
            return Vec::new();
        }

        let records = match self.lookup(service).await {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    port = service.port,
                    service = %service.name,
                    "Enrichment failed, continuing without advisories: {}",
                    e
                );
                return Vec::new();
            }
        };

        debug!(
            port = service.port,
            service = %service.name,
            advisories = records.len(),
            "Enrichment complete"
        );

        records
            .into_iter()
            .take(self.max_findings_per_service)
            .map(|record| self.to_finding(service, record))
            .collect()
    }

    async fn lookup(&self, service: &Service) -> Result<Vec<CveRecord>> {
        let platform_id = platform::platform_id(
            &service.name,
            service.product.as_deref(),
            service.version.as_deref(),
        );

        if let Some(platform_id) = platform_id {
            return self
                .client
                .search_by_platform(&platform_id, self.max_results_per_query)
                .await;
        }

        // No canonical platform: free-text query on name and version
        if let Some(version_display) = service.version_display() {
            let keyword = format!("{} {}", service.name, version_display);
            return self
                .client
                .search_by_keyword(&keyword, KEYWORD_MAX_RESULTS)
                .await;
        }

        Ok(Vec::new())
    }

    fn to_finding(&self, service: &Service, record: CveRecord) -> Finding {
        let description: String = record.description.chars().take(DESCRIPTION_CAP).collect();

        let mut builder = Finding::builder(FindingCategory::ServiceVuln, record.id.clone())
            .port(service.port, service.protocol.clone())
            .service(service.name.clone(), service.version_display())
            .severity(record.severity)
            .description(description)
            .recommendation(format!(
                "Update {} to a version not affected by {}",
                service.name, record.id
            ))
            .cve(record.id)
            .references(record.references);

        if let Some(score) = record.cvss_score {
            builder = builder.cvss(score);
        }
        if let Some(vector) = record.cvss_vector {
            builder = builder.cvss_vector(vector, record.cvss_version);
        }

        builder.build()
    }
}
