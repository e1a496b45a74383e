//! NVD API 2.0 client with retry and backoff

use serde::Deserialize;
use std::time::Duration;
use surfacescan_common::AdvisoryConfig;
use surfacescan_core::{Error, Result, Severity};
use tracing::{debug, warn};

/// Backoff for transient failures: 2s doubling, capped at 10s
const BACKOFF_BASE: Duration = Duration::from_secs(2);
const BACKOFF_CAP: Duration = Duration::from_secs(10);

/// One advisory record, reduced to what enrichment needs
#[derive(Debug, Clone)]
pub struct CveRecord {
    pub id: String,
    pub description: String,
    pub severity: Severity,
    pub cvss_score: Option<f64>,
    pub cvss_vector: Option<String>,
    pub cvss_version: &'static str,
    pub references: Vec<String>,
}

/// Client for the NVD advisory source
pub struct AdvisoryClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    max_attempts: u32,
}

impl AdvisoryClient {
    pub fn new(config: &AdvisoryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Configuration(format!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            max_attempts: config.max_attempts.max(1),
        })
    }

    /// Search advisories by platform identifier (CPE 2.3 name)
    pub async fn search_by_platform(
        &self,
        platform_id: &str,
        max_results: u32,
    ) -> Result<Vec<CveRecord>> {
        debug!(platform_id, "Searching advisories by platform");
        let response = self
            .fetch(&[
                ("cpeName", platform_id.to_string()),
                ("resultsPerPage", max_results.to_string()),
            ])
            .await?;
        Ok(parse_records(response))
    }

    /// Search advisories by free-text keyword
    pub async fn search_by_keyword(
        &self,
        keyword: &str,
        max_results: u32,
    ) -> Result<Vec<CveRecord>> {
        debug!(keyword, "Searching advisories by keyword");
        let response = self
            .fetch(&[
                ("keywordSearch", keyword.to_string()),
                ("resultsPerPage", max_results.to_string()),
            ])
            .await?;
        Ok(parse_records(response))
    }

    /// GET with retry on transient failure
    async fn fetch(&self, params: &[(&str, String)]) -> Result<NvdResponse> {
        let mut attempt = 0;
        let mut backoff = BACKOFF_BASE;

        loop {
            attempt += 1;
            match self.fetch_once(params).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        attempt,
                        backoff_secs = backoff.as_secs(),
                        "Advisory request failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(BACKOFF_CAP);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, params: &[(&str, String)]) -> Result<NvdResponse> {
        let mut request = self.client.get(&self.api_url).query(params);
        if let Some(key) = &self.api_key {
            request = request.header("apiKey", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::RemoteService(format!("request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::FORBIDDEN
        {
            // NVD signals rate limiting with 403 as well as 429
            return Err(Error::RateLimited {
                retry_after_seconds: 6,
            });
        }
        if status.is_server_error() {
            return Err(Error::RemoteService(format!("server error {}", status)));
        }
        if !status.is_success() {
            return Err(Error::Internal(format!(
                "advisory source rejected request: {}",
                status
            )));
        }

        response
            .json::<NvdResponse>()
            .await
            .map_err(|e| Error::RemoteService(format!("malformed response: {}", e)))
    }
}

fn parse_records(response: NvdResponse) -> Vec<CveRecord> {
    response
        .vulnerabilities
        .into_iter()
        .filter_map(|v| parse_record(v.cve))
        .collect()
}

/// Reduce a raw NVD record; prefers the newest CVSS scheme available
fn parse_record(cve: NvdCve) -> Option<CveRecord> {
    let id = cve.id?;

    let description = cve
        .descriptions
        .iter()
        .find(|d| d.lang == "en")
        .map(|d| d.value.clone())
        .unwrap_or_default();

    let (cvss_score, cvss_vector, severity, cvss_version) = pick_cvss(&cve.metrics);

    let references = cve
        .references
        .into_iter()
        .filter_map(|r| r.url)
        .take(5)
        .collect();

    Some(CveRecord {
        id,
        description,
        severity,
        cvss_score,
        cvss_vector,
        cvss_version,
        references,
    })
}

/// CVSS preference: v3.1, then v3.0, then v2.0 (severity derived from bands)
fn pick_cvss(metrics: &NvdMetrics) -> (Option<f64>, Option<String>, Severity, &'static str) {
    if let Some(metric) = metrics.cvss_metric_v31.first() {
        let data = &metric.cvss_data;
        return (
            data.base_score,
            data.vector_string.clone(),
            Severity::from_label(data.base_severity.as_deref().unwrap_or("")),
            "3.1",
        );
    }
    if let Some(metric) = metrics.cvss_metric_v30.first() {
        let data = &metric.cvss_data;
        return (
            data.base_score,
            data.vector_string.clone(),
            Severity::from_label(data.base_severity.as_deref().unwrap_or("")),
            "3.0",
        );
    }
    if let Some(metric) = metrics.cvss_metric_v2.first() {
        let data = &metric.cvss_data;
        let severity = data
            .base_score
            .map(Severity::from_cvss)
            .unwrap_or(Severity::Info);
        return (data.base_score, data.vector_string.clone(), severity, "2.0");
    }
    (None, None, Severity::Info, "3.1")
}

// --- NVD API 2.0 response model ---

#[derive(Debug, Default, Deserialize)]
pub struct NvdResponse {
    #[serde(default, rename = "totalResults")]
    pub total_results: u32,
    #[serde(default)]
    pub vulnerabilities: Vec<NvdVulnerability>,
}

#[derive(Debug, Deserialize)]
pub struct NvdVulnerability {
    pub cve: NvdCve,
}

#[derive(Debug, Default, Deserialize)]
pub struct NvdCve {
    pub id: Option<String>,
    #[serde(default)]
    pub descriptions: Vec<NvdDescription>,
    #[serde(default)]
    pub metrics: NvdMetrics,
    #[serde(default)]
    pub references: Vec<NvdReference>,
}

#[derive(Debug, Deserialize)]
pub struct NvdDescription {
    pub lang: String,
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NvdMetrics {
    #[serde(default, rename = "cvssMetricV31")]
    pub cvss_metric_v31: Vec<NvdCvssMetric>,
    #[serde(default, rename = "cvssMetricV30")]
    pub cvss_metric_v30: Vec<NvdCvssMetric>,
    #[serde(default, rename = "cvssMetricV2")]
    pub cvss_metric_v2: Vec<NvdCvssMetric>,
}

#[derive(Debug, Deserialize)]
pub struct NvdCvssMetric {
    #[serde(rename = "cvssData")]
    pub cvss_data: NvdCvssData,
}

#[derive(Debug, Deserialize)]
pub struct NvdCvssData {
    #[serde(rename = "baseScore")]
    pub base_score: Option<f64>,
    #[serde(rename = "vectorString")]
    pub vector_string: Option<String>,
    #[serde(rename = "baseSeverity")]
    pub base_severity: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NvdReference {
    pub url: Option<String>,
}
