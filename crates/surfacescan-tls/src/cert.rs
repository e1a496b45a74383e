//! Certificate retrieval and decoding
//!
//! Retrieves the served certificate with a permissive native-tls handshake
//! (invalid certificates are exactly what the audit needs to see) and
//! decodes the DER with x509-parser.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;
use tracing::debug;
use x509_parser::prelude::*;

/// Decoded certificate metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateReport {
    pub subject: String,
    pub issuer: String,
    pub serial_number: String,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
    pub is_expired: bool,
    pub days_until_expiry: Option<i64>,
    pub is_self_signed: bool,
    pub signature_algorithm: Option<String>,
    #[serde(default)]
    pub san_domains: Vec<String>,
}

/// Retrieve and decode the certificate served on `addr`.
///
/// Blocking; run under `spawn_blocking`. `Ok(None)` means the handshake
/// succeeded but no certificate was presented.
pub fn fetch_certificate(
    host: &str,
    addr: &SocketAddr,
    timeout: Duration,
) -> Result<Option<CertificateReport>, String> {
    let connector = native_tls::TlsConnector::builder()
        // The audit must observe broken deployments, not reject them
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()
        .map_err(|e| format!("TLS connector error: {}", e))?;

    let stream = TcpStream::connect_timeout(addr, timeout)
        .map_err(|e| format!("Connection failed: {}", e))?;
    stream
        .set_read_timeout(Some(timeout))
        .map_err(|e| e.to_string())?;
    stream
        .set_write_timeout(Some(timeout))
        .map_err(|e| e.to_string())?;

    let tls_stream = connector
        .connect(host, stream)
        .map_err(|e| format!("TLS handshake failed: {}", e))?;

    let cert = match tls_stream.peer_certificate() {
        Ok(Some(c)) => c,
        Ok(None) => {
            debug!(%host, "Handshake succeeded but no peer certificate presented");
            return Ok(None);
        }
        Err(e) => return Err(format!("Could not get peer certificate: {}", e)),
    };

    let der = cert
        .to_der()
        .map_err(|e| format!("Could not convert certificate to DER: {}", e))?;

    decode_certificate(&der).map(Some)
}

/// Decode a DER certificate into a report
pub fn decode_certificate(der: &[u8]) -> Result<CertificateReport, String> {
    let (_, x509) =
        parse_x509_certificate(der).map_err(|e| format!("X.509 parse error: {}", e))?;

    let validity = x509.validity();
    let not_before = asn1_time_to_utc(&validity.not_before);
    let not_after = asn1_time_to_utc(&validity.not_after);

    let now = Utc::now();
    let days_until_expiry = not_after.map(|na| na.signed_duration_since(now).num_days());
    let is_expired = not_after.map(|na| now > na).unwrap_or(false);

    let subject = x509.subject().to_string();
    let issuer = x509.issuer().to_string();
    let is_self_signed = subject == issuer;

    let san_domains = x509
        .subject_alternative_name()
        .ok()
        .flatten()
        .map(|san| {
            san.value
                .general_names
                .iter()
                .filter_map(|name| match name {
                    GeneralName::DNSName(dns) => Some(dns.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    let signature_algorithm =
        Some(signature_algorithm_name(&x509.signature_algorithm.algorithm));

    Ok(CertificateReport {
        subject,
        issuer,
        serial_number: x509.raw_serial_as_string(),
        not_before,
        not_after,
        is_expired,
        days_until_expiry,
        is_self_signed,
        signature_algorithm,
        san_domains,
    })
}

fn asn1_time_to_utc(time: &ASN1Time) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(time.timestamp(), 0)
}

/// Human-readable name for common signature algorithm OIDs
fn signature_algorithm_name(oid: &x509_parser::der_parser::Oid) -> String {
    match oid.to_id_string().as_str() {
        "1.2.840.113549.1.1.4" => "md5WithRSAEncryption".into(),
        "1.2.840.113549.1.1.5" => "sha1WithRSAEncryption".into(),
        "1.2.840.113549.1.1.10" => "rsassaPss".into(),
        "1.2.840.113549.1.1.11" => "sha256WithRSAEncryption".into(),
        "1.2.840.113549.1.1.12" => "sha384WithRSAEncryption".into(),
        "1.2.840.113549.1.1.13" => "sha512WithRSAEncryption".into(),
        "1.2.840.10045.4.3.2" => "ecdsa-with-SHA256".into(),
        "1.2.840.10045.4.3.3" => "ecdsa-with-SHA384".into(),
        "1.3.101.112" => "ed25519".into(),
        other => other.into(),
    }
}
