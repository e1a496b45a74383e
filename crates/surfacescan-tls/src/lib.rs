//! SurfaceScan TLS - Transport-security auditor
//!
//! Negotiates against a target port to determine supported protocol
//! versions, classify accepted cipher suites, decode the served
//! certificate, and detect a fixed set of named protocol weaknesses.
//! Each audit produces a letter grade A-F from a reproducible deduction
//! table.
//!
//! Negotiation failures never escape [`TlsAuditor::audit`]; they land in
//! the report's `error` field so one dead port cannot block the others.

pub mod auditor;
pub mod cert;
pub mod grade;
pub mod probe;
pub mod report;

pub use auditor::TlsAuditor;
pub use cert::CertificateReport;
pub use grade::Grade;
pub use report::{ProtocolSupport, TlsAuditReport};
