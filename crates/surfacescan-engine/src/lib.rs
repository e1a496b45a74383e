//! SurfaceScan Engine - Scan orchestration
//!
//! Drives the four scan phases in fixed order - probe, TLS audit,
//! enrichment, scoring - merges their findings, and produces exactly one
//! [`ScanResult`]. Recoverable phase failures degrade to advisory notes;
//! only whole-scan cancellation produces an ERROR result.

pub mod engine;
pub mod result;
pub mod rules;

pub use engine::ScanEngine;
pub use result::{Correlation, ScanResult, ScanStatus, ScanSummary};
