//! SurfaceScan Probe - Port and service discovery
//!
//! This crate wraps the external `nmap` tool: it assembles profile-specific
//! invocations, runs them as bounded subprocesses, and parses the XML output
//! into typed service and fingerprint data. It performs no scanning of its
//! own - the probing capability is delegated.

pub mod prober;
pub mod report;
mod xml;

pub use prober::{Prober, ScanProfile};
pub use report::{Fingerprint, OsGuess, ProbeReport};
