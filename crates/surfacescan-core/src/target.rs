//! Scan target definitions

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Kind of target handed to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TargetKind {
    /// Apex domain (e.g., "example.com")
    Domain,
    /// Single IP address
    Ip,
    /// Subdomain (e.g., "app.example.com")
    Subdomain,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Domain => "DOMAIN",
            TargetKind::Ip => "IP",
            TargetKind::Subdomain => "SUBDOMAIN",
        }
    }
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TargetKind {
    type Err = TargetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DOMAIN" => Ok(TargetKind::Domain),
            "IP" => Ok(TargetKind::Ip),
            "SUBDOMAIN" => Ok(TargetKind::Subdomain),
            other => Err(TargetParseError::UnknownKind(other.to_string())),
        }
    }
}

/// A validated scan target
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    #[serde(rename = "type")]
    pub kind: TargetKind,
    pub value: String,
}

impl Target {
    /// Create a target, validating the value for the given kind
    pub fn new(kind: TargetKind, value: impl Into<String>) -> Result<Self, TargetParseError> {
        let value = value.into();
        let value = value.trim().to_string();

        if value.is_empty() {
            return Err(TargetParseError::Empty);
        }
        if value.contains(char::is_whitespace) {
            return Err(TargetParseError::InvalidValue(value));
        }
        // The engine takes bare hosts; URL forms belong to the caller
        if value.contains("://") || value.contains('/') {
            return Err(TargetParseError::InvalidValue(value));
        }

        match kind {
            TargetKind::Ip => {
                value
                    .parse::<IpAddr>()
                    .map_err(|_| TargetParseError::InvalidIp(value.clone()))?;
            }
            TargetKind::Domain | TargetKind::Subdomain => {
                if !is_valid_hostname(&value) {
                    return Err(TargetParseError::InvalidHostname(value));
                }
            }
        }

        Ok(Self { kind, value })
    }

    /// Parse a target from a string, auto-detecting the kind
    pub fn parse(s: &str) -> Result<Self, TargetParseError> {
        let s = s.trim();

        if let Ok(_ip) = s.parse::<IpAddr>() {
            return Target::new(TargetKind::Ip, s);
        }

        // Heuristic: more than two labels means a subdomain
        let kind = if s.matches('.').count() >= 2 {
            TargetKind::Subdomain
        } else {
            TargetKind::Domain
        };

        Target::new(kind, s)
    }

    /// Get a display string for the target
    pub fn display(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

fn is_valid_hostname(s: &str) -> bool {
    if s.len() > 253 || s.starts_with('.') || s.ends_with('.') || s.starts_with('-') {
        return false;
    }
    s.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    })
}

/// Error validating a scan target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetParseError {
    Empty,
    InvalidValue(String),
    InvalidIp(String),
    InvalidHostname(String),
    UnknownKind(String),
}

impl std::fmt::Display for TargetParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetParseError::Empty => write!(f, "Empty target"),
            TargetParseError::InvalidValue(v) => write!(f, "Invalid target value: {}", v),
            TargetParseError::InvalidIp(v) => write!(f, "Invalid IP address: {}", v),
            TargetParseError::InvalidHostname(v) => write!(f, "Invalid hostname: {}", v),
            TargetParseError::UnknownKind(v) => write!(f, "Unknown target type: {}", v),
        }
    }
}

impl std::error::Error for TargetParseError {}

impl From<TargetParseError> for crate::Error {
    fn from(e: TargetParseError) -> Self {
        crate::Error::InvalidTarget(e.to_string())
    }
}
