//! Coordinator records
//!
//! A record is identified by its `(host, port)` pair; the `active` flag is
//! the liveness observed when the record was admitted and is not part of
//! its identity.

use qgate_common::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Natural key of a coordinator
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoordinatorKey {
    pub host: String,
    pub port: u16,
}

impl CoordinatorKey {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn matches(&self, host: &str, port: u16) -> bool {
        self.port == port && self.host == host
    }
}

impl fmt::Display for CoordinatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A backend query coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorRecord {
    /// Hostname or IP address
    pub host: String,

    /// HTTP port
    pub port: u16,

    /// Liveness at the time of admission
    pub active: bool,
}

impl CoordinatorRecord {
    /// Create a validated record
    pub fn new(host: impl Into<String>, port: u16, active: bool) -> Result<Self> {
        let host = host.into();
        validate(&host, port)?;
        Ok(Self { host, port, active })
    }

    /// Key used for identity and deduplication
    pub fn key(&self) -> CoordinatorKey {
        CoordinatorKey::new(self.host.clone(), self.port)
    }

    pub fn matches(&self, host: &str, port: u16) -> bool {
        self.port == port && self.host == host
    }

    /// Base URL handed to the query dispatcher
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Reject an empty host or port 0
pub fn validate(host: &str, port: u16) -> Result<()> {
    if host.trim().is_empty() {
        return Err(GatewayError::invalid_coordinator("host must not be empty"));
    }
    if port == 0 {
        return Err(GatewayError::invalid_coordinator(format!(
            "port must be within 1..=65535 for host {}",
            host
        )));
    }
    Ok(())
}

impl PartialEq for CoordinatorRecord {
    fn eq(&self, other: &Self) -> bool {
        self.port == other.port && self.host == other.host
    }
}

impl Eq for CoordinatorRecord {}

impl Hash for CoordinatorRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.host.hash(state);
        self.port.hash(state);
    }
}

impl fmt::Display for CoordinatorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
