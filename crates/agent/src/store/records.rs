use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// A printer known to this agent, keyed by IP address within agent scope.
#[derive(Debug, Clone, PartialEq)]
pub struct PrinterIdentity {
    pub id: i64,
    pub ip_address: String,
    pub serial_number: Option<String>,
    pub model: Option<String>,
    pub name: Option<String>,
    pub status: Option<String>,
    pub last_seen: DateTime<Utc>,
    /// Set when an already-pushed row materially changed and the server has
    /// not yet acknowledged the update.
    pub pending_update: bool,
}

/// What one successful identity probe learned about a host. Fields the probe
/// could not read stay `None` and never overwrite stored values.
#[derive(Debug, Clone, Default)]
pub struct DiscoveredPrinter {
    pub ip_address: String,
    pub serial_number: Option<String>,
    pub model: Option<String>,
    pub name: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub id: i64,
    pub inserted: bool,
    /// True when serial, model or name gained or changed a value.
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSample {
    pub printer_id: i64,
    pub timestamp: DateTime<Utc>,
    pub page_count: Option<i64>,
    pub toner_levels: BTreeMap<String, i64>,
    pub status: String,
    pub error_state: Option<String>,
    pub raw_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub id: i64,
    pub printer_id: i64,
    pub timestamp: DateTime<Utc>,
    pub page_count: Option<i64>,
    pub toner_levels: BTreeMap<String, i64>,
    pub status: String,
    pub error_state: Option<String>,
    pub raw_data: Option<serde_json::Value>,
}
