//! Wire payload types for the central aggregation service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegisterRequest {
    pub agent_id: String,
    pub name: String,
    pub hostname: String,
    pub ip_address: String,
    pub os_info: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegisterResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    PrinterDiscovery,
    PrinterUpdate,
    Metrics,
}

/// One record pushed to `POST /data`. The server upserts printers keyed by
/// `(agent, ip_address)` and appends metrics keyed by `(printer, timestamp)`,
/// so redelivery of the same envelope is harmless.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataEnvelope {
    #[serde(rename = "type")]
    pub kind: DataKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub printer_id: Option<i64>,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrinterPayload {
    pub ip_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsPayload {
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<i64>,
    pub toner_levels: BTreeMap<String, i64>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<serde_json::Value>,
}

/// Server-authoritative configuration from `GET /data/config`. Every field is
/// optional on the wire; validation happens before anything is applied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RemoteConfig {
    #[serde(default)]
    pub polling_interval: Option<u64>,
    #[serde(default)]
    pub discovery_interval: Option<u64>,
    #[serde(default)]
    pub snmp_community: Option<String>,
    #[serde(default)]
    pub snmp_timeout: Option<u64>,
    #[serde(default)]
    pub subnets: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_uses_type_tag() {
        let env = DataEnvelope {
            kind: DataKind::PrinterDiscovery,
            printer_id: None,
            data: serde_json::json!({"ip_address": "192.168.1.10"}),
        };
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["type"], "printer_discovery");
        assert!(json.get("printer_id").is_none());
    }

    #[test]
    fn metrics_envelope_carries_printer_id() {
        let env = DataEnvelope {
            kind: DataKind::Metrics,
            printer_id: Some(7),
            data: serde_json::json!({}),
        };
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["type"], "metrics");
        assert_eq!(json["printer_id"], 7);
    }

    #[test]
    fn remote_config_tolerates_missing_fields() {
        let cfg: RemoteConfig = serde_json::from_str("{}").unwrap();
        assert!(cfg.polling_interval.is_none());
        assert!(cfg.subnets.is_none());

        let cfg: RemoteConfig =
            serde_json::from_str(r#"{"discovery_interval": 3600, "subnets": ["10.0.0.0/24"]}"#)
                .unwrap();
        assert_eq!(cfg.discovery_interval, Some(3600));
        assert_eq!(cfg.subnets.as_deref(), Some(&["10.0.0.0/24".to_string()][..]));
    }

    #[test]
    fn register_response_defaults() {
        let resp: RegisterResponse = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(resp.success);
        assert!(resp.token.is_none());
    }
}
