use serde::Deserialize;

/// Bootstrap configuration file. Authoritative until the first successful
/// config pull from the server; interval and network values can be overridden
/// remotely after that.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AgentConfig {
    #[serde(default)]
    pub agent: AgentSection,
    pub server: ServerSection,
    pub network: NetworkSection,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AgentSection {
    pub name: Option<String>,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_polling_interval")]
    pub polling_interval_seconds: u64,
    #[serde(default = "default_discovery_interval")]
    pub discovery_interval_seconds: u64,
    #[serde(default = "default_sync_interval")]
    pub sync_interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerSection {
    pub url: String,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NetworkSection {
    pub subnets: Vec<String>,
    #[serde(default = "default_community")]
    pub snmp_community: String,
    #[serde(default = "default_snmp_timeout")]
    pub snmp_timeout_seconds: u64,
    #[serde(default = "default_probe_concurrency")]
    pub probe_concurrency: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            name: None,
            data_dir: default_data_dir(),
            polling_interval_seconds: default_polling_interval(),
            discovery_interval_seconds: default_discovery_interval(),
            sync_interval_seconds: default_sync_interval(),
        }
    }
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_polling_interval() -> u64 {
    300
}

fn default_discovery_interval() -> u64 {
    86_400
}

fn default_sync_interval() -> u64 {
    60
}

fn default_http_timeout() -> u64 {
    10
}

fn default_community() -> String {
    "public".to_string()
}

fn default_snmp_timeout() -> u64 {
    2
}

fn default_probe_concurrency() -> usize {
    32
}
