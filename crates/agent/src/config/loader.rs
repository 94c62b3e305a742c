use std::path::Path;

use super::schema::AgentConfig;
use crate::net::Subnet;

#[derive(Debug)]
pub enum LoadError {
    Io(std::io::Error),
    Parse(serde_yaml::Error),
    Validation(String),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Parse(e) => write!(f, "parse: {e}"),
            Self::Validation(msg) => write!(f, "validation: {msg}"),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_yaml::Error> for LoadError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Parse(e)
    }
}

pub fn load_from_file(path: &Path) -> Result<AgentConfig, LoadError> {
    let contents = std::fs::read_to_string(path)?;
    load_from_str(&contents)
}

pub fn load_from_str(yaml: &str) -> Result<AgentConfig, LoadError> {
    let cfg: AgentConfig = serde_yaml::from_str(yaml)?;
    validate(&cfg)?;
    Ok(cfg)
}

// A bad bootstrap file is fatal at startup; these checks are the gate.
fn validate(cfg: &AgentConfig) -> Result<(), LoadError> {
    if cfg.server.url.is_empty() {
        return Err(LoadError::Validation("server.url must not be empty".into()));
    }
    if cfg.agent.polling_interval_seconds == 0 {
        return Err(LoadError::Validation(
            "agent.polling_interval_seconds must be > 0".into(),
        ));
    }
    if cfg.agent.discovery_interval_seconds == 0 {
        return Err(LoadError::Validation(
            "agent.discovery_interval_seconds must be > 0".into(),
        ));
    }
    if cfg.agent.sync_interval_seconds == 0 {
        return Err(LoadError::Validation(
            "agent.sync_interval_seconds must be > 0".into(),
        ));
    }
    if cfg.network.subnets.is_empty() {
        return Err(LoadError::Validation(
            "network.subnets must list at least one subnet".into(),
        ));
    }
    for subnet in &cfg.network.subnets {
        subnet
            .parse::<Subnet>()
            .map_err(|e| LoadError::Validation(e.to_string()))?;
    }
    if cfg.network.snmp_timeout_seconds == 0 {
        return Err(LoadError::Validation(
            "network.snmp_timeout_seconds must be > 0".into(),
        ));
    }
    if cfg.network.probe_concurrency == 0 {
        return Err(LoadError::Validation(
            "network.probe_concurrency must be > 0".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
server:
  url: https://monitor.example.com/api
network:
  subnets: ["192.168.1.0/24"]
"#;

    #[test]
    fn valid_config_loads() {
        let cfg = load_from_str(VALID).unwrap();
        assert_eq!(cfg.network.subnets, vec!["192.168.1.0/24"]);
    }

    #[test]
    fn empty_server_url_rejected() {
        let yaml = r#"
server:
  url: ""
network:
  subnets: ["192.168.1.0/24"]
"#;
        let err = load_from_str(yaml).unwrap_err();
        assert!(err.to_string().contains("server.url"));
    }

    #[test]
    fn malformed_subnet_rejected() {
        let yaml = r#"
server:
  url: https://monitor.example.com/api
network:
  subnets: ["192.168.1.0/40"]
"#;
        let err = load_from_str(yaml).unwrap_err();
        assert!(matches!(err, LoadError::Validation(_)));
    }

    #[test]
    fn zero_interval_rejected() {
        let yaml = r#"
agent:
  polling_interval_seconds: 0
server:
  url: https://monitor.example.com/api
network:
  subnets: ["192.168.1.0/24"]
"#;
        let err = load_from_str(yaml).unwrap_err();
        assert!(err.to_string().contains("polling_interval_seconds"));
    }

    #[test]
    fn load_from_file_works() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.yml");
        std::fs::write(&path, VALID).unwrap();
        let cfg = load_from_file(&path).unwrap();
        assert_eq!(cfg.server.url, "https://monitor.example.com/api");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_from_file(Path::new("/nonexistent/agent.yml")).unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }
}
