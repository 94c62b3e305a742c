use std::time::Duration;

use printwatch_common::api::RemoteConfig;

use super::schema::AgentConfig;
use crate::net::Subnet;

/// The configuration the scheduler and scanners actually run with: bootstrap
/// values overlaid by the last good server pull. Always replaced as a whole,
/// never patched field by field.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    pub polling_interval: Duration,
    pub discovery_interval: Duration,
    pub sync_interval: Duration,
    pub subnets: Vec<Subnet>,
    pub snmp_community: String,
    pub snmp_timeout: Duration,
    pub probe_concurrency: usize,
}

#[derive(Debug)]
pub struct ConfigRejected(String);

impl std::fmt::Display for ConfigRejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "server config rejected: {}", self.0)
    }
}

impl std::error::Error for ConfigRejected {}

impl EffectiveConfig {
    /// Bootstrap values only. The subnets were already validated by the
    /// config loader, so a parse failure here is a programming error and
    /// surfaces as `ConfigRejected` all the same.
    pub fn from_bootstrap(cfg: &AgentConfig) -> Result<Self, ConfigRejected> {
        let subnets = parse_subnets(&cfg.network.subnets)?;
        Ok(Self {
            polling_interval: Duration::from_secs(cfg.agent.polling_interval_seconds),
            discovery_interval: Duration::from_secs(cfg.agent.discovery_interval_seconds),
            sync_interval: Duration::from_secs(cfg.agent.sync_interval_seconds),
            subnets,
            snmp_community: cfg.network.snmp_community.clone(),
            snmp_timeout: Duration::from_secs(cfg.network.snmp_timeout_seconds),
            probe_concurrency: cfg.network.probe_concurrency,
        })
    }

    /// Overlay a pulled config. Either every supplied field is valid and a
    /// complete new config is returned, or the pull is rejected and the
    /// current config stays in force.
    pub fn apply_remote(&self, remote: &RemoteConfig) -> Result<Self, ConfigRejected> {
        let mut next = self.clone();

        if let Some(secs) = remote.polling_interval {
            if secs == 0 {
                return Err(ConfigRejected("polling_interval must be > 0".into()));
            }
            next.polling_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = remote.discovery_interval {
            if secs == 0 {
                return Err(ConfigRejected("discovery_interval must be > 0".into()));
            }
            next.discovery_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = remote.snmp_timeout {
            if secs == 0 {
                return Err(ConfigRejected("snmp_timeout must be > 0".into()));
            }
            next.snmp_timeout = Duration::from_secs(secs);
        }
        if let Some(ref community) = remote.snmp_community {
            if community.is_empty() {
                return Err(ConfigRejected("snmp_community must not be empty".into()));
            }
            next.snmp_community = community.clone();
        }
        if let Some(ref subnets) = remote.subnets {
            if subnets.is_empty() {
                return Err(ConfigRejected("subnets must not be empty".into()));
            }
            next.subnets = parse_subnets(subnets)?;
        }

        Ok(next)
    }
}

fn parse_subnets(raw: &[String]) -> Result<Vec<Subnet>, ConfigRejected> {
    raw.iter()
        .map(|s| s.parse::<Subnet>().map_err(|e| ConfigRejected(e.to_string())))
        .collect()
}
