mod snmp;

pub use snmp::SnmpProbe;

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;

/// A host to query together with the community string that authorizes reads.
#[derive(Debug, Clone)]
pub struct ProbeTarget {
    pub host: Ipv4Addr,
    pub community: String,
}

#[derive(Debug)]
pub enum ProbeError {
    /// The host did not answer within the timeout.
    Timeout,
    /// The host refused the query or the transport failed outright.
    Unreachable(String),
}

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timed out"),
            Self::Unreachable(msg) => write!(f, "unreachable: {msg}"),
        }
    }
}

impl std::error::Error for ProbeError {}

/// Bounded-timeout SNMP query against one host.
///
/// A single missing OID is not an error: the result map simply lacks that
/// key. An error means the host as a whole did not answer.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(
        &self,
        target: &ProbeTarget,
        oids: &[(&'static str, &'static str)],
        timeout: Duration,
    ) -> Result<HashMap<&'static str, String>, ProbeError>;
}
