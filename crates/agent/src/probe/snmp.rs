use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use csnmp::{ObjectIdentifier, ObjectValue, Snmp2cClient};

use super::{Probe, ProbeError, ProbeTarget};

const SNMP_PORT: u16 = 161;

/// SNMP v2c probe over UDP. One client per probe call; the agent's probe
/// volume is a few requests per host per cycle, so connection reuse does not
/// pay for the added state.
pub struct SnmpProbe;

impl SnmpProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SnmpProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for SnmpProbe {
    async fn probe(
        &self,
        target: &ProbeTarget,
        oids: &[(&'static str, &'static str)],
        timeout: Duration,
    ) -> Result<HashMap<&'static str, String>, ProbeError> {
        let addr = SocketAddr::new(IpAddr::V4(target.host), SNMP_PORT);

        let client = tokio::time::timeout(
            timeout,
            Snmp2cClient::new(
                addr,
                target.community.as_bytes().to_vec(),
                None,
                Some(timeout),
            ),
        )
        .await
        .map_err(|_| ProbeError::Timeout)?
        .map_err(|e| ProbeError::Unreachable(e.to_string()))?;

        let mut values = HashMap::new();
        for (field, oid_str) in oids {
            let oid: ObjectIdentifier = match oid_str.parse() {
                Ok(oid) => oid,
                Err(_) => continue,
            };
            match tokio::time::timeout(timeout, client.get(oid)).await {
                Ok(Ok(value)) => {
                    let rendered = render(&value);
                    if !rendered.is_empty() {
                        values.insert(*field, rendered);
                    }
                }
                // Missing OIDs are expected on many devices. A host that has
                // answered nothing at all and now times out is unreachable.
                Ok(Err(_)) => continue,
                Err(_) if values.is_empty() => return Err(ProbeError::Timeout),
                Err(_) => continue,
            }
        }
        Ok(values)
    }
}

fn render(value: &ObjectValue) -> String {
    match value {
        ObjectValue::Integer(v) => v.to_string(),
        ObjectValue::String(bytes) => String::from_utf8_lossy(bytes).trim().to_string(),
        ObjectValue::Counter32(v) => v.to_string(),
        ObjectValue::Unsigned32(v) => v.to_string(),
        ObjectValue::TimeTicks(v) => v.to_string(),
        ObjectValue::Counter64(v) => v.to_string(),
        other => format!("{other:?}"),
    }
}
