use std::net::Ipv4Addr;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use printwatch_common::oids;

use crate::config::EffectiveConfig;
use crate::probe::{Probe, ProbeTarget};
use crate::store::{DiscoveredPrinter, Store};

/// Scans every usable host in the configured subnets for SNMP-speaking
/// printers. Hosts that answer at least one identity OID are upserted into
/// the store; silence is the expected common case and is not an error.
pub struct DiscoveryScanner {
    pub probe: Arc<dyn Probe>,
    pub store: Arc<Mutex<Store>>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DiscoverySummary {
    pub hosts_scanned: usize,
    pub printers_found: usize,
}

impl DiscoveryScanner {
    pub async fn run_cycle(&self, cfg: &EffectiveConfig) -> DiscoverySummary {
        let semaphore = Arc::new(Semaphore::new(cfg.probe_concurrency));
        let mut summary = DiscoverySummary::default();

        // Hosts are independent: a dead subnet degrades to zero discoveries
        // for that subnet while the others still complete.
        for subnet in &cfg.subnets {
            tracing::info!(subnet = %subnet, hosts = subnet.host_count(), "scanning subnet");
            let mut probes: JoinSet<Option<(Ipv4Addr, DiscoveredPrinter)>> = JoinSet::new();

            for host in subnet.hosts() {
                let probe = self.probe.clone();
                let semaphore = semaphore.clone();
                let target = ProbeTarget {
                    host,
                    community: cfg.snmp_community.clone(),
                };
                let timeout = cfg.snmp_timeout;
                probes.spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok()?;
                    match probe.probe(&target, oids::IDENTITY_SET, timeout).await {
                        Ok(values) if !values.is_empty() => {
                            Some((target.host, identity_from_values(target.host, &values)))
                        }
                        Ok(_) => None,
                        Err(e) => {
                            tracing::debug!(host = %target.host, error = %e, "no answer");
                            None
                        }
                    }
                });
            }

            while let Some(joined) = probes.join_next().await {
                summary.hosts_scanned += 1;
                let Ok(Some((host, printer))) = joined else {
                    continue;
                };
                let store = self.store.lock().await;
                match store.upsert_printer(&printer, Utc::now()) {
                    Ok(outcome) => {
                        summary.printers_found += 1;
                        tracing::info!(
                            host = %host,
                            printer_id = outcome.id,
                            new = outcome.inserted,
                            "printer discovered"
                        );
                    }
                    Err(e) => {
                        // Threatens the at-least-once guarantee; shout, but
                        // keep scanning.
                        tracing::error!(host = %host, error = %e, "failed to persist printer");
                    }
                }
            }
        }

        tracing::info!(
            hosts = summary.hosts_scanned,
            printers = summary.printers_found,
            "discovery cycle complete"
        );
        summary
    }
}

fn identity_from_values(
    host: Ipv4Addr,
    values: &std::collections::HashMap<&'static str, String>,
) -> DiscoveredPrinter {
    DiscoveredPrinter {
        ip_address: host.to_string(),
        serial_number: values.get("serial_number").cloned(),
        model: values.get("model").cloned(),
        name: values.get("name").cloned(),
        status: Some("online".to_string()),
    }
}
