use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use printwatch_common::oids;

use crate::config::EffectiveConfig;
use crate::probe::{Probe, ProbeError, ProbeTarget};
use crate::store::{NewSample, PrinterIdentity, Store};

/// Collects a metrics sample from every known printer. A printer that does
/// not answer still gets a sample, marked offline, so gaps in reachability
/// are visible in the history rather than silent.
pub struct MetricPoller {
    pub probe: Arc<dyn Probe>,
    pub store: Arc<Mutex<Store>>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollSummary {
    pub printers_polled: usize,
    pub offline: usize,
}

impl MetricPoller {
    pub async fn run_cycle(&self, cfg: &EffectiveConfig) -> PollSummary {
        let printers = match self.store.lock().await.all_printers() {
            Ok(printers) => printers,
            Err(e) => {
                tracing::error!(error = %e, "cannot list printers, skipping poll cycle");
                return PollSummary::default();
            }
        };

        let semaphore = Arc::new(Semaphore::new(cfg.probe_concurrency));
        let mut probes: JoinSet<Option<NewSample>> = JoinSet::new();
        for printer in printers {
            let probe = self.probe.clone();
            let semaphore = semaphore.clone();
            let community = cfg.snmp_community.clone();
            let timeout = cfg.snmp_timeout;
            probes.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                Some(poll_one(probe.as_ref(), &printer, &community, timeout).await)
            });
        }

        let mut summary = PollSummary::default();
        while let Some(joined) = probes.join_next().await {
            let Ok(Some(sample)) = joined else { continue };
            summary.printers_polled += 1;
            if sample.status == "offline" {
                summary.offline += 1;
            }
            let store = self.store.lock().await;
            if let Err(e) = store.insert_sample(&sample) {
                tracing::error!(
                    printer_id = sample.printer_id,
                    error = %e,
                    "failed to persist sample"
                );
            }
        }

        tracing::info!(
            polled = summary.printers_polled,
            offline = summary.offline,
            "poll cycle complete"
        );
        summary
    }
}

async fn poll_one(
    probe: &dyn Probe,
    printer: &PrinterIdentity,
    community: &str,
    timeout: std::time::Duration,
) -> NewSample {
    let host = match printer.ip_address.parse() {
        Ok(host) => host,
        Err(_) => {
            tracing::warn!(
                printer_id = printer.id,
                ip = %printer.ip_address,
                "stored address is not IPv4"
            );
            return offline_sample(printer.id);
        }
    };
    let target = ProbeTarget {
        host,
        community: community.to_string(),
    };
    match probe.probe(&target, oids::METRIC_SET, timeout).await {
        Ok(values) => sample_from_values(printer.id, &values),
        Err(e) => {
            if !matches!(e, ProbeError::Timeout) {
                tracing::warn!(printer_id = printer.id, error = %e, "metrics probe failed");
            }
            offline_sample(printer.id)
        }
    }
}

/// Sampled at construction, after the probe finished, so timestamps within
/// one printer's history are ordered even when probes run concurrently.
fn sample_from_values(printer_id: i64, values: &HashMap<&'static str, String>) -> NewSample {
    let mut toner_levels = BTreeMap::new();
    for color in ["black", "cyan", "magenta", "yellow"] {
        if let Some(level) = values
            .get(format!("toner_{color}").as_str())
            .and_then(|v| v.parse::<i64>().ok())
        {
            toner_levels.insert(color.to_string(), level);
        }
    }
    NewSample {
        printer_id,
        timestamp: Utc::now(),
        page_count: values.get("page_count").and_then(|v| v.parse().ok()),
        toner_levels,
        status: values
            .get("status")
            .cloned()
            .unwrap_or_else(|| "online".to_string()),
        error_state: values.get("error_state").cloned(),
        raw_data: serde_json::to_value(values).ok(),
    }
}

fn offline_sample(printer_id: i64) -> NewSample {
    NewSample {
        printer_id,
        timestamp: Utc::now(),
        page_count: None,
        toner_levels: BTreeMap::new(),
        status: "offline".to_string(),
        error_state: None,
        raw_data: None,
    }
}
