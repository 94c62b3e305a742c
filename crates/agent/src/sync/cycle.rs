use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use printwatch_common::api::{
    DataEnvelope, DataKind, MetricsPayload, PrinterPayload, RegisterRequest,
};

use crate::config::EffectiveConfig;
use crate::identity::AgentIdentity;
use crate::store::{cursors, MetricSample, PrinterIdentity, Store};

use super::client::{SyncClient, SyncError};
use super::retry::RetryPolicy;

const PRINTER_BATCH: usize = 50;
const SAMPLE_BATCH: usize = 100;

/// One sync cycle: make sure the agent is registered, push unsynced printers
/// and samples in id order, then pull the server config.
///
/// The cursor for an entity only advances after the server acknowledged that
/// record, so a crash or failure mid-batch re-delivers from the last ack.
/// The server deduplicates, making redelivery harmless.
pub struct SyncEngine {
    pub client: SyncClient,
    pub store: Arc<Mutex<Store>>,
    pub identity: Arc<Mutex<AgentIdentity>>,
    pub identity_path: PathBuf,
    pub config_tx: watch::Sender<EffectiveConfig>,
    pub registration_retry: RetryPolicy,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncSummary {
    pub printers_pushed: usize,
    pub samples_pushed: usize,
    pub config_applied: bool,
    /// Registration, a push or the config pull did not complete; the next
    /// cycle resumes from the last acked record.
    pub failed: bool,
}

impl SyncEngine {
    pub async fn run_cycle(&self) -> SyncSummary {
        let Some(token) = self.ensure_registered().await else {
            return SyncSummary {
                failed: true,
                ..SyncSummary::default()
            };
        };

        let mut summary = SyncSummary::default();
        let (printers_pushed, printers_ok) = self.push_printers(&token).await;
        let (samples_pushed, samples_ok) = self.push_samples(&token).await;
        let (config_applied, config_ok) = self.pull_config(&token).await;
        summary.printers_pushed = printers_pushed;
        summary.samples_pushed = samples_pushed;
        summary.config_applied = config_applied;
        summary.failed = !(printers_ok && samples_ok && config_ok);
        tracing::info!(
            printers = summary.printers_pushed,
            samples = summary.samples_pushed,
            config_applied = summary.config_applied,
            failed = summary.failed,
            "sync cycle complete"
        );
        summary
    }

    /// Returns the API token, registering first if the agent has none.
    ///
    /// The identity lock is held across the whole attempt, so two callers can
    /// never race a double registration; the second caller finds the token
    /// already persisted.
    pub async fn ensure_registered(&self) -> Option<String> {
        let mut identity = self.identity.lock().await;
        if let Some(token) = &identity.api_key {
            return Some(token.clone());
        }

        let request = RegisterRequest {
            agent_id: identity.agent_id.clone(),
            name: identity.name.clone(),
            hostname: identity.hostname.clone(),
            ip_address: local_ip().unwrap_or_else(|| "0.0.0.0".to_string()),
            os_info: sysinfo::System::long_os_version()
                .unwrap_or_else(|| "unknown".to_string()),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };

        let mut attempt = 0;
        loop {
            match self.client.register(&request).await {
                Ok(response) if response.success => match response.token {
                    Some(token) => {
                        identity.api_key = Some(token.clone());
                        if let Err(e) = identity.save(&self.identity_path) {
                            // Token works for this process; re-registration on
                            // the next start is idempotent server-side.
                            tracing::warn!(error = %e, "could not persist api token");
                        }
                        tracing::info!(agent_id = %identity.agent_id, "agent registered");
                        return Some(token);
                    }
                    None => {
                        tracing::warn!("registration accepted but no token issued");
                        return None;
                    }
                },
                Ok(_) => tracing::warn!("registration refused by server"),
                Err(e) => tracing::warn!(error = %e, "registration attempt failed"),
            }
            attempt += 1;
            if !self.registration_retry.should_retry(attempt) {
                tracing::warn!(attempts = attempt, "registration abandoned until next cycle");
                return None;
            }
            tokio::time::sleep(self.registration_retry.delay_for_attempt(attempt)).await;
        }
    }

    async fn push_printers(&self, token: &str) -> (usize, bool) {
        let mut pushed = 0;

        // New printers past the cursor first.
        loop {
            let cursor = match self.store.lock().await.cursor(cursors::PRINTERS) {
                Ok(cursor) => cursor,
                Err(e) => {
                    tracing::error!(error = %e, "cannot read printer cursor");
                    return (pushed, false);
                }
            };
            let batch = match self
                .store
                .lock()
                .await
                .unsynced_printers(cursor, PRINTER_BATCH)
            {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::error!(error = %e, "cannot read unsynced printers");
                    return (pushed, false);
                }
            };
            if batch.is_empty() {
                break;
            }
            for printer in batch {
                let envelope = match printer_envelope(&printer, DataKind::PrinterDiscovery) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        tracing::error!(printer_id = printer.id, error = %e, "bad printer record");
                        return (pushed, false);
                    }
                };
                if let Err(e) = self.client.push(token, &envelope).await {
                    tracing::warn!(printer_id = printer.id, error = %e, "printer push failed");
                    return (pushed, false);
                }
                let store = self.store.lock().await;
                if let Err(e) = store.advance_cursor(cursors::PRINTERS, printer.id) {
                    tracing::error!(printer_id = printer.id, error = %e, "cursor not advanced");
                    return (pushed, false);
                }
                if printer.pending_update {
                    if let Err(e) = store.clear_pending_update(printer.id) {
                        tracing::error!(printer_id = printer.id, error = %e, "flag not cleared");
                    }
                }
                pushed += 1;
            }
        }

        // Then already-synced printers whose identity changed since the ack.
        // Clearing the flag shrinks the result set, so page until empty.
        loop {
            let cursor = match self.store.lock().await.cursor(cursors::PRINTERS) {
                Ok(cursor) => cursor,
                Err(e) => {
                    tracing::error!(error = %e, "cannot read printer cursor");
                    return (pushed, false);
                }
            };
            let updates = match self
                .store
                .lock()
                .await
                .pending_update_printers(cursor, PRINTER_BATCH)
            {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::error!(error = %e, "cannot read pending printer updates");
                    return (pushed, false);
                }
            };
            if updates.is_empty() {
                return (pushed, true);
            }
            for printer in updates {
                let envelope = match printer_envelope(&printer, DataKind::PrinterUpdate) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        tracing::error!(printer_id = printer.id, error = %e, "bad printer record");
                        return (pushed, false);
                    }
                };
                if let Err(e) = self.client.push(token, &envelope).await {
                    tracing::warn!(printer_id = printer.id, error = %e, "printer update push failed");
                    return (pushed, false);
                }
                if let Err(e) = self.store.lock().await.clear_pending_update(printer.id) {
                    tracing::error!(printer_id = printer.id, error = %e, "flag not cleared");
                    return (pushed, false);
                }
                pushed += 1;
            }
        }
    }

    async fn push_samples(&self, token: &str) -> (usize, bool) {
        let mut pushed = 0;
        loop {
            let cursor = match self.store.lock().await.cursor(cursors::METRICS) {
                Ok(cursor) => cursor,
                Err(e) => {
                    tracing::error!(error = %e, "cannot read metrics cursor");
                    return (pushed, false);
                }
            };
            let batch = match self.store.lock().await.unsynced_samples(cursor, SAMPLE_BATCH) {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::error!(error = %e, "cannot read unsynced samples");
                    return (pushed, false);
                }
            };
            if batch.is_empty() {
                return (pushed, true);
            }
            for sample in batch {
                let envelope = match sample_envelope(&sample) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        tracing::error!(sample_id = sample.id, error = %e, "bad sample record");
                        return (pushed, false);
                    }
                };
                if let Err(e) = self.client.push(token, &envelope).await {
                    tracing::warn!(sample_id = sample.id, error = %e, "sample push failed");
                    return (pushed, false);
                }
                if let Err(e) = self.store.lock().await.advance_cursor(cursors::METRICS, sample.id)
                {
                    tracing::error!(sample_id = sample.id, error = %e, "cursor not advanced");
                    return (pushed, false);
                }
                pushed += 1;
            }
        }
    }

    /// Returns (config applied, pull succeeded).
    async fn pull_config(&self, token: &str) -> (bool, bool) {
        let remote = match self.client.pull_config(token).await {
            Ok(remote) => remote,
            Err(e) => {
                tracing::warn!(error = %e, "config pull failed, keeping current config");
                return (false, false);
            }
        };
        let current = self.config_tx.borrow().clone();
        match current.apply_remote(&remote) {
            Ok(next) if next != current => {
                tracing::info!("applying server configuration");
                (self.config_tx.send(next).is_ok(), true)
            }
            Ok(_) => (false, true),
            Err(e) => {
                tracing::warn!(error = %e, "server config rejected, keeping current config");
                (false, false)
            }
        }
    }
}

fn printer_envelope(printer: &PrinterIdentity, kind: DataKind) -> Result<DataEnvelope, SyncError> {
    let payload = PrinterPayload {
        ip_address: printer.ip_address.clone(),
        serial_number: printer.serial_number.clone(),
        model: printer.model.clone(),
        name: printer.name.clone(),
        status: printer.status.clone(),
        last_seen: Some(printer.last_seen.to_rfc3339()),
    };
    Ok(DataEnvelope {
        kind,
        printer_id: match kind {
            DataKind::PrinterDiscovery => None,
            _ => Some(printer.id),
        },
        data: serde_json::to_value(payload).map_err(SyncError::Serialize)?,
    })
}

fn sample_envelope(sample: &MetricSample) -> Result<DataEnvelope, SyncError> {
    let payload = MetricsPayload {
        timestamp: sample.timestamp.to_rfc3339(),
        page_count: sample.page_count,
        toner_levels: sample.toner_levels.clone(),
        status: sample.status.clone(),
        error_state: sample.error_state.clone(),
        raw_data: sample.raw_data.clone(),
    };
    Ok(DataEnvelope {
        kind: DataKind::Metrics,
        printer_id: Some(sample.printer_id),
        data: serde_json::to_value(payload).map_err(SyncError::Serialize)?,
    })
}

// Routing-table trick: no packet is sent, the kernel just picks the
// outbound interface.
fn local_ip() -> Option<String> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    Some(socket.local_addr().ok()?.ip().to_string())
}
