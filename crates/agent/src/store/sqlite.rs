use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::records::{
    DiscoveredPrinter, MetricSample, NewSample, PrinterIdentity, UpsertOutcome,
};

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sqlite(rusqlite::Error),
    Serialize(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Sqlite(e) => write!(f, "sqlite: {e}"),
            Self::Serialize(msg) => write!(f, "serialize: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sqlite(e)
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS printers (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    ip_address      TEXT NOT NULL UNIQUE,
    serial_number   TEXT,
    model           TEXT,
    name            TEXT,
    status          TEXT,
    last_seen       TEXT NOT NULL,
    pending_update  INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS metrics (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    printer_id   INTEGER NOT NULL REFERENCES printers(id),
    timestamp    TEXT NOT NULL,
    page_count   INTEGER,
    toner_levels TEXT,
    status       TEXT NOT NULL,
    error_state  TEXT,
    raw_data     TEXT
);

CREATE TABLE IF NOT EXISTS sync_cursors (
    entity          TEXT PRIMARY KEY,
    last_pushed_id  INTEGER NOT NULL DEFAULT 0
);
";

/// Embedded system of record for printers, samples and sync cursors.
///
/// The store is the only shared mutable resource in the agent; callers hold
/// it behind a single `tokio::sync::Mutex` so writes never interleave. WAL
/// journaling with `synchronous=FULL` makes an acknowledged write durable
/// across process restart.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        conn.execute_batch("PRAGMA synchronous = FULL; PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Coalescing upsert: fields the probe did not supply keep their stored
    /// values. An already-known printer whose serial, model or name gains or
    /// changes a value is flagged `pending_update` for re-sync.
    pub fn upsert_printer(
        &self,
        printer: &DiscoveredPrinter,
        seen_at: DateTime<Utc>,
    ) -> Result<UpsertOutcome, StoreError> {
        match self.printer_by_ip(&printer.ip_address)? {
            None => {
                self.conn.execute(
                    "INSERT INTO printers
                       (ip_address, serial_number, model, name, status, last_seen)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        printer.ip_address,
                        printer.serial_number,
                        printer.model,
                        printer.name,
                        printer.status,
                        seen_at.to_rfc3339(),
                    ],
                )?;
                Ok(UpsertOutcome {
                    id: self.conn.last_insert_rowid(),
                    inserted: true,
                    changed: true,
                })
            }
            Some(existing) => {
                let serial = printer
                    .serial_number
                    .clone()
                    .or_else(|| existing.serial_number.clone());
                let model = printer.model.clone().or_else(|| existing.model.clone());
                let name = printer.name.clone().or_else(|| existing.name.clone());
                let status = printer.status.clone().or_else(|| existing.status.clone());

                let changed = serial != existing.serial_number
                    || model != existing.model
                    || name != existing.name;

                self.conn.execute(
                    "UPDATE printers
                        SET serial_number = ?1, model = ?2, name = ?3, status = ?4,
                            last_seen = ?5,
                            pending_update = CASE WHEN ?6 THEN 1 ELSE pending_update END
                      WHERE id = ?7",
                    params![
                        serial,
                        model,
                        name,
                        status,
                        seen_at.to_rfc3339(),
                        changed,
                        existing.id,
                    ],
                )?;
                Ok(UpsertOutcome {
                    id: existing.id,
                    inserted: false,
                    changed,
                })
            }
        }
    }

    pub fn printer_by_ip(&self, ip: &str) -> Result<Option<PrinterIdentity>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, ip_address, serial_number, model, name, status, last_seen,
                        pending_update
                   FROM printers WHERE ip_address = ?1",
                params![ip],
                row_to_printer,
            )
            .optional()?;
        Ok(row)
    }

    pub fn all_printers(&self) -> Result<Vec<PrinterIdentity>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, ip_address, serial_number, model, name, status, last_seen,
                    pending_update
               FROM printers ORDER BY id",
        )?;
        let rows = stmt.query_map([], row_to_printer)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Printers not yet pushed at all: everything past the cursor, in id order.
    pub fn unsynced_printers(
        &self,
        after: i64,
        limit: usize,
    ) -> Result<Vec<PrinterIdentity>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, ip_address, serial_number, model, name, status, last_seen,
                    pending_update
               FROM printers WHERE id > ?1 ORDER BY id LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![after, limit as i64], row_to_printer)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Already-pushed printers whose identity changed since the last ack.
    pub fn pending_update_printers(
        &self,
        cursor: i64,
        limit: usize,
    ) -> Result<Vec<PrinterIdentity>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, ip_address, serial_number, model, name, status, last_seen,
                    pending_update
               FROM printers
              WHERE pending_update = 1 AND id <= ?1 ORDER BY id LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![cursor, limit as i64], row_to_printer)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn clear_pending_update(&self, printer_id: i64) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE printers SET pending_update = 0 WHERE id = ?1",
            params![printer_id],
        )?;
        Ok(())
    }

    /// Manual serial override, re-flagged for sync.
    pub fn set_printer_serial(&self, ip: &str, serial: &str) -> Result<bool, StoreError> {
        let changed = self.conn.execute(
            "UPDATE printers SET serial_number = ?1, pending_update = 1
              WHERE ip_address = ?2",
            params![serial, ip],
        )?;
        Ok(changed > 0)
    }

    pub fn insert_sample(&self, sample: &NewSample) -> Result<i64, StoreError> {
        let toner = serde_json::to_string(&sample.toner_levels)
            .map_err(|e| StoreError::Serialize(e.to_string()))?;
        let raw = sample
            .raw_data
            .as_ref()
            .map(|v| serde_json::to_string(v))
            .transpose()
            .map_err(|e| StoreError::Serialize(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO metrics
               (printer_id, timestamp, page_count, toner_levels, status, error_state, raw_data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                sample.printer_id,
                sample.timestamp.to_rfc3339(),
                sample.page_count,
                toner,
                sample.status,
                sample.error_state,
                raw,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn unsynced_samples(
        &self,
        after: i64,
        limit: usize,
    ) -> Result<Vec<MetricSample>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, printer_id, timestamp, page_count, toner_levels, status,
                    error_state, raw_data
               FROM metrics WHERE id > ?1 ORDER BY id LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![after, limit as i64], row_to_sample)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn samples_for_printer(&self, printer_id: i64) -> Result<Vec<MetricSample>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, printer_id, timestamp, page_count, toner_levels, status,
                    error_state, raw_data
               FROM metrics WHERE printer_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![printer_id], row_to_sample)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn cursor(&self, entity: &str) -> Result<i64, StoreError> {
        let value = self
            .conn
            .query_row(
                "SELECT last_pushed_id FROM sync_cursors WHERE entity = ?1",
                params![entity],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.unwrap_or(0))
    }

    /// Cursors only move forward, and only after a server ack.
    pub fn advance_cursor(&self, entity: &str, id: i64) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO sync_cursors (entity, last_pushed_id) VALUES (?1, ?2)
             ON CONFLICT(entity) DO UPDATE
                SET last_pushed_id = MAX(last_pushed_id, excluded.last_pushed_id)",
            params![entity, id],
        )?;
        Ok(())
    }
}

fn row_to_printer(row: &Row<'_>) -> rusqlite::Result<PrinterIdentity> {
    Ok(PrinterIdentity {
        id: row.get(0)?,
        ip_address: row.get(1)?,
        serial_number: row.get(2)?,
        model: row.get(3)?,
        name: row.get(4)?,
        status: row.get(5)?,
        last_seen: parse_ts(row, 6)?,
        pending_update: row.get::<_, i64>(7)? != 0,
    })
}

fn row_to_sample(row: &Row<'_>) -> rusqlite::Result<MetricSample> {
    let toner: Option<String> = row.get(4)?;
    let toner_levels: BTreeMap<String, i64> = match toner {
        Some(text) => serde_json::from_str(&text).map_err(|e| bad_column(4, e))?,
        None => BTreeMap::new(),
    };
    let raw: Option<String> = row.get(7)?;
    let raw_data = raw
        .map(|text| serde_json::from_str(&text))
        .transpose()
        .map_err(|e| bad_column(7, e))?;
    Ok(MetricSample {
        id: row.get(0)?,
        printer_id: row.get(1)?,
        timestamp: parse_ts(row, 2)?,
        page_count: row.get(3)?,
        toner_levels,
        status: row.get(5)?,
        error_state: row.get(6)?,
        raw_data,
    })
}

fn parse_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| bad_column(idx, e))
}

fn bad_column<E: std::error::Error + Send + Sync + 'static>(
    idx: usize,
    err: E,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

#[cfg(test)]
mod tests {
    use super::super::cursors;
    use super::*;

    fn open_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("agent.db")).unwrap();
        (dir, store)
    }

    fn full_printer(ip: &str) -> DiscoveredPrinter {
        DiscoveredPrinter {
            ip_address: ip.to_string(),
            serial_number: Some("SN-1".into()),
            model: Some("LaserJet 400".into()),
            name: Some("office-printer".into()),
            status: Some("online".into()),
        }
    }

    fn sample_for(printer_id: i64, ts: DateTime<Utc>) -> NewSample {
        NewSample {
            printer_id,
            timestamp: ts,
            page_count: Some(1234),
            toner_levels: [("black".to_string(), 80i64)].into_iter().collect(),
            status: "online".into(),
            error_state: None,
            raw_data: Some(serde_json::json!({"page_count": "1234"})),
        }
    }

    #[test]
    fn insert_then_fetch_printer() {
        let (_dir, store) = open_store();
        let out = store
            .upsert_printer(&full_printer("192.168.1.10"), Utc::now())
            .unwrap();
        assert!(out.inserted);

        let found = store.printer_by_ip("192.168.1.10").unwrap().unwrap();
        assert_eq!(found.id, out.id);
        assert_eq!(found.serial_number.as_deref(), Some("SN-1"));
        assert!(!found.pending_update);
    }

    #[test]
    fn coalesce_never_overwrites_known_fields_with_none() {
        let (_dir, store) = open_store();
        store
            .upsert_printer(&full_printer("192.168.1.10"), Utc::now())
            .unwrap();

        let partial = DiscoveredPrinter {
            ip_address: "192.168.1.10".into(),
            status: Some("online".into()),
            ..Default::default()
        };
        let out = store.upsert_printer(&partial, Utc::now()).unwrap();
        assert!(!out.inserted);
        assert!(!out.changed);

        let found = store.printer_by_ip("192.168.1.10").unwrap().unwrap();
        assert_eq!(found.serial_number.as_deref(), Some("SN-1"));
        assert_eq!(found.model.as_deref(), Some("LaserJet 400"));
        assert_eq!(found.name.as_deref(), Some("office-printer"));
        assert!(!found.pending_update);
    }

    #[test]
    fn material_change_flags_pending_update() {
        let (_dir, store) = open_store();
        store
            .upsert_printer(&full_printer("192.168.1.10"), Utc::now())
            .unwrap();

        let renamed = DiscoveredPrinter {
            ip_address: "192.168.1.10".into(),
            name: Some("floor2-printer".into()),
            ..Default::default()
        };
        let out = store.upsert_printer(&renamed, Utc::now()).unwrap();
        assert!(out.changed);

        let found = store.printer_by_ip("192.168.1.10").unwrap().unwrap();
        assert!(found.pending_update);
        assert_eq!(found.name.as_deref(), Some("floor2-printer"));

        store.clear_pending_update(found.id).unwrap();
        let found = store.printer_by_ip("192.168.1.10").unwrap().unwrap();
        assert!(!found.pending_update);
    }

    #[test]
    fn last_seen_refresh_alone_is_not_a_change() {
        let (_dir, store) = open_store();
        store
            .upsert_printer(&full_printer("192.168.1.10"), Utc::now())
            .unwrap();
        let out = store
            .upsert_printer(&full_printer("192.168.1.10"), Utc::now())
            .unwrap();
        assert!(!out.changed);
    }

    #[test]
    fn set_serial_flags_for_resync() {
        let (_dir, store) = open_store();
        store
            .upsert_printer(&full_printer("192.168.1.10"), Utc::now())
            .unwrap();
        assert!(store.set_printer_serial("192.168.1.10", "SN-2").unwrap());
        let found = store.printer_by_ip("192.168.1.10").unwrap().unwrap();
        assert_eq!(found.serial_number.as_deref(), Some("SN-2"));
        assert!(found.pending_update);

        assert!(!store.set_printer_serial("10.0.0.1", "SN-X").unwrap());
    }

    #[test]
    fn samples_round_trip_and_stay_ordered() {
        let (_dir, store) = open_store();
        let printer = store
            .upsert_printer(&full_printer("192.168.1.10"), Utc::now())
            .unwrap();

        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(300);
        store.insert_sample(&sample_for(printer.id, t0)).unwrap();
        store.insert_sample(&sample_for(printer.id, t1)).unwrap();

        let samples = store.samples_for_printer(printer.id).unwrap();
        assert_eq!(samples.len(), 2);
        assert!(samples[0].timestamp <= samples[1].timestamp);
        assert_eq!(samples[0].toner_levels.get("black"), Some(&80));
        assert_eq!(samples[0].page_count, Some(1234));
    }

    #[test]
    fn offline_sample_with_no_metrics_is_storable() {
        let (_dir, store) = open_store();
        let printer = store
            .upsert_printer(&full_printer("192.168.1.10"), Utc::now())
            .unwrap();
        let offline = NewSample {
            printer_id: printer.id,
            timestamp: Utc::now(),
            page_count: None,
            toner_levels: BTreeMap::new(),
            status: "offline".into(),
            error_state: None,
            raw_data: None,
        };
        store.insert_sample(&offline).unwrap();
        let samples = store.samples_for_printer(printer.id).unwrap();
        assert_eq!(samples[0].status, "offline");
        assert!(samples[0].page_count.is_none());
        assert!(samples[0].toner_levels.is_empty());
    }

    #[test]
    fn cursor_defaults_to_zero_and_only_moves_forward() {
        let (_dir, store) = open_store();
        assert_eq!(store.cursor(cursors::METRICS).unwrap(), 0);
        store.advance_cursor(cursors::METRICS, 5).unwrap();
        assert_eq!(store.cursor(cursors::METRICS).unwrap(), 5);
        store.advance_cursor(cursors::METRICS, 3).unwrap();
        assert_eq!(store.cursor(cursors::METRICS).unwrap(), 5);
    }

    #[test]
    fn unsynced_queries_respect_cursor_and_limit() {
        let (_dir, store) = open_store();
        let printer = store
            .upsert_printer(&full_printer("192.168.1.10"), Utc::now())
            .unwrap();
        for _ in 0..5 {
            store
                .insert_sample(&sample_for(printer.id, Utc::now()))
                .unwrap();
        }
        let all = store.unsynced_samples(0, 100).unwrap();
        assert_eq!(all.len(), 5);
        let after_two = store.unsynced_samples(all[1].id, 100).unwrap();
        assert_eq!(after_two.len(), 3);
        let limited = store.unsynced_samples(0, 2).unwrap();
        assert_eq!(limited.len(), 2);

        assert_eq!(store.unsynced_printers(0, 100).unwrap().len(), 1);
        assert_eq!(store.unsynced_printers(printer.id, 100).unwrap().len(), 0);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.db");
        {
            let store = Store::open(&path).unwrap();
            let printer = store
                .upsert_printer(&full_printer("192.168.1.10"), Utc::now())
                .unwrap();
            store
                .insert_sample(&sample_for(printer.id, Utc::now()))
                .unwrap();
            store.advance_cursor(cursors::PRINTERS, printer.id).unwrap();
        }
        {
            let store = Store::open(&path).unwrap();
            assert_eq!(store.all_printers().unwrap().len(), 1);
            assert_eq!(store.unsynced_samples(0, 100).unwrap().len(), 1);
            assert_eq!(store.cursor(cursors::PRINTERS).unwrap(), 1);
        }
    }
}
