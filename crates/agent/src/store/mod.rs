mod records;
mod sqlite;

pub use records::{DiscoveredPrinter, MetricSample, NewSample, PrinterIdentity, UpsertOutcome};
pub use sqlite::{Store, StoreError};

/// Cursor names in the `sync_cursors` table.
pub mod cursors {
    pub const PRINTERS: &str = "printers";
    pub const METRICS: &str = "metrics";
}
