mod client;
mod cycle;
mod retry;

pub use client::{SyncClient, SyncError};
pub use cycle::{SyncEngine, SyncSummary};
pub use retry::RetryPolicy;
