pub mod cli;
pub mod config;
pub mod discovery;
pub mod identity;
pub mod net;
pub mod poller;
pub mod probe;
pub mod run;
pub mod scheduler;
pub mod store;
pub mod sync;
