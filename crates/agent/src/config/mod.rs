mod effective;
mod loader;
mod schema;

pub use effective::{ConfigRejected, EffectiveConfig};
pub use loader::{load_from_file, load_from_str, LoadError};
pub use schema::{AgentConfig, AgentSection, NetworkSection, ServerSection};
