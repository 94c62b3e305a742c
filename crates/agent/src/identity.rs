use std::io::{self, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Who this agent is, across restarts. Generated on first run and persisted
/// next to the database; `api_key` stays `None` until the server issues one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentIdentity {
    pub agent_id: String,
    pub name: String,
    pub hostname: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl AgentIdentity {
    pub fn load_or_create(path: &Path, name: Option<&str>) -> io::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            return serde_json::from_str(&data)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e));
        }

        let hostname =
            sysinfo::System::host_name().unwrap_or_else(|| "unknown".to_string());
        let identity = Self {
            agent_id: printwatch_common::agent_id::generate(),
            name: name.map(str::to_string).unwrap_or_else(|| hostname.clone()),
            hostname,
            api_key: None,
        };
        identity.save(path)?;
        Ok(identity)
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let mut f = std::fs::File::create(path)?;
        f.write_all(json.as_bytes())?;
        f.sync_all()?;
        Ok(())
    }

    pub fn is_registered(&self) -> bool {
        self.api_key.is_some()
    }
}
