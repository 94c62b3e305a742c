pub mod agent_id;
pub mod api;
pub mod oids;
