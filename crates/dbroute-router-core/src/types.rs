//! Common types for the router module

use serde::{Deserialize, Serialize};

use dbroute_core::shard;

/// Shard chosen for one routed call.
///
/// Produced fresh per call and never persisted. `db_key` and `tb_key` are
/// the zero-padded renderings of the indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Database index in `[0, db_count)`
    pub db_index: u32,

    /// Table index in `[0, tb_count)`
    pub tb_index: u32,

    /// Formatted database index, e.g. `"01"`
    pub db_key: String,

    /// Formatted table index, e.g. `"03"`
    pub tb_key: String,
}

impl RoutingDecision {
    /// Pool identifier for this decision (`db01`)
    pub fn pool_name(&self) -> String {
        shard::pool_name(&self.db_key)
    }

    /// Physical name of `table` under this decision (`USER_03`)
    pub fn physical_table(&self, table: &str) -> String {
        shard::physical_table(table, &self.tb_key)
    }
}

impl std::fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "db{}/tb{}", self.db_key, self.tb_key)
    }
}
