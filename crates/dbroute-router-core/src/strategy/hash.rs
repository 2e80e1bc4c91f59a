//! Hash Routing Strategy
//!
//! Maps a routing key value to a database and a table shard using a
//! content hash, so the same key lands on the same shard in every process.
//! The database contribution is divided out before reducing by the table
//! count, which keeps table indices independent of database assignment.

use blake3::Hasher;
use tracing::trace;

use dbroute_core::shard::format_index;
use dbroute_core::{HashFunction, RouterConfig};

use super::RoutingStrategy;
use crate::error::RouterError;
use crate::types::RoutingDecision;

/// Hash-modulo routing strategy over a fixed `db_count × tb_count` layout
#[derive(Debug, Clone)]
pub struct HashRoutingStrategy {
    db_count: u32,
    tb_count: u32,
    hash_function: HashFunction,
}

impl HashRoutingStrategy {
    /// Create a strategy for the layout described by `config`
    pub fn new(config: &RouterConfig) -> Self {
        Self {
            db_count: config.db_count(),
            tb_count: config.tb_count(),
            hash_function: config.hash_function(),
        }
    }

    /// Non-negative content hash of a key value
    pub fn hash_key(&self, key: &str) -> u64 {
        match self.hash_function {
            HashFunction::Blake3 => blake3_hash(key) & i64::MAX as u64,
            HashFunction::JavaString => (java_string_hash(key) & i32::MAX) as u64,
        }
    }
}

/// Hash a string key using blake3
fn blake3_hash(key: &str) -> u64 {
    let mut hasher = Hasher::new();
    hasher.update(key.as_bytes());
    let hash = hasher.finalize();
    let bytes = hash.as_bytes();
    u64::from_le_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3],
        bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}

/// `s[0]*31^(n-1) + ... + s[n-1]` over UTF-16 code units, wrapping at 32 bits
fn java_string_hash(key: &str) -> i32 {
    key.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32))
}

fn checked_index(dimension: &'static str, raw: u64, count: u32) -> Result<u32, RouterError> {
    u32::try_from(raw)
        .ok()
        .filter(|&index| index < count)
        .ok_or(RouterError::IndexOutOfRange { dimension, index: raw, count })
}

impl RoutingStrategy for HashRoutingStrategy {
    fn route(&self, key: &str) -> Result<RoutingDecision, RouterError> {
        if key.is_empty() {
            return Err(RouterError::EmptyKey);
        }

        let hash = self.hash_key(key);
        let db = u64::from(self.db_count);
        let tb = u64::from(self.tb_count);

        let db_index = checked_index("database", hash % db, self.db_count)?;
        let tb_index = checked_index("table", (hash / db) % tb, self.tb_count)?;

        trace!(key = %key, hash = %hash, db_index, tb_index, "Hash route lookup");

        Ok(RoutingDecision {
            db_index,
            tb_index,
            db_key: format_index(db_index, self.db_count),
            tb_key: format_index(tb_index, self.tb_count),
        })
    }

    fn name(&self) -> &'static str {
        "Hash"
    }
}
