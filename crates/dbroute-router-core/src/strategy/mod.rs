//! Routing Strategies
//!
//! A strategy maps a routing key value to a [`RoutingDecision`]:
//!
//! ```text
//! key value ──hash──► u64 ──mod db_count──────────────► db_index
//!                        └─div db_count──mod tb_count─► tb_index
//! ```
//!
//! - `HashRoutingStrategy`: content hash (blake3 or JVM string hash)

mod hash;

pub use hash::HashRoutingStrategy;

use crate::error::RouterError;
use crate::types::RoutingDecision;

/// Trait for key → shard routing strategies
pub trait RoutingStrategy: Send + Sync {
    /// Route a key value to a shard.
    ///
    /// Must be deterministic across calls and process restarts.
    fn route(&self, key: &str) -> Result<RoutingDecision, RouterError>;

    /// Strategy name for logging
    fn name(&self) -> &'static str;
}
