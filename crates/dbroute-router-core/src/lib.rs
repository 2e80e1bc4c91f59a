//! DB Router - Shard Routing Module
//!
//! Routes DAO calls to a physical database and table derived from a
//! routing key carried by the call arguments.
//!
//! # Architecture
//!
//! ```text
//! DAO call (operation id, args)
//!     │
//!     ▼
//! ┌─────────────────────────┐
//! │   RoutingInterceptor    │  Resolves markers, hashes the key
//! │   (Which shard?)        │  and opens a routing scope
//! └───────────┬─────────────┘
//!             │ RoutingContext { db_key, tb_key }
//!             ▼
//! ┌─────────────────────────┐
//! │   DataSourceSelector    │  Picks pool `db<db_key>`
//! └───────────┬─────────────┘
//!             │
//!             ▼
//! ┌─────────────────────────┐
//! │     QueryRewriter       │  Suffixes the table with `_<tb_key>`
//! └─────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use dbroute_router_core::{CallArgs, OperationMarkers, ShardRouter};
//!
//! let router = ShardRouter::new(config, "main");
//! router.register_type("UserMapper", OperationMarkers::routed().split_table(true));
//!
//! let user = router
//!     .around("UserMapper.queryById", &CallArgs::new().with("userId", "1000"), || async {
//!         let pool = router.resolve_pool();
//!         dao.query_by_id(&pool, "1000").await
//!     })
//!     .await?;
//! ```

// Core modules
mod error;
mod types;
mod args;
mod marker;

// Per-call routing state
pub mod context;

// Strategy module (contains all routing strategies)
mod strategy;

// Host hooks
mod interceptor;
mod selector;
mod rewriter;

// Facade
mod router;

// Re-exports: Error types
pub use error::{ErrorKind, RouterError};

// Re-exports: Core types
pub use types::RoutingDecision;
pub use args::{CallArgs, RouteKeySource};
pub use marker::{OperationMarkers, OperationRegistry, ResolvedOperation, RouteMarker, SplitMarker};
pub use context::RoutingContext;

// Re-exports: Strategy traits and implementations
pub use strategy::{HashRoutingStrategy, RoutingStrategy};

// Re-exports: Hooks
pub use interceptor::RoutingInterceptor;
pub use selector::{ConnectionHook, DataSourceSelector, DynamicDataSource};
pub use rewriter::{table_reference, BoundStatement, QueryRewriter, StatementHook};

// Re-exports: Router
pub use router::ShardRouter;

// Re-exports: Configuration
pub use dbroute_core::{ConfigError, HashFunction, RouterConfig, RouterSettings};
