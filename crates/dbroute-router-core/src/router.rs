//! Shard Router
//!
//! Wires the routing pieces together behind the three host hooks:
//!
//! ```text
//! around-call hook          ──► RoutingInterceptor ──► RoutingContext (write)
//!        │                                                  │
//!        ▼                                                  │
//! connection-acquisition    ──► DataSourceSelector ◄────────┤ (read db_key)
//!        │                                                  │
//!        ▼                                                  │
//! statement-preparation     ──► QueryRewriter ◄─────────────┘ (read tb_key)
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use dbroute_core::{RouterConfig, RouterSettings};

use crate::args::RouteKeySource;
use crate::error::RouterError;
use crate::interceptor::RoutingInterceptor;
use crate::marker::{OperationMarkers, OperationRegistry};
use crate::rewriter::{BoundStatement, QueryRewriter, StatementHook};
use crate::selector::DataSourceSelector;
use crate::strategy::{HashRoutingStrategy, RoutingStrategy};
use crate::types::RoutingDecision;

/// Sharding router for one database layout
pub struct ShardRouter {
    config: RouterConfig,
    strategy: Arc<HashRoutingStrategy>,
    registry: Arc<OperationRegistry>,
    interceptor: RoutingInterceptor,
    selector: DataSourceSelector,
    rewriter: QueryRewriter,
}

impl ShardRouter {
    /// Create a router; `default_pool` serves unrouted operations
    pub fn new(config: RouterConfig, default_pool: impl Into<String>) -> Self {
        let strategy = Arc::new(HashRoutingStrategy::new(&config));
        let registry = Arc::new(OperationRegistry::new(config.router_key()));
        let interceptor = RoutingInterceptor::new(strategy.clone(), Arc::clone(&registry));

        Self {
            config,
            strategy,
            registry,
            interceptor,
            selector: DataSourceSelector::new(default_pool),
            rewriter: QueryRewriter::new(),
        }
    }

    /// Create from validated settings
    pub fn from_settings(settings: &RouterSettings) -> Result<Self, RouterError> {
        settings.validate()?;
        Ok(Self::new(settings.router.clone(), settings.default_pool.clone()))
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }

    pub fn interceptor(&self) -> &RoutingInterceptor {
        &self.interceptor
    }

    pub fn selector(&self) -> &DataSourceSelector {
        &self.selector
    }

    pub fn rewriter(&self) -> &QueryRewriter {
        &self.rewriter
    }

    /// Attach markers to every operation of a type
    pub fn register_type(&self, type_name: impl Into<String>, markers: OperationMarkers) {
        self.registry.register_type(type_name, markers);
    }

    /// Attach markers to a single operation
    pub fn register_method(&self, operation_id: impl Into<String>, markers: OperationMarkers) {
        self.registry.register_method(operation_id, markers);
    }

    /// Route a key value without entering a routed call
    pub fn route(&self, key: &str) -> Result<RoutingDecision, RouterError> {
        self.strategy.route(key)
    }

    /// Around-call hook, see [`RoutingInterceptor::around`]
    pub async fn around<A, F, Fut, T, E>(&self, operation_id: &str, args: &A, call: F) -> Result<T, E>
    where
        A: RouteKeySource + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<RouterError>,
    {
        self.interceptor.around(operation_id, args, call).await
    }

    /// Blocking around-call hook, see [`RoutingInterceptor::around_blocking`]
    pub fn around_blocking<A, F, T, E>(&self, operation_id: &str, args: &A, call: F) -> Result<T, E>
    where
        A: RouteKeySource + ?Sized,
        F: FnOnce() -> Result<T, E>,
        E: From<RouterError>,
    {
        self.interceptor.around_blocking(operation_id, args, call)
    }

    /// Connection-acquisition hook
    pub fn resolve_pool(&self) -> Cow<'_, str> {
        self.selector.resolve_pool()
    }
}

impl StatementHook for ShardRouter {
    fn before_prepare(&self, statement: &mut BoundStatement) -> Result<(), RouterError> {
        let split = self.registry.split_marker(statement.statement_id());
        self.rewriter.prepare(statement, split)?;
        Ok(())
    }
}
