//! Routing Interceptor
//!
//! Wraps calls to routed operations. Before the call it resolves the
//! routing key from the arguments, routes it and opens a routing scope
//! holding the decision; after the call, on every exit path, the scope is
//! cleared.
//!
//! ```text
//! around(op, args, call)
//!     │
//!     ├─ registry.resolve(op) ── not routed ──► call()
//!     │
//!     ├─ args.route_value(key) ── missing ───► Err(KeyMissing), call never runs
//!     │
//!     ├─ strategy.route(value) ─► RoutingDecision
//!     │
//!     └─ scope { set db_key [, tb_key]; call(); clear }
//! ```

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::args::RouteKeySource;
use crate::context::{self, ContextGuard};
use crate::error::RouterError;
use crate::marker::{OperationRegistry, ResolvedOperation};
use crate::strategy::RoutingStrategy;
use crate::types::RoutingDecision;

/// Around-call hook for routed operations
pub struct RoutingInterceptor {
    strategy: Arc<dyn RoutingStrategy>,
    registry: Arc<OperationRegistry>,
}

impl RoutingInterceptor {
    /// Create an interceptor over a strategy and a marker registry
    pub fn new(strategy: Arc<dyn RoutingStrategy>, registry: Arc<OperationRegistry>) -> Self {
        Self { strategy, registry }
    }

    /// Marker registry consulted for every call
    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }

    /// Compute the routing decision for a call without touching the
    /// routing context. Returns `None` for operations that are not routed.
    pub fn decide<A>(&self, operation: &ResolvedOperation, args: &A) -> Result<Option<RoutingDecision>, RouterError>
    where
        A: RouteKeySource + ?Sized,
    {
        let Some(key) = operation.route_key.as_deref() else {
            return Ok(None);
        };

        let value = args
            .route_value(key)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| RouterError::KeyMissing {
                operation: operation.id.clone(),
                key: key.to_string(),
            })?;

        let decision = self.strategy.route(&value)?;

        debug!(
            operation = %operation.id,
            key = %key,
            value = %value,
            db_key = %decision.db_key,
            tb_key = %decision.tb_key,
            split_table = operation.split.split_table,
            strategy = self.strategy.name(),
            "Routed call"
        );

        Ok(Some(decision))
    }

    /// Run an async call under the routing decision for `operation_id`.
    ///
    /// Routing failures surface through `E`; the call is not invoked when
    /// routing fails.
    pub async fn around<A, F, Fut, T, E>(&self, operation_id: &str, args: &A, call: F) -> Result<T, E>
    where
        A: RouteKeySource + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<RouterError>,
    {
        let operation = self.registry.resolve(operation_id);
        let Some(decision) = self.decide(&operation, args)? else {
            return call().await;
        };
        let split_table = operation.split.split_table;

        context::scope(async move {
            let _guard = ContextGuard::enter(&decision, split_table);
            call().await
        })
        .await
    }

    /// Blocking counterpart of [`RoutingInterceptor::around`]
    pub fn around_blocking<A, F, T, E>(&self, operation_id: &str, args: &A, call: F) -> Result<T, E>
    where
        A: RouteKeySource + ?Sized,
        F: FnOnce() -> Result<T, E>,
        E: From<RouterError>,
    {
        let operation = self.registry.resolve(operation_id);
        let Some(decision) = self.decide(&operation, args)? else {
            return call();
        };
        let split_table = operation.split.split_table;

        context::sync_scope(|| {
            let _guard = ContextGuard::enter(&decision, split_table);
            call()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::CallArgs;
    use crate::context::{current, current_db_key, current_tb_key, in_routed_scope, RoutingContext};
    use crate::error::ErrorKind;
    use crate::marker::OperationMarkers;
    use crate::strategy::HashRoutingStrategy;
    use dbroute_core::RouterConfig;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    enum DaoError {
        Router(RouterError),
        Db(String),
    }

    impl From<RouterError> for DaoError {
        fn from(e: RouterError) -> Self {
            DaoError::Router(e)
        }
    }

    fn create_interceptor() -> (RoutingInterceptor, Arc<HashRoutingStrategy>) {
        let config = RouterConfig::new(2, 4, "userId").unwrap();
        let strategy = Arc::new(HashRoutingStrategy::new(&config));
        let registry = Arc::new(OperationRegistry::new(config.router_key()));
        registry.register_type("UserMapper", OperationMarkers::routed().split_table(true));
        registry.register_type("AccountMapper", OperationMarkers::routed());
        (RoutingInterceptor::new(strategy.clone(), registry), strategy)
    }

    fn args(user_id: &str) -> CallArgs {
        CallArgs::new().with("userId", user_id)
    }

    #[tokio::test]
    async fn test_routed_call_sees_decision() {
        let (interceptor, strategy) = create_interceptor();
        let expected = strategy.route("u-1").unwrap();

        let seen = interceptor
            .around("UserMapper.insert", &args("u-1"), || async {
                Ok::<_, DaoError>(current())
            })
            .await
            .unwrap();

        assert_eq!(seen.db_key(), Some(expected.db_key.as_str()));
        assert_eq!(seen.tb_key(), Some(expected.tb_key.as_str()));
        assert!(!in_routed_scope());
        assert!(current().is_empty());
    }

    #[tokio::test]
    async fn test_unsplit_call_has_no_table_key() {
        let (interceptor, _) = create_interceptor();

        let seen = interceptor
            .around("AccountMapper.insert", &args("u-1"), || async {
                Ok::<_, DaoError>(current())
            })
            .await
            .unwrap();

        assert!(seen.db_key().is_some());
        assert_eq!(seen.tb_key(), None);
    }

    #[tokio::test]
    async fn test_missing_key_blocks_call() {
        let (interceptor, _) = create_interceptor();
        let invoked = AtomicBool::new(false);

        let result = interceptor
            .around("UserMapper.insert", &CallArgs::new().with("orderId", "o-1"), || async {
                invoked.store(true, Ordering::SeqCst);
                Ok::<_, DaoError>(())
            })
            .await;

        match result {
            Err(DaoError::Router(e)) => assert_eq!(e.kind(), ErrorKind::KeyMissing),
            other => panic!("expected routing error, got {:?}", other),
        }
        assert!(!invoked.load(Ordering::SeqCst), "Underlying call must not run");
    }

    #[tokio::test]
    async fn test_empty_key_value_is_missing() {
        let (interceptor, _) = create_interceptor();
        let result = interceptor
            .around("UserMapper.insert", &args(""), || async { Ok::<_, DaoError>(()) })
            .await;
        assert!(matches!(result, Err(DaoError::Router(RouterError::KeyMissing { .. }))));
    }

    #[tokio::test]
    async fn test_failed_call_clears_context() {
        let (interceptor, _) = create_interceptor();

        let result: Result<(), DaoError> = interceptor
            .around("UserMapper.insert", &args("u-1"), || async {
                assert!(current_db_key().is_some());
                Err(DaoError::Db("duplicate key".to_string()))
            })
            .await;
        assert!(matches!(result, Err(DaoError::Db(_))));

        // The next operation on this worker starts clean
        let after = interceptor
            .around("OrderMapper.list", &CallArgs::new(), || async { Ok::<_, DaoError>(current()) })
            .await
            .unwrap();
        assert_eq!(after, RoutingContext::default());
    }

    #[tokio::test]
    async fn test_unrouted_call_passes_through() {
        let (interceptor, _) = create_interceptor();
        let seen = interceptor
            .around("OrderMapper.list", &CallArgs::new(), || async {
                Ok::<_, DaoError>(in_routed_scope())
            })
            .await
            .unwrap();
        assert!(!seen);
    }

    #[tokio::test]
    async fn test_nested_routed_calls() {
        let (interceptor, strategy) = create_interceptor();
        let outer = strategy.route("outer-user").unwrap();

        interceptor
            .around("UserMapper.insert", &args("outer-user"), || async {
                interceptor
                    .around("UserMapper.insert", &args("inner-user"), || async { Ok::<_, DaoError>(()) })
                    .await?;
                assert_eq!(current_db_key(), Some(outer.db_key.clone()));
                assert_eq!(current_tb_key(), Some(outer.tb_key.clone()));
                Ok::<_, DaoError>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_calls_are_isolated() {
        let (interceptor, strategy) = create_interceptor();
        let interceptor = Arc::new(interceptor);

        let handles: Vec<_> = (0..200)
            .map(|i| {
                let interceptor = Arc::clone(&interceptor);
                let user = format!("user-{}", i);
                let expected = strategy.route(&user).unwrap();
                tokio::spawn(async move {
                    interceptor
                        .around("UserMapper.update", &args(&user), || async {
                            for _ in 0..5 {
                                tokio::task::yield_now().await;
                                assert_eq!(current_db_key(), Some(expected.db_key.clone()));
                                assert_eq!(current_tb_key(), Some(expected.tb_key.clone()));
                            }
                            Ok::<_, DaoError>(())
                        })
                        .await
                })
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            result.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn test_cancelled_call_leaves_no_context() {
        let (interceptor, _) = create_interceptor();

        let timed_out = tokio::time::timeout(
            Duration::from_millis(20),
            interceptor.around("UserMapper.insert", &args("u-1"), || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, DaoError>(())
            }),
        )
        .await;
        assert!(timed_out.is_err());
        assert!(current().is_empty());
    }

    #[test]
    fn test_blocking_call() {
        let (interceptor, strategy) = create_interceptor();
        let expected = strategy.route("u-9").unwrap();

        let db_key = interceptor
            .around_blocking("UserMapper.insert", &args("u-9"), || Ok::<_, DaoError>(current_db_key()))
            .unwrap();
        assert_eq!(db_key, Some(expected.db_key));
        assert!(!in_routed_scope());
    }

    #[test]
    fn test_blocking_panic_clears_context() {
        let (interceptor, _) = create_interceptor();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            interceptor.around_blocking("UserMapper.insert", &args("u-1"), || -> Result<(), DaoError> {
                panic!("driver crashed");
            })
        }));
        assert!(outcome.is_err());
        assert!(!in_routed_scope());
        assert!(current().is_empty());
    }

    #[tokio::test]
    async fn test_async_panic_clears_context() {
        use futures::FutureExt;

        async fn crash() -> Result<(), DaoError> {
            assert!(current_db_key().is_some());
            panic!("driver crashed")
        }

        let (interceptor, _) = create_interceptor();

        context::scope(async {
            let call_args = args("u-1");
            let call = interceptor.around("UserMapper.insert", &call_args, crash);
            let outcome = std::panic::AssertUnwindSafe(call).catch_unwind().await;
            assert!(outcome.is_err());

            // The enclosing scope never sees the panicked call's keys
            assert!(in_routed_scope());
            assert!(current().is_empty());
        })
        .await;

        // A panicking spawned call does not poison the next call on the runtime
        let interceptor = Arc::new(interceptor);
        let task = {
            let interceptor = Arc::clone(&interceptor);
            tokio::spawn(async move {
                interceptor
                    .around("UserMapper.insert", &args("u-2"), crash)
                    .await
            })
        };
        assert!(task.await.unwrap_err().is_panic());

        let seen = interceptor
            .around("AccountMapper.insert", &args("u-3"), || async { Ok::<_, DaoError>(current()) })
            .await
            .unwrap();
        assert!(seen.db_key().is_some());
        assert_eq!(seen.tb_key(), None);
    }

    #[test]
    fn test_async_call_from_sync_test() {
        let (interceptor, _) = create_interceptor();
        let seen = tokio_test::block_on(interceptor.around("UserMapper.insert", &args("u-3"), || async {
            Ok::<_, DaoError>(current())
        }))
        .unwrap();
        assert!(!seen.is_empty());
    }
}
