//! Operation-scoped routing context
//!
//! Each routed call runs inside its own task-local scope holding the
//! formatted database and table keys. Readers (the data source selector and
//! the query rewriter) see only the scope of the call they run under.
//! Outside any routed call the context reads as empty.
//!
//! The scope is dropped when the call ends, whichever way it ends, so a
//! worker thread picked up by an unrelated operation never inherits stale
//! keys. A nested routed call shadows the outer decision and the outer one
//! is visible again once the inner call returns.

use std::cell::RefCell;
use std::future::Future;

use tracing::{trace, warn};

use crate::types::RoutingDecision;

tokio::task_local! {
    static ROUTING_CONTEXT: RefCell<RoutingContext>;
}

/// Routing keys for the operation currently executing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingContext {
    db_key: Option<String>,
    tb_key: Option<String>,
}

impl RoutingContext {
    /// Formatted database index, if routed
    pub fn db_key(&self) -> Option<&str> {
        self.db_key.as_deref()
    }

    /// Formatted table index, if the operation targets a split table
    pub fn tb_key(&self) -> Option<&str> {
        self.tb_key.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.db_key.is_none() && self.tb_key.is_none()
    }
}

/// Snapshot of the current routing context
pub fn current() -> RoutingContext {
    ROUTING_CONTEXT
        .try_with(|ctx| ctx.borrow().clone())
        .unwrap_or_default()
}

/// Database key of the current routed call
pub fn current_db_key() -> Option<String> {
    ROUTING_CONTEXT
        .try_with(|ctx| ctx.borrow().db_key.clone())
        .ok()
        .flatten()
}

/// Table key of the current routed call
pub fn current_tb_key() -> Option<String> {
    ROUTING_CONTEXT
        .try_with(|ctx| ctx.borrow().tb_key.clone())
        .ok()
        .flatten()
}

/// Whether the caller is running inside a routed call
pub fn in_routed_scope() -> bool {
    ROUTING_CONTEXT.try_with(|_| ()).is_ok()
}

/// Run `fut` inside a fresh, empty routing scope
pub(crate) async fn scope<F: Future>(fut: F) -> F::Output {
    ROUTING_CONTEXT
        .scope(RefCell::new(RoutingContext::default()), fut)
        .await
}

/// Run `f` inside a fresh, empty routing scope on the current thread
pub(crate) fn sync_scope<R>(f: impl FnOnce() -> R) -> R {
    ROUTING_CONTEXT.sync_scope(RefCell::new(RoutingContext::default()), f)
}

fn write(f: impl FnOnce(&mut RoutingContext)) {
    if ROUTING_CONTEXT.try_with(|ctx| f(&mut ctx.borrow_mut())).is_err() {
        warn!("Routing context write outside a routed scope ignored");
    }
}

/// Populated context for the lifetime of one routed call.
///
/// Dropping the guard clears both keys in the enclosing scope, including
/// on error, unwind and cancellation. The scope cell itself is discarded
/// when the routed call ends.
pub(crate) struct ContextGuard {
    _private: (),
}

impl ContextGuard {
    /// Store `decision` in the current scope. The table key is stored only
    /// for split-table operations.
    pub(crate) fn enter(decision: &RoutingDecision, split_table: bool) -> Self {
        let db_key = decision.db_key.clone();
        let tb_key = split_table.then(|| decision.tb_key.clone());
        trace!(db_key = %db_key, tb_key = ?tb_key, "Routing context set");

        write(|ctx| {
            ctx.db_key = Some(db_key);
            ctx.tb_key = tb_key;
        });
        Self { _private: () }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        write(|ctx| {
            ctx.db_key = None;
            ctx.tb_key = None;
        });
        trace!("Routing context cleared");
    }
}
