//! Data source selection
//!
//! Called by the host framework right before it needs a physical
//! connection. The selector only reads the routing context of the current
//! call; building and pooling connections is left to the host.

use std::borrow::Cow;
use std::collections::HashMap;

use tracing::trace;

use dbroute_core::{shard, ConfigError, DataSourceDescriptor, RouterSettings};

use crate::context;
use crate::error::RouterError;

/// Resolves the pool identifier for the current call
#[derive(Debug, Clone)]
pub struct DataSourceSelector {
    default_pool: String,
}

impl DataSourceSelector {
    /// `default_pool` serves operations outside routing control
    pub fn new(default_pool: impl Into<String>) -> Self {
        Self {
            default_pool: default_pool.into(),
        }
    }

    pub fn default_pool(&self) -> &str {
        &self.default_pool
    }

    /// `db<key>` inside a routed call, the default pool otherwise
    pub fn resolve_pool(&self) -> Cow<'_, str> {
        match context::current_db_key() {
            Some(db_key) => Cow::Owned(shard::pool_name(&db_key)),
            None => Cow::Borrowed(&self.default_pool),
        }
    }
}

/// Connection-acquisition hook: pool targets keyed by pool identifier
pub trait ConnectionHook {
    type Target;

    /// Target for the current call
    fn determine_target(&self) -> Result<&Self::Target, RouterError>;
}

/// Routes connection acquisition to one of several caller-owned targets
/// (typically connection pools) based on the current routing context.
pub struct DynamicDataSource<P> {
    selector: DataSourceSelector,
    targets: HashMap<String, P>,
    default_target: P,
}

impl<P> DynamicDataSource<P> {
    /// Create from explicit targets
    pub fn new(selector: DataSourceSelector, targets: HashMap<String, P>, default_target: P) -> Self {
        Self {
            selector,
            targets,
            default_target,
        }
    }

    /// Build targets from settings through `factory`.
    ///
    /// Fails unless every routed pool of the layout has a descriptor.
    pub fn from_settings<F>(settings: &RouterSettings, mut factory: F) -> Result<Self, RouterError>
    where
        F: FnMut(&str, &DataSourceDescriptor) -> P,
    {
        settings.validate()?;

        let default_descriptor = settings
            .pools
            .get(&settings.default_pool)
            .ok_or_else(|| ConfigError::UnknownDefaultPool(settings.default_pool.clone()))?;
        let default_target = factory(&settings.default_pool, default_descriptor);

        let mut targets = HashMap::new();
        for pool in settings.router.routed_pool_names() {
            let descriptor = settings
                .pools
                .get(&pool)
                .ok_or_else(|| RouterError::MissingPool { pool: pool.clone() })?;
            let target = factory(&pool, descriptor);
            targets.insert(pool, target);
        }

        Ok(Self::new(
            DataSourceSelector::new(settings.default_pool.clone()),
            targets,
            default_target,
        ))
    }

    pub fn selector(&self) -> &DataSourceSelector {
        &self.selector
    }

    /// Target registered under `pool`
    pub fn target(&self, pool: &str) -> Option<&P> {
        self.targets.get(pool)
    }
}

impl<P> ConnectionHook for DynamicDataSource<P> {
    type Target = P;

    fn determine_target(&self) -> Result<&P, RouterError> {
        if context::current_db_key().is_none() {
            return Ok(&self.default_target);
        }

        let pool = self.selector.resolve_pool();
        trace!(pool = %pool, "Selecting data source");
        self.targets
            .get(pool.as_ref())
            .ok_or_else(|| RouterError::MissingPool { pool: pool.into_owned() })
    }
}
