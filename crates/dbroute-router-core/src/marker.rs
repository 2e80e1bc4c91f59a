//! Operation markers
//!
//! Operations opt into routing by registering markers against their owning
//! type (`UserMapper`) or against a single method (`UserMapper.insert`).
//! Method markers override type markers field by field. The merged view is
//! resolved once per operation id and cached.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// "Participates in routing, using the argument field named `key`".
///
/// A missing or empty key means the configured default routing key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMarker {
    pub key: Option<String>,
}

/// "The table behind this operation is physically split"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitMarker {
    pub split_table: bool,
}

impl SplitMarker {
    pub const SPLIT: SplitMarker = SplitMarker { split_table: true };
    pub const UNSPLIT: SplitMarker = SplitMarker { split_table: false };
}

/// Markers attached to a type or a method
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationMarkers {
    pub route: Option<RouteMarker>,
    pub split: Option<SplitMarker>,
}

impl OperationMarkers {
    /// Routed using the default routing key
    pub fn routed() -> Self {
        Self {
            route: Some(RouteMarker::default()),
            split: None,
        }
    }

    /// Routed using a specific argument field
    pub fn routed_by(key: impl Into<String>) -> Self {
        Self {
            route: Some(RouteMarker { key: Some(key.into()) }),
            split: None,
        }
    }

    /// Set the split-table marker
    pub fn split_table(mut self, split_table: bool) -> Self {
        self.split = Some(SplitMarker { split_table });
        self
    }

    /// `self` with unset fields taken from `fallback`
    fn or(&self, fallback: &OperationMarkers) -> OperationMarkers {
        OperationMarkers {
            route: self.route.clone().or_else(|| fallback.route.clone()),
            split: self.split.or(fallback.split),
        }
    }
}

/// Markers resolved for one operation id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOperation {
    /// Operation id, `Type.method`
    pub id: String,

    /// Argument field carrying the routing key; `None` if the operation is
    /// not routed
    pub route_key: Option<String>,

    /// Split-table marker (absent means not split)
    pub split: SplitMarker,
}

impl ResolvedOperation {
    pub fn is_routed(&self) -> bool {
        self.route_key.is_some()
    }
}

/// Owning type of an operation id: everything before the last `.`
pub fn owning_type(operation_id: &str) -> &str {
    operation_id
        .rsplit_once('.')
        .map_or(operation_id, |(owner, _)| owner)
}

/// Registry of routing markers with a per-operation resolution cache
pub struct OperationRegistry {
    default_key: String,
    types: RwLock<HashMap<String, OperationMarkers>>,
    methods: RwLock<HashMap<String, OperationMarkers>>,
    resolved: RwLock<HashMap<String, Arc<ResolvedOperation>>>,
}

impl OperationRegistry {
    /// Create an empty registry. `default_key` is used by route markers
    /// that do not name a field.
    pub fn new(default_key: impl Into<String>) -> Self {
        Self {
            default_key: default_key.into(),
            types: RwLock::new(HashMap::new()),
            methods: RwLock::new(HashMap::new()),
            resolved: RwLock::new(HashMap::new()),
        }
    }

    /// Attach markers to every operation of a type
    pub fn register_type(&self, type_name: impl Into<String>, markers: OperationMarkers) {
        let type_name = type_name.into();
        debug!(type_name = %type_name, ?markers, "Registering type markers");
        let mut resolved = self.resolved.write();
        self.types.write().insert(type_name, markers);
        resolved.clear();
    }

    /// Attach markers to a single operation
    pub fn register_method(&self, operation_id: impl Into<String>, markers: OperationMarkers) {
        let operation_id = operation_id.into();
        debug!(operation = %operation_id, ?markers, "Registering method markers");
        let mut resolved = self.resolved.write();
        self.methods.write().insert(operation_id, markers);
        resolved.clear();
    }

    /// Resolve the effective markers of an operation.
    ///
    /// The cache lock is held from lookup to insert and registration takes
    /// it before touching the marker maps, so a cached entry never predates
    /// the latest registration. Lock order is `resolved` then `types` /
    /// `methods`.
    pub fn resolve(&self, operation_id: &str) -> Arc<ResolvedOperation> {
        if let Some(resolved) = self.resolved.read().get(operation_id) {
            trace!(operation = %operation_id, "Resolved markers cache hit");
            return Arc::clone(resolved);
        }

        let mut cache = self.resolved.write();
        if let Some(resolved) = cache.get(operation_id) {
            return Arc::clone(resolved);
        }

        let type_markers = self
            .types
            .read()
            .get(owning_type(operation_id))
            .cloned()
            .unwrap_or_default();
        let markers = match self.methods.read().get(operation_id) {
            Some(method_markers) => method_markers.or(&type_markers),
            None => type_markers,
        };

        let route_key = markers.route.map(|route| {
            route
                .key
                .filter(|key| !key.trim().is_empty())
                .unwrap_or_else(|| self.default_key.clone())
        });

        let resolved = Arc::new(ResolvedOperation {
            id: operation_id.to_string(),
            route_key,
            split: markers.split.unwrap_or_default(),
        });

        cache.insert(operation_id.to_string(), Arc::clone(&resolved));
        resolved
    }

    /// Split marker of the operation that owns a statement
    pub fn split_marker(&self, statement_id: &str) -> SplitMarker {
        self.resolve(statement_id).split
    }
}
