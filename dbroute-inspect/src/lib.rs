//! DB Router Inspect - Routing diagnostics
//!
//! Shows where a routing key lands under a given layout:
//! - the database index and pool identifier
//! - the table index and, optionally, the rewritten statement

use dbroute_core::RouterSettings;
use dbroute_router_core::{
    BoundStatement, CallArgs, OperationMarkers, RouterError, ShardRouter, StatementHook,
};
use serde::Serialize;
use tracing::info;

/// Synthetic operation every inspection runs under
const INSPECT_TYPE: &str = "Inspect";
const INSPECT_OPERATION: &str = "Inspect.route";

/// Where one routing key lands
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inspection {
    pub key: String,
    pub db_index: u32,
    pub tb_index: u32,
    pub pool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
}

/// Runs keys through the same hooks a DAO call would take
pub struct Inspector {
    router: ShardRouter,
}

impl Inspector {
    /// Create an inspector for a validated layout
    pub fn new(settings: &RouterSettings) -> Result<Self, RouterError> {
        let router = ShardRouter::from_settings(settings)?;
        router.register_type(INSPECT_TYPE, OperationMarkers::routed().split_table(true));

        info!(
            db_count = router.config().db_count(),
            tb_count = router.config().tb_count(),
            router_key = %router.config().router_key(),
            hash = %router.config().hash_function(),
            "Inspector ready"
        );

        Ok(Self { router })
    }

    pub fn router(&self) -> &ShardRouter {
        &self.router
    }

    /// Route `key` and, when given, rewrite `sql` for it
    pub async fn inspect(&self, key: &str, sql: Option<&str>) -> Result<Inspection, RouterError> {
        let args = CallArgs::new().with(self.router.config().router_key(), key);

        self.router
            .around(INSPECT_OPERATION, &args, || async {
                let decision = self.router.route(key)?;
                let pool = self.router.resolve_pool().into_owned();

                let sql = match sql {
                    Some(sql) => {
                        let mut statement = BoundStatement::new(INSPECT_OPERATION, sql);
                        self.router.before_prepare(&mut statement)?;
                        Some(statement.into_sql())
                    }
                    None => None,
                };

                Ok::<_, RouterError>(Inspection {
                    key: key.to_string(),
                    db_index: decision.db_index,
                    tb_index: decision.tb_index,
                    pool,
                    sql,
                })
            })
            .await
    }
}
