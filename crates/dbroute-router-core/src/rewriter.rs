//! SQL table rewrite
//!
//! For statements owned by split-table operations, the first table
//! referenced after `FROM`, `INTO` or `UPDATE` gets the shard suffix of the
//! current call appended everywhere it appears:
//!
//! ```text
//! SELECT * FROM USER WHERE id = 1000   (tb_key = "03")
//! SELECT * FROM USER_03 WHERE id = 1000
//! ```
//!
//! Occurrences are matched case-insensitively, like the keywords, so a
//! `USER.id` qualifier is suffixed along with `from user`.
//!
//! Only the first matched table is rewritten. Statements that reference two
//! split tables (joins) are not supported and must be avoided by callers.

use std::borrow::Cow;
use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::{NoExpand, Regex, RegexBuilder};
use tracing::{debug, trace};

use dbroute_core::shard;

use crate::context;
use crate::error::RouterError;
use crate::marker::SplitMarker;

static TABLE_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:from|into|update)\s+(\w+)").unwrap());

/// First table referenced after `FROM`, `INTO` or `UPDATE`
pub fn table_reference(sql: &str) -> Option<&str> {
    TABLE_REFERENCE
        .captures(sql)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Statement text on its way to execution.
///
/// The rewrite step mutates the text in place and records that it did, so a
/// statement is never suffixed twice however often the hook runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundStatement {
    statement_id: String,
    sql: String,
    rewritten: bool,
}

impl BoundStatement {
    /// `statement_id` is the id of the owning operation (`Type.method`)
    pub fn new(statement_id: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            statement_id: statement_id.into(),
            sql: sql.into(),
            rewritten: false,
        }
    }

    pub fn statement_id(&self) -> &str {
        &self.statement_id
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn is_rewritten(&self) -> bool {
        self.rewritten
    }

    pub fn into_sql(self) -> String {
        self.sql
    }
}

/// Statement-preparation hook
pub trait StatementHook {
    /// Rewrite `statement` for the current call before it is executed
    fn before_prepare(&self, statement: &mut BoundStatement) -> Result<(), RouterError>;
}

/// Compiled size limit for occurrence patterns (regex crate default)
const DEFAULT_PATTERN_SIZE_LIMIT: usize = 10 * (1 << 20);

/// Rewrites split-table statements using the current routing context
pub struct QueryRewriter {
    /// Word-bounded occurrence patterns per table name
    occurrences: RwLock<HashMap<String, Regex>>,
    size_limit: usize,
}

impl QueryRewriter {
    pub fn new() -> Self {
        Self::with_size_limit(DEFAULT_PATTERN_SIZE_LIMIT)
    }

    /// Create a rewriter whose occurrence patterns may compile to at most
    /// `size_limit` bytes
    pub fn with_size_limit(size_limit: usize) -> Self {
        Self {
            occurrences: RwLock::new(HashMap::new()),
            size_limit,
        }
    }

    /// Rewrite `sql` for the current call.
    ///
    /// Statements of unsplit operations are returned unchanged. For split
    /// operations a missing table reference or a missing table key is an
    /// error; the unsuffixed table is never used as a fallback.
    pub fn rewrite<'a>(&self, sql: &'a str, is_split: bool) -> Result<Cow<'a, str>, RouterError> {
        if !is_split {
            return Ok(Cow::Borrowed(sql));
        }

        let table = table_reference(sql).ok_or_else(|| RouterError::NoTableReference { sql: sql.to_string() })?;
        let tb_key = context::current_tb_key().ok_or_else(|| RouterError::MissingTableIndex {
            table: table.to_string(),
        })?;

        let physical = shard::physical_table(table, &tb_key);
        let rewritten = self.occurrence_pattern(table)?.replace_all(sql, NoExpand(&physical));

        debug!(table = %table, physical = %physical, "Rewrote split table");
        Ok(Cow::Owned(rewritten.into_owned()))
    }

    /// Rewrite a bound statement in place, at most once.
    ///
    /// Returns whether this call changed the text.
    pub fn prepare(&self, statement: &mut BoundStatement, split: SplitMarker) -> Result<bool, RouterError> {
        if statement.rewritten {
            trace!(statement = %statement.statement_id, "Statement already rewritten");
            return Ok(false);
        }

        let rewritten = match self.rewrite(&statement.sql, split.split_table)? {
            Cow::Borrowed(_) => None,
            Cow::Owned(sql) => Some(sql),
        };
        statement.rewritten = true;

        match rewritten {
            Some(sql) => {
                statement.sql = sql;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn occurrence_pattern(&self, table: &str) -> Result<Regex, RouterError> {
        if let Some(pattern) = self.occurrences.read().get(table) {
            return Ok(pattern.clone());
        }

        let pattern = RegexBuilder::new(&format!(r"\b{}\b", regex::escape(table)))
            .case_insensitive(true)
            .size_limit(self.size_limit)
            .build()
            .map_err(|e| RouterError::TablePattern {
                table: table.to_string(),
                reason: e.to_string(),
            })?;
        self.occurrences
            .write()
            .insert(table.to_string(), pattern.clone());
        Ok(pattern)
    }
}

impl Default for QueryRewriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{sync_scope, ContextGuard};
    use crate::error::ErrorKind;
    use crate::types::RoutingDecision;

    fn with_table_key<R>(tb_key: &str, f: impl FnOnce() -> R) -> R {
        let decision = RoutingDecision {
            db_index: 1,
            tb_index: tb_key.parse().unwrap(),
            db_key: "01".to_string(),
            tb_key: tb_key.to_string(),
        };
        sync_scope(|| {
            let _guard = ContextGuard::enter(&decision, true);
            f()
        })
    }

    #[test]
    fn test_table_reference() {
        assert_eq!(table_reference("SELECT * FROM USER WHERE id = 1"), Some("USER"));
        assert_eq!(table_reference("insert into user_order (id) values (1)"), Some("user_order"));
        assert_eq!(table_reference("Update  account SET balance = 0"), Some("account"));
        assert_eq!(table_reference("SELECT last_update FROM audit"), Some("audit"));
        assert_eq!(table_reference("SELECT 1"), None);
    }

    #[test]
    fn test_rewrite_select() {
        let rewriter = QueryRewriter::new();
        let sql = with_table_key("03", || {
            rewriter
                .rewrite("SELECT * FROM USER WHERE id = 1000", true)
                .unwrap()
                .into_owned()
        });
        assert_eq!(sql, "SELECT * FROM USER_03 WHERE id = 1000");
    }

    #[test]
    fn test_rewrite_insert_and_update() {
        let rewriter = QueryRewriter::new();
        with_table_key("07", || {
            assert_eq!(
                rewriter
                    .rewrite("insert into user (id, name) values (?, ?)", true)
                    .unwrap(),
                "insert into user_07 (id, name) values (?, ?)"
            );
            assert_eq!(
                rewriter
                    .rewrite("UPDATE user SET name = ? WHERE id = ?", true)
                    .unwrap(),
                "UPDATE user_07 SET name = ? WHERE id = ?"
            );
        });
    }

    #[test]
    fn test_rewrite_every_occurrence() {
        let rewriter = QueryRewriter::new();
        let sql = with_table_key("02", || {
            rewriter
                .rewrite("SELECT user.id, user_id FROM user WHERE user.age > 18", true)
                .unwrap()
                .into_owned()
        });
        assert_eq!(sql, "SELECT user_02.id, user_id FROM user_02 WHERE user_02.age > 18");
    }

    #[test]
    fn test_rewrite_mixed_case_occurrences() {
        let rewriter = QueryRewriter::new();
        let sql = with_table_key("03", || {
            rewriter
                .rewrite("select * from user where USER.id = 1 and User.age > 2", true)
                .unwrap()
                .into_owned()
        });
        assert_eq!(sql, "select * from user_03 where USER_03.id = 1 and User_03.age > 2");
    }

    #[test]
    fn test_pattern_too_large_is_an_error() {
        let rewriter = QueryRewriter::with_size_limit(1);
        let err = with_table_key("03", || rewriter.rewrite("SELECT * FROM user", true).unwrap_err());
        assert!(matches!(err, RouterError::TablePattern { ref table, .. } if table == "user"));
        assert_eq!(err.kind(), ErrorKind::Pattern);
    }

    #[test]
    fn test_rewrite_first_table_only() {
        let rewriter = QueryRewriter::new();
        let sql = with_table_key("01", || {
            rewriter
                .rewrite("SELECT * FROM orders o JOIN users u ON o.uid = u.id", true)
                .unwrap()
                .into_owned()
        });
        assert_eq!(sql, "SELECT * FROM orders_01 o JOIN users u ON o.uid = u.id");
    }

    #[test]
    fn test_unsplit_passes_through() {
        let rewriter = QueryRewriter::new();
        let sql = "SELECT * FROM USER WHERE id = 1000";

        // No routing context needed for unsplit statements
        let out = rewriter.rewrite(sql, false).unwrap();
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out, sql);
    }

    #[test]
    fn test_no_table_reference() {
        let rewriter = QueryRewriter::new();
        let err = with_table_key("03", || rewriter.rewrite("SELECT 1", true).unwrap_err());
        assert_eq!(err.kind(), ErrorKind::Pattern);
        assert!(matches!(err, RouterError::NoTableReference { .. }));
    }

    #[test]
    fn test_missing_table_key() {
        let rewriter = QueryRewriter::new();
        let err = rewriter.rewrite("SELECT * FROM USER", true).unwrap_err();
        assert!(matches!(err, RouterError::MissingTableIndex { ref table } if table == "USER"));
        assert_eq!(err.kind(), ErrorKind::Pattern);
    }

    #[test]
    fn test_prepare_rewrites_once() {
        let rewriter = QueryRewriter::new();
        let mut statement = BoundStatement::new("UserMapper.queryById", "SELECT * FROM USER WHERE id = ?");

        with_table_key("03", || {
            assert!(rewriter.prepare(&mut statement, SplitMarker::SPLIT).unwrap());
            assert!(!rewriter.prepare(&mut statement, SplitMarker::SPLIT).unwrap());
        });
        assert!(statement.is_rewritten());
        assert_eq!(statement.sql(), "SELECT * FROM USER_03 WHERE id = ?");
    }

    #[test]
    fn test_prepare_unsplit() {
        let rewriter = QueryRewriter::new();
        let mut statement = BoundStatement::new("OrderMapper.list", "SELECT * FROM orders");
        assert!(!rewriter.prepare(&mut statement, SplitMarker::UNSPLIT).unwrap());
        assert_eq!(statement.into_sql(), "SELECT * FROM orders");
    }
}
