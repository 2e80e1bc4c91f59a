//! Shard naming
//!
//! Database and table indices are rendered as fixed-width, zero-padded
//! decimal strings so that physical names sort and display uniformly:
//! `USER_00 .. USER_07`, `db00 .. db03`.

/// Prefix of every routed connection pool identifier (`db00`, `db01`, ...)
pub const POOL_PREFIX: &str = "db";

/// Separator between a logical table name and its shard suffix
pub const TABLE_SUFFIX_SEPARATOR: char = '_';

/// Minimum width of a formatted shard index
pub const MIN_INDEX_WIDTH: usize = 2;

/// Width of a formatted index for a dimension with `count` shards.
///
/// Wide enough to print `count - 1`, never narrower than [`MIN_INDEX_WIDTH`].
pub fn index_width(count: u32) -> usize {
    let max_index = count.saturating_sub(1);
    let digits = max_index.checked_ilog10().map_or(1, |d| d as usize + 1);
    digits.max(MIN_INDEX_WIDTH)
}

/// Format a shard index for a dimension with `count` shards
pub fn format_index(index: u32, count: u32) -> String {
    format!("{:0width$}", index, width = index_width(count))
}

/// Pool identifier for a formatted database key
pub fn pool_name(db_key: &str) -> String {
    format!("{}{}", POOL_PREFIX, db_key)
}

/// Physical table name for a logical table and a formatted table key
pub fn physical_table(table: &str, tb_key: &str) -> String {
    format!("{}{}{}", table, TABLE_SUFFIX_SEPARATOR, tb_key)
}

/// All routed pool identifiers for `db_count` databases, in index order
pub fn routed_pool_names(db_count: u32) -> impl Iterator<Item = String> {
    (0..db_count).map(move |idx| pool_name(&format_index(idx, db_count)))
}
