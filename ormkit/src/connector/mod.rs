//! Connector layer: one `Queryable` implementation per supported engine.
//!
//! Per spec.md §5, the core introduces no asynchrony of its own — every
//! operation here blocks the calling thread until the driver responds.
//! Engines whose Rust drivers are async-only (`postgresql`, `mysql`,
//! `mssql`) bridge that with a small dedicated Tokio runtime the
//! connection owns and blocks on; the embedded `sqlite` dialect's driver
//! (`rusqlite`) is natively blocking and needs no bridge.

#[cfg(feature = "mssql")]
pub mod mssql;
#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgresql")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use crate::ast::Query;
use crate::dialect::Dialect;
use crate::error::Error;
use crate::value::{Row, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
    Snapshot,
}

/// The rows returned by a raw query, before the ORM layer maps them into
/// records.
#[derive(Debug, Clone, Default)]
pub struct RawResultSet {
    pub rows: Vec<Row>,
}

impl RawResultSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_single(self) -> Result<Row, Error> {
        self.rows
            .into_iter()
            .next()
            .ok_or_else(|| crate::error::ErrorKind::NoRows.into())
    }
}

impl IntoIterator for RawResultSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// The contract every engine-specific connection and transaction
/// implements (spec.md §4.5's "raw-SQL escape hatches" plus the
/// statement-level primitives `DataContext` is built from).
pub trait Queryable {
    fn dialect(&self) -> &'static dyn Dialect;

    /// Executes a statement expected to return no rows, returning the
    /// affected row count.
    fn execute(&mut self, query: &Query) -> Result<u64, Error>;

    /// Executes a statement expected to return rows.
    fn query(&mut self, query: &Query) -> Result<RawResultSet, Error>;

    /// Raw-SQL escape hatch backing `ExecuteNonQuery` (spec.md §4.5).
    fn execute_raw(&mut self, sql: &str, params: Vec<Value>) -> Result<u64, Error>;

    /// Raw-SQL escape hatch backing `ExecuteScalar` (spec.md §4.5).
    fn query_raw(&mut self, sql: &str, params: Vec<Value>) -> Result<RawResultSet, Error>;

    /// True once a prepared statement for `sql` has been cached and may
    /// be reused, for callers (the prepared-statement cache in
    /// `crate::context`) that want to avoid double preparation.
    fn is_prepared(&self, _sql: &str) -> bool {
        false
    }

    /// The engine-native auto-generated id from the last `INSERT`, for
    /// dialects without `Capability::ReturnedInsertsAsParms`. `None` by
    /// default; `sqlite` is the only connector that overrides this today.
    fn last_insert_id(&mut self) -> Result<Option<Value>, Error> {
        Ok(None)
    }
}

/// Connections whose engine supports transactions expose this; sqlite,
/// postgresql, mysql, and mssql all do (spec.md §4.5/§5).
pub trait TransactionCapable: Queryable {
    fn start_transaction(&mut self, isolation: Option<IsolationLevel>) -> Result<(), Error>;
    fn commit(&mut self) -> Result<(), Error>;
    fn rollback(&mut self) -> Result<(), Error>;
    fn in_transaction(&self) -> bool;
}
