//! Data Context (spec.md §4.5): the transactional unit of work wrapping a
//! single `Queryable`/`TransactionCapable` connection. Owns the
//! prepared-statement cache keyed by canonical SQL text and the
//! per-context identity cache keyed by `(record type, primary key)`, and
//! is the only place `ast::Query` trees produced by the planner are
//! actually sent to a driver.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::ast::{Comparable, Delete, Expression, Insert, Query, Select, Update};
use crate::connector::{IsolationLevel, Queryable, RawResultSet, TransactionCapable};
use crate::dialect::Capability;
use crate::encryption::{EncryptionAdapter, EncryptionMode};
use crate::error::{Error, ErrorKind, Result};
use crate::mapping::{MappingRegistry, Record};
use crate::value::Value;
use crate::visitor::Visitor;

/// Summarizes bound parameters for a trace event without ever logging a
/// value — `secret`/`application_encrypted` columns must never reach logs
/// even in ciphertext form (spec.md §7 "Trace output").
fn param_type_summary(params: &[Value]) -> String {
    params.iter().map(|p| p.type_name()).collect::<Vec<_>>().join(", ")
}

/// A cached record, type-erased so one cache can hold instances of every
/// mapped type a context touches. Downcast on read; the key's `TypeId`
/// half guarantees the cast always succeeds.
type CachedRecord = Box<dyn Any>;

pub struct DataContext<C: TransactionCapable> {
    connection: C,
    prepared: HashSet<String>,
    cache: HashMap<(TypeId, String), CachedRecord>,
    disposed: bool,
    encryption: Option<Arc<EncryptionAdapter>>,
}

impl<C: TransactionCapable> DataContext<C> {
    /// `Open` (spec.md §4.5): wraps an already-connected driver.
    pub fn open(connection: C) -> Self {
        Self {
            connection,
            prepared: HashSet::new(),
            cache: HashMap::new(),
            disposed: false,
            encryption: None,
        }
    }

    /// Plugs an `EncryptionAdapter` into this context's insert/update/query
    /// paths (spec.md §4.8): every `application_encrypted` column is
    /// sealed on write and opened on read automatically from then on.
    pub fn with_encryption(mut self, adapter: Arc<EncryptionAdapter>) -> Self {
        self.encryption = Some(adapter);
        self
    }

    /// Exposes the configured adapter to `resultset::ResultSet::where_`,
    /// which needs it to encrypt a caller-supplied literal compared
    /// against an `application_encrypted` column before binding it.
    pub(crate) fn encryption_adapter(&self) -> Option<&EncryptionAdapter> {
        self.encryption.as_deref()
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    fn ensure_open(&self) -> Result<()> {
        if self.disposed {
            return Err(ErrorKind::InvalidContextState {
                reason: "context is disposed".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Marks the context disposed; further operations fail with
    /// `InvalidContextState`. The underlying connection is dropped with
    /// the context, closing it.
    pub fn dispose(&mut self) {
        self.disposed = true;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// `OpenClonedContext` (spec.md §4.5): a fresh context over a clone of
    /// this one's connection, with an empty prepared-statement and
    /// identity cache of its own.
    pub fn open_cloned_context(&self) -> DataContext<C>
    where
        C: Clone,
    {
        DataContext::open(self.connection.clone())
    }

    pub fn begin_transaction(&mut self, isolation: Option<IsolationLevel>) -> Result<()> {
        let _span = tracing::info_span!("ormkit.transaction.begin", ?isolation).entered();
        self.ensure_open()?;
        self.connection.start_transaction(isolation)
    }

    pub fn commit(&mut self) -> Result<()> {
        let _span = tracing::info_span!("ormkit.transaction.commit").entered();
        self.ensure_open()?;
        self.connection.commit()
    }

    pub fn rollback(&mut self) -> Result<()> {
        let _span = tracing::info_span!("ormkit.transaction.rollback").entered();
        self.ensure_open()?;
        self.connection.rollback()
    }

    pub fn in_transaction(&self) -> bool {
        self.connection.in_transaction()
    }

    fn remember_prepared(&mut self, sql: &str) {
        if self.prepared.insert(sql.to_string()) {
            tracing::trace!(sql, "preparing statement for the first time");
        } else {
            tracing::trace!(sql, "reusing cached prepared statement");
        }
    }

    pub fn is_prepared(&self, sql: &str) -> bool {
        self.prepared.contains(sql)
    }

    fn render(&self, query: &Query) -> Result<crate::builder::SqlStatement> {
        Visitor::new(self.connection.dialect()).render(query)
    }

    fn cache_key<T: 'static>(pk: &Value) -> (TypeId, String) {
        (TypeId::of::<T>(), pk.to_string())
    }

    /// Routes a bound value through the configured `EncryptionAdapter`
    /// when `application_encrypted` is set. Deterministic mode is the only
    /// one a `ColumnMapping`'s single boolean flag can select — it's also
    /// the only mode under which the resulting ciphertext still supports
    /// equality predicates (spec.md §4.4/§4.8).
    fn encrypt_if_needed(&self, col: &crate::mapping::ColumnMapping, value: Value) -> Result<Value> {
        if !col.application_encrypted {
            return Ok(value);
        }
        match &self.encryption {
            Some(adapter) => adapter.encrypt_value(EncryptionMode::Deterministic, &value),
            None => Ok(value),
        }
    }

    fn decrypt_if_needed(&self, col: &crate::mapping::ColumnMapping, value: Value) -> Result<Value> {
        if !col.application_encrypted {
            return Ok(value);
        }
        match &self.encryption {
            Some(adapter) => adapter.decrypt_value(EncryptionMode::Deterministic, &value),
            None => Ok(value),
        }
    }

    fn primary_key_value<T: Record>(record: &T) -> Result<Value> {
        let mapping = MappingRegistry::get::<T>();
        let pk = mapping.primary_key_columns().into_iter().next().ok_or_else(|| {
            ErrorKind::MappingError {
                reason: format!("`{}` has no primary key column", mapping.type_name),
            }
        })?;
        Ok(record.column_value(&pk.physical_name))
    }

    pub fn cache_invalidate<T: Record>(&mut self, pk: &Value) {
        self.cache.remove(&Self::cache_key::<T>(pk));
    }

    pub fn cache_get<T: Record + Clone>(&self, pk: &Value) -> Option<T> {
        self.cache
            .get(&Self::cache_key::<T>(pk))
            .and_then(|boxed| boxed.downcast_ref::<T>())
            .cloned()
    }

    fn cache_put<T: Record + Clone>(&mut self, pk: Value, record: &T) {
        self.cache.insert(Self::cache_key::<T>(&pk), Box::new(record.clone()));
    }

    /// `Insert` (spec.md §4.5): writes every non-auto-generated column.
    /// When the dialect can return the newly generated key inline
    /// (`Capability::ReturnedInsertsAsParms`) the record is updated with
    /// it; otherwise falls back to `Queryable::last_insert_id` (only
    /// `sqlite` implements this today — other auto-generated-but-not-
    /// `RETURNING` engines leave the field at its prior value).
    pub fn insert<T: Record + Clone>(&mut self, record: &mut T) -> Result<()> {
        self.ensure_open()?;
        let mapping = MappingRegistry::get::<T>();
        let _span = tracing::debug_span!("ormkit.query", table = %mapping.table, op = "insert").entered();

        let mut insert = Insert::single_into(mapping.table.clone());
        for col in mapping.columns_for(true) {
            if col.auto_generated {
                continue;
            }
            let value = self.encrypt_if_needed(col, record.column_value(&col.physical_name))?;
            insert = insert.value(col.physical_name.clone(), value);
        }

        let auto_pk = mapping.primary_key_columns().into_iter().find(|c| c.auto_generated);

        if let Some(pk) = auto_pk {
            if self.connection.dialect().has(Capability::ReturnedInsertsAsParms) {
                let insert = insert.returning(vec![pk.physical_name.clone()]);
                let query: Query = insert.into();
                let stmt = self.render(&query)?;
                self.remember_prepared(&stmt.sql);
                let rows = self.connection.query_raw(&stmt.sql, stmt.params)?;
                let row = rows.into_single()?;
                let value = row.at(0).cloned().ok_or_else(|| ErrorKind::NoRows)?;
                record.set_column_value(&pk.physical_name, value)?;
            } else {
                let query: Query = insert.into();
                let stmt = self.render(&query)?;
                self.remember_prepared(&stmt.sql);
                self.connection.execute_raw(&stmt.sql, stmt.params)?;
                if let Some(id) = self.connection.last_insert_id()? {
                    record.set_column_value(&pk.physical_name, id)?;
                }
            }
        } else {
            let query: Query = insert.into();
            let stmt = self.render(&query)?;
            self.remember_prepared(&stmt.sql);
            self.connection.execute_raw(&stmt.sql, stmt.params)?;
        }

        let pk_value = Self::primary_key_value(record)?;
        self.cache_put(pk_value, record);
        Ok(())
    }

    /// `Update` (spec.md §4.5): writes every column (secret included)
    /// back, keyed by the record's primary key.
    pub fn update<T: Record + Clone>(&mut self, record: &T) -> Result<u64> {
        self.ensure_open()?;
        let mapping = MappingRegistry::get::<T>();
        let pk = mapping.primary_key_columns().into_iter().next().ok_or_else(|| {
            Error::from(ErrorKind::MappingError {
                reason: format!("`{}` has no primary key column", mapping.type_name),
            })
        })?;

        let mut update = Update::table(mapping.table.clone());
        for col in mapping.columns_for(true) {
            if col.primary_key {
                continue;
            }
            let value = self.encrypt_if_needed(col, record.column_value(&col.physical_name))?;
            update = update.set(col.physical_name.clone(), value);
        }

        let pk_value = record.column_value(&pk.physical_name);
        let update = update.and_where(crate::ast::Column::new(pk.physical_name.clone()).equals(pk_value.clone()));

        let affected = self.execute_ast(&update.into())?;
        if affected == 0 {
            return Err(ErrorKind::NotFound.into());
        }

        self.cache_put(pk_value, record);
        Ok(affected)
    }

    /// `UpdateAll` (spec.md §4.5): a bulk `SET` across every row matching
    /// `predicate`, bypassing the identity cache entirely — callers that
    /// hold live instances of the affected rows are responsible for
    /// invalidating them.
    pub fn update_all(
        &mut self,
        table: impl Into<String>,
        assignments: Vec<(String, Value)>,
        predicate: Option<Expression>,
    ) -> Result<u64> {
        self.ensure_open()?;
        let mut update = Update::table(table.into());
        for (column, value) in assignments {
            update = update.set(column, value);
        }
        if let Some(predicate) = predicate {
            update = update.and_where(predicate);
        }
        self.execute_ast(&update.into())
    }

    /// `Delete` (spec.md §4.5): removes the row matching the record's
    /// primary key and invalidates its cache entry.
    pub fn delete<T: Record>(&mut self, record: &T) -> Result<u64> {
        self.ensure_open()?;
        let mapping = MappingRegistry::get::<T>();
        let pk = mapping.primary_key_columns().into_iter().next().ok_or_else(|| {
            Error::from(ErrorKind::MappingError {
                reason: format!("`{}` has no primary key column", mapping.type_name),
            })
        })?;
        let pk_value = record.column_value(&pk.physical_name);

        let delete = Delete::from_table(mapping.table.clone())
            .and_where(crate::ast::Column::new(pk.physical_name.clone()).equals(pk_value.clone()));

        let affected = self.execute_ast(&delete.into())?;
        self.cache.remove(&Self::cache_key::<T>(&pk_value));
        Ok(affected)
    }

    /// Runs `query` and materialises every row into `T` via
    /// `Record::from_values`, matching the row's own column list
    /// (`crate::value::Row::columns`) rather than `T`'s full projection —
    /// correct both for a plain `base_select` and for the per-table slice
    /// of a composite join row the result-set layer builds.
    pub fn query<T: Record>(&mut self, select: Select) -> Result<Vec<T>> {
        self.ensure_open()?;
        let mapping = MappingRegistry::get::<T>();
        let rows = self.query_ast(&select.into())?;
        rows.into_iter()
            .map(|row| {
                let values = row
                    .columns
                    .iter()
                    .zip(row.values.into_iter())
                    .map(|(name, value)| match mapping.column(name) {
                        Some(col) => self.decrypt_if_needed(col, value),
                        None => Ok(value),
                    })
                    .collect::<Result<Vec<_>>>()?;
                T::from_values(&row.columns, &values)
            })
            .collect()
    }

    pub fn first_or_default<T: Record>(&mut self, select: Select) -> Result<Option<T>> {
        let select = select.limit(1);
        let mut rows = self.query::<T>(select)?;
        Ok(if rows.is_empty() { None } else { Some(rows.remove(0)) })
    }

    pub fn count(&mut self, select: Select) -> Result<i64> {
        self.ensure_open()?;
        let query: Query = select.into();
        let stmt = Visitor::new(self.connection.dialect()).render_count(&query)?;
        let _span = tracing::debug_span!("ormkit.query", sql = %stmt.sql, params = %param_type_summary(&stmt.params)).entered();
        self.remember_prepared(&stmt.sql);
        let rows = self.connection.query_raw(&stmt.sql, stmt.params)?;
        let row = rows.into_single()?;
        row.at(0).cloned().unwrap_or_else(|| Value::int64(0)).as_i64().ok_or_else(|| {
            ErrorKind::ConversionError {
                reason: "COUNT(*) did not return an integer".to_string(),
            }
            .into()
        })
    }

    pub fn any(&mut self, select: Select) -> Result<bool> {
        self.ensure_open()?;
        let query: Query = select.into();
        let stmt = Visitor::new(self.connection.dialect()).render_exists(&query)?;
        let _span = tracing::debug_span!("ormkit.query", sql = %stmt.sql, params = %param_type_summary(&stmt.params)).entered();
        self.remember_prepared(&stmt.sql);
        let rows = self.connection.query_raw(&stmt.sql, stmt.params)?;
        let row = rows.into_single()?;
        Ok(row.at(0).and_then(Value::as_i64).map(|v| v != 0).unwrap_or(false))
    }

    /// `ExecuteNonQuery` (spec.md §4.5 raw-SQL escape hatch).
    pub fn execute_non_query(&mut self, sql: &str, params: Vec<Value>) -> Result<u64> {
        self.ensure_open()?;
        let _span = tracing::debug_span!("ormkit.query", sql, params = %param_type_summary(&params)).entered();
        self.remember_prepared(sql);
        self.connection.execute_raw(sql, params)
    }

    /// `ExecuteScalar` (spec.md §4.5 raw-SQL escape hatch).
    pub fn execute_scalar(&mut self, sql: &str, params: Vec<Value>) -> Result<Value> {
        self.ensure_open()?;
        let _span = tracing::debug_span!("ormkit.query", sql, params = %param_type_summary(&params)).entered();
        self.remember_prepared(sql);
        let rows = self.connection.query_raw(sql, params)?;
        let row = rows.into_single()?;
        row.at(0).cloned().ok_or_else(|| ErrorKind::NoRows.into())
    }

    /// The first column of every row matching `select` (spec.md §4.6
    /// `Keys()`).
    pub fn scalars(&mut self, select: Select) -> Result<Vec<Value>> {
        self.ensure_open()?;
        let rows = self.query_ast(&select.into())?;
        Ok(rows.into_iter().filter_map(|r| r.at(0).cloned()).collect())
    }

    /// Runs hand-written SQL and materialises the rows into `T`, the way
    /// `query` does for planner-built statements. Backs both the
    /// `Query::Raw` escape hatch and `stateful::StatefulQuerySet::execute`.
    pub fn query_sql<T: Record>(&mut self, sql: &str, params: Vec<Value>) -> Result<Vec<T>> {
        self.ensure_open()?;
        self.remember_prepared(sql);
        let rows = self.connection.query_raw(sql, params)?;
        rows.into_iter().map(|row| T::from_values(&row.columns, &row.values)).collect()
    }

    /// Renders a `Select` to dialect-native SQL without executing it
    /// (`resultset::ResultSet::as_stateful` uses this to freeze a query).
    pub fn render_select(&self, select: Select) -> Result<crate::builder::SqlStatement> {
        self.render(&select.into())
    }

    fn execute_ast(&mut self, query: &Query) -> Result<u64> {
        let stmt = self.render(query)?;
        let _span = tracing::debug_span!("ormkit.query", sql = %stmt.sql, params = %param_type_summary(&stmt.params)).entered();
        self.remember_prepared(&stmt.sql);
        let affected = self.connection.execute_raw(&stmt.sql, stmt.params)?;
        tracing::debug!(affected, "statement executed");
        Ok(affected)
    }

    fn query_ast(&mut self, query: &Query) -> Result<RawResultSet> {
        let stmt = self.render(query)?;
        let _span = tracing::debug_span!("ormkit.query", sql = %stmt.sql, params = %param_type_summary(&stmt.params)).entered();
        self.remember_prepared(&stmt.sql);
        let rows = self.connection.query_raw(&stmt.sql, stmt.params)?;
        tracing::debug!(rows = rows.len(), "statement executed");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::sqlite::SqliteConnection;
    use crate::dialect::SchemaType;
    use crate::mapping::{ColumnMapping, Mapped, TableMapping};

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Widget {
        id: i64,
        name: String,
    }

    impl Mapped for Widget {
        fn describe() -> TableMapping {
            TableMapping::new(
                "Widget",
                "widget",
                vec![
                    ColumnMapping { primary_key: true, auto_generated: true, ..ColumnMapping::plain("id", SchemaType::Integer) },
                    ColumnMapping::plain("name", SchemaType::String),
                ],
            )
        }
    }

    impl Record for Widget {
        fn column_value(&self, physical_name: &str) -> Value {
            match physical_name {
                "id" => Value::from(self.id),
                "name" => Value::from(self.name.clone()),
                other => panic!("no such column `{other}`"),
            }
        }

        fn set_column_value(&mut self, physical_name: &str, value: Value) -> Result<()> {
            match physical_name {
                "id" => {
                    self.id = value.try_into()?;
                    Ok(())
                }
                "name" => {
                    self.name = value.try_into()?;
                    Ok(())
                }
                other => Err(ErrorKind::MappingError { reason: format!("no such column `{other}`") }.into()),
            }
        }
    }

    fn open_widget_table() -> DataContext<SqliteConnection> {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute_raw("CREATE TABLE widget (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT)", vec![]).unwrap();
        DataContext::open(conn)
    }

    #[test]
    fn insert_populates_auto_generated_id_via_last_insert_id() {
        let mut ctx = open_widget_table();
        let mut w = Widget { id: 0, name: "a".to_string() };
        ctx.insert(&mut w).unwrap();
        assert_eq!(w.id, 1);
    }

    #[test]
    fn update_then_query_round_trips() {
        let mut ctx = open_widget_table();
        let mut w = Widget { id: 0, name: "a".to_string() };
        ctx.insert(&mut w).unwrap();

        w.name = "b".to_string();
        ctx.update(&w).unwrap();

        let mapping = MappingRegistry::get::<Widget>();
        let select = crate::planner::Planner::base_select(&mapping, "widget", false);
        let rows: Vec<Widget> = ctx.query(select).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "b");
    }

    #[test]
    fn delete_removes_row() {
        let mut ctx = open_widget_table();
        let mut w = Widget { id: 0, name: "a".to_string() };
        ctx.insert(&mut w).unwrap();
        ctx.delete(&w).unwrap();

        assert_eq!(ctx.count(Select::from_table("widget")).unwrap(), 0);
    }

    #[test]
    fn disposed_context_rejects_further_operations() {
        let mut ctx = open_widget_table();
        ctx.dispose();
        let mut w = Widget { id: 0, name: "a".to_string() };
        assert!(ctx.insert(&mut w).is_err());
    }
}
