//! Mapped Query Provider (spec.md §4.7): the entry point applications
//! call into — opens lazy `ResultSet<T>`s over a context, translates
//! logical (Rust field) names into physical column references, and
//! rehydrates raw rows into mapped records outside of a `ResultSet`
//! chain (e.g. a row returned by a driver-level raw query).

use crate::ast::{Column, Comparable, Expression, Table};
use crate::connector::TransactionCapable;
use crate::context::DataContext;
use crate::error::{ErrorKind, Result};
use crate::mapping::{MappingRegistry, Record};
use crate::resultset::ResultSet;
use crate::value::Row;

pub struct MappedQueryProvider<'a, C: TransactionCapable> {
    context: &'a mut DataContext<C>,
}

impl<'a, C: TransactionCapable> MappedQueryProvider<'a, C> {
    pub fn new(context: &'a mut DataContext<C>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &DataContext<C> {
        &*self.context
    }

    pub fn context_mut(&mut self) -> &mut DataContext<C> {
        &mut *self.context
    }

    /// Opens a fresh lazy query over `T`'s default projection.
    pub fn execute_query<T: Record>(&mut self) -> ResultSet<'_, T, C> {
        ResultSet::new(&mut *self.context)
    }

    /// Rehydrates a raw row into `T`, for rows obtained outside a
    /// `ResultSet` chain (a raw query, a driver callback).
    pub fn to_model_instance<T: Record>(&self, row: &Row) -> Result<T> {
        T::from_values(&row.columns, &row.values)
    }

    /// Resolves a record type's logical (Rust field) name to the physical
    /// column reference callers build predicates against, aliased as
    /// `"t0"` — the alias `ResultSet::new` uses for a type's own table.
    pub fn map_expression<T: Record>(&self, logical_name: &str) -> Result<Column> {
        let mapping = MappingRegistry::get::<T>();
        let col = mapping.column_for_logical(logical_name).ok_or_else(|| {
            ErrorKind::MappingError {
                reason: format!("no column for logical name `{logical_name}` on `{}`", mapping.type_name),
            }
        })?;
        Ok(Table::new(mapping.table.clone()).alias("t0").column(col.physical_name.clone()))
    }

    /// The predicate `Update`/`Delete` use to target exactly the row a
    /// live instance came from. Concurrency here is keyed by primary key
    /// rather than a dedicated row-version column — this mapping set has
    /// no such column, so identity is the only version the kernel can
    /// check without one.
    pub fn get_current_version_filter<T: Record>(&self, record: &T) -> Result<Expression> {
        let mapping = MappingRegistry::get::<T>();
        let pk = mapping.primary_key_columns().into_iter().next().ok_or_else(|| {
            ErrorKind::MappingError {
                reason: format!("`{}` has no primary key column", mapping.type_name),
            }
        })?;
        let value = record.column_value(&pk.physical_name);
        Ok(Table::new(mapping.table.clone()).alias("t0").column(pk.physical_name.clone()).equals(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::sqlite::SqliteConnection;
    use crate::dialect::SchemaType;
    use crate::mapping::{ColumnMapping, Mapped, TableMapping};
    use crate::value::Value;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Patient {
        id: i64,
        full_name: String,
    }

    impl Mapped for Patient {
        fn describe() -> TableMapping {
            TableMapping::new(
                "Patient",
                "patient",
                vec![
                    ColumnMapping { primary_key: true, auto_generated: true, ..ColumnMapping::plain("id", SchemaType::Integer) },
                    ColumnMapping::plain("name", SchemaType::String).logical("full_name"),
                ],
            )
        }
    }

    impl Record for Patient {
        fn column_value(&self, physical_name: &str) -> Value {
            match physical_name {
                "id" => Value::from(self.id),
                "name" => Value::from(self.full_name.clone()),
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
                    self.full_name = value.try_into()?;
                    Ok(())
                }
                other => Err(ErrorKind::MappingError { reason: format!("no such column `{other}`") }.into()),
            }
        }
    }

    #[test]
    fn map_expression_resolves_logical_name_to_physical_column() {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute_raw("CREATE TABLE patient (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT)", vec![]).unwrap();
        let mut ctx = DataContext::open(conn);
        let provider = MappedQueryProvider::new(&mut ctx);

        let col = provider.map_expression::<Patient>("full_name").unwrap();
        assert_eq!(col.name, "name");
    }

    #[test]
    fn current_version_filter_targets_primary_key() {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute_raw("CREATE TABLE patient (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT)", vec![]).unwrap();
        let mut ctx = DataContext::open(conn);
        let mut patient = Patient { id: 0, full_name: "Alex".to_string() };
        ctx.insert(&mut patient).unwrap();

        let provider = MappedQueryProvider::new(&mut ctx);
        let filter = provider.get_current_version_filter(&patient).unwrap();
        assert!(matches!(filter.kind, crate::ast::ExpressionKind::Compare(_)));
    }
}
