//! `AsStateful` (spec.md §4.6): detaches a lazily-built query from its
//! originating `DataContext` so it can be persisted and re-run later,
//! possibly against a different connection, via a pluggable
//! `QueryPersistenceService`.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Mutex;

use crate::connector::TransactionCapable;
use crate::context::DataContext;
use crate::error::{ErrorKind, Result};
use crate::mapping::Record;
use crate::value::Value;

/// Stores and retrieves the frozen `(sql, params)` pair behind a
/// `StatefulQuerySet`'s id. Kept as a trait rather than a concrete store
/// since where this actually persists (a table, a cache, a file) is an
/// application concern the kernel doesn't decide.
pub trait QueryPersistenceService: Send + Sync {
    fn save(&self, id: &str, sql: &str, params: &[Value]) -> Result<()>;
    fn load(&self, id: &str) -> Result<Option<(String, Vec<Value>)>>;
    fn remove(&self, id: &str) -> Result<()>;
}

/// An in-memory `QueryPersistenceService`, primarily for tests and for
/// applications that only need statefulness within a single process
/// lifetime.
#[derive(Default)]
pub struct InMemoryQueryPersistence {
    store: Mutex<HashMap<String, (String, Vec<Value>)>>,
}

impl QueryPersistenceService for InMemoryQueryPersistence {
    fn save(&self, id: &str, sql: &str, params: &[Value]) -> Result<()> {
        self.store.lock().unwrap().insert(id.to_string(), (sql.to_string(), params.to_vec()));
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Option<(String, Vec<Value>)>> {
        Ok(self.store.lock().unwrap().get(id).cloned())
    }

    fn remove(&self, id: &str) -> Result<()> {
        self.store.lock().unwrap().remove(id);
        Ok(())
    }
}

/// A previously built query, frozen to its rendered SQL text and bound
/// parameters (spec.md §4.6 "stateful query set"). Re-executable against
/// any `DataContext` whose connection speaks the dialect it was rendered
/// for, independent of the context that built it.
pub struct StatefulQuerySet<T: Record> {
    pub id: String,
    pub sql: String,
    pub params: Vec<Value>,
    _marker: PhantomData<T>,
}

impl<T: Record> StatefulQuerySet<T> {
    pub fn new(id: impl Into<String>, sql: String, params: Vec<Value>) -> Self {
        Self { id: id.into(), sql, params, _marker: PhantomData }
    }

    pub fn persist(&self, service: &dyn QueryPersistenceService) -> Result<()> {
        service.save(&self.id, &self.sql, &self.params)
    }

    pub fn restore(id: impl Into<String>, service: &dyn QueryPersistenceService) -> Result<Option<Self>> {
        let id = id.into();
        Ok(service
            .load(&id)?
            .map(|(sql, params)| Self { id, sql, params, _marker: PhantomData }))
    }

    pub fn execute<C: TransactionCapable>(&self, context: &mut DataContext<C>) -> Result<Vec<T>> {
        context.query_sql(&self.sql, self.params.clone())
    }

    pub fn execute_single<C: TransactionCapable>(&self, context: &mut DataContext<C>) -> Result<T> {
        let mut rows = self.execute(context)?;
        match rows.len() {
            0 => Err(ErrorKind::NoRows.into()),
            1 => Ok(rows.remove(0)),
            _ => Err(ErrorKind::MoreThanOne.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::SchemaType;
    use crate::mapping::{ColumnMapping, Mapped, TableMapping};

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Scalar {
        value: i32,
    }

    impl Mapped for Scalar {
        fn describe() -> TableMapping {
            TableMapping::new("Scalar", "scalar", vec![ColumnMapping::plain("value", SchemaType::Integer)])
        }
    }

    impl Record for Scalar {
        fn column_value(&self, physical_name: &str) -> Value {
            match physical_name {
                "value" => Value::from(self.value),
                other => panic!("no such column `{other}`"),
            }
        }

        fn set_column_value(&mut self, physical_name: &str, value: Value) -> Result<()> {
            match physical_name {
                "value" => {
                    self.value = value.try_into()?;
                    Ok(())
                }
                other => Err(ErrorKind::MappingError { reason: format!("no such column `{other}`") }.into()),
            }
        }
    }

    #[test]
    fn persist_then_restore_round_trips() {
        let service = InMemoryQueryPersistence::default();
        let set: StatefulQuerySet<Scalar> = StatefulQuerySet::new("q1", "SELECT 1".to_string(), vec![Value::int32(1)]);
        set.persist(&service).unwrap();

        let restored: StatefulQuerySet<Scalar> = StatefulQuerySet::restore("q1", &service).unwrap().unwrap();
        assert_eq!(restored.sql, "SELECT 1");
        assert_eq!(restored.params, vec![Value::int32(1)]);
    }
}
