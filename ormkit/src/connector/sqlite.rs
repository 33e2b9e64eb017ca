use super::{IsolationLevel, Queryable, RawResultSet, TransactionCapable};
use crate::ast::Query;
use crate::dialect::{Dialect, SqliteDialect};
use crate::error::{Error, ErrorKind};
use crate::value::{Row, Value, ValueType};
use crate::visitor::Visitor;
use rusqlite::{types::ValueRef, Connection};
use std::path::Path;

/// A connection to the embedded file database. `rusqlite` is natively
/// blocking, so no runtime bridge is needed here (contrast
/// `connector::postgres`/`mysql`/`mssql`).
pub struct SqliteConnection {
    conn: Connection,
    in_transaction: bool,
}

impl SqliteConnection {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path)?;
        Ok(Self { conn, in_transaction: false })
    }

    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn, in_transaction: false })
    }
}

fn bind_value(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as RV;

    match &value.typed {
        ValueType::Int32(v) => v.map(|v| RV::Integer(v as i64)).unwrap_or(RV::Null),
        ValueType::Int64(v) => v.map(RV::Integer).unwrap_or(RV::Null),
        ValueType::Float(v) => v.map(|v| RV::Real(v as f64)).unwrap_or(RV::Null),
        ValueType::Double(v) => v.map(RV::Real).unwrap_or(RV::Null),
        ValueType::Text(v) => v.clone().map(RV::Text).unwrap_or(RV::Null),
        ValueType::Bytes(v) => v.clone().map(RV::Blob).unwrap_or(RV::Null),
        ValueType::Boolean(v) => v.map(|v| RV::Integer(v as i64)).unwrap_or(RV::Null),
        ValueType::Json(v) => v.clone().map(|v| RV::Text(v.to_string())).unwrap_or(RV::Null),
        ValueType::Uuid(v) => v.map(|v| RV::Text(v.to_string())).unwrap_or(RV::Null),
        ValueType::DateTime(v) => v.map(|v| RV::Text(v.to_rfc3339())).unwrap_or(RV::Null),
        ValueType::Date(v) => v.map(|v| RV::Text(v.to_string())).unwrap_or(RV::Null),
        ValueType::Time(v) => v.map(|v| RV::Text(v.to_string())).unwrap_or(RV::Null),
        ValueType::Numeric(v) => v.clone().map(|v| RV::Text(v.to_string())).unwrap_or(RV::Null),
        ValueType::Array(_) => RV::Null,
    }
}

fn column_to_value(value_ref: ValueRef<'_>) -> Value {
    match value_ref {
        ValueRef::Null => Value::new(ValueType::Text(None)),
        ValueRef::Integer(i) => Value::int64(i),
        ValueRef::Real(f) => Value::double(f),
        ValueRef::Text(t) => Value::text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::bytes(b.to_vec()),
    }
}

impl Queryable for SqliteConnection {
    fn dialect(&self) -> &'static dyn Dialect {
        SqliteDialect::instance()
    }

    fn execute(&mut self, query: &Query) -> Result<u64, Error> {
        let stmt = Visitor::new(self.dialect()).render(query)?;
        self.execute_raw(&stmt.sql, stmt.params)
    }

    fn query(&mut self, query: &Query) -> Result<RawResultSet, Error> {
        let stmt = Visitor::new(self.dialect()).render(query)?;
        self.query_raw(&stmt.sql, stmt.params)
    }

    fn execute_raw(&mut self, sql: &str, params: Vec<Value>) -> Result<u64, Error> {
        let bound: Vec<rusqlite::types::Value> = params.iter().map(bind_value).collect();
        let params_ref: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
        let affected = self.conn.execute(sql, params_ref.as_slice())?;
        Ok(affected as u64)
    }

    fn query_raw(&mut self, sql: &str, params: Vec<Value>) -> Result<RawResultSet, Error> {
        let bound: Vec<rusqlite::types::Value> = params.iter().map(bind_value).collect();
        let params_ref: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|v| v as &dyn rusqlite::ToSql).collect();

        let mut stmt = self.conn.prepare(sql)?;
        let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

        let mut rows = Vec::new();
        let mut result_rows = stmt.query(params_ref.as_slice())?;

        while let Some(row) = result_rows.next()? {
            let mut values = Vec::with_capacity(column_names.len());
            for i in 0..column_names.len() {
                values.push(column_to_value(row.get_ref(i)?));
            }
            rows.push(Row::new(column_names.clone(), values));
        }

        Ok(RawResultSet { rows })
    }

    fn last_insert_id(&mut self) -> Result<Option<Value>, Error> {
        Ok(Some(Value::int64(self.conn.last_insert_rowid())))
    }
}

impl TransactionCapable for SqliteConnection {
    fn start_transaction(&mut self, isolation: Option<IsolationLevel>) -> Result<(), Error> {
        if self.in_transaction {
            return Err(ErrorKind::InvalidContextState {
                reason: "a transaction is already active on this connection".to_string(),
            }
            .into());
        }

        if let Some(level) = isolation {
            if level != IsolationLevel::Serializable {
                return Err(ErrorKind::InvalidContextState {
                    reason: "sqlite only supports the serializable isolation level".to_string(),
                }
                .into());
            }
        }

        self.conn.execute_batch("BEGIN")?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), Error> {
        self.conn.execute_batch("COMMIT")?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), Error> {
        self.conn.execute_batch("ROLLBACK")?;
        self.in_transaction = false;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Comparable, Insert, Select};

    #[test]
    fn execute_and_query_round_trip() {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute_raw("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)", vec![])
            .unwrap();

        let insert = Insert::single_into("t").value("id", 1).value("name", "a");
        conn.execute(&insert.into()).unwrap();

        let select = Select::from_table("t").column("name").and_where(crate::ast::Column::new("id").equals(1));
        let rows = conn.query(&select.into()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.rows[0]["name"], Value::text("a"));
    }

    #[test]
    fn nested_transaction_fails() {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        conn.start_transaction(None).unwrap();
        assert!(conn.start_transaction(None).is_err());
        conn.rollback().unwrap();
    }
}
