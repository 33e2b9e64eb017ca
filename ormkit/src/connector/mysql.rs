use super::{IsolationLevel, Queryable, RawResultSet, TransactionCapable};
use crate::ast::Query;
use crate::dialect::{Dialect, MysqlDialect};
use crate::error::{Error, ErrorKind};
use crate::value::{Row, Value, ValueType};
use crate::visitor::Visitor;
use mysql_async::prelude::Queryable as MysqlDriverQueryable;
use mysql_async::{Conn, Opts, Params, Value as MysqlValue};

/// A connection to the networked engine's mysql/mariadb-compatible driver.
/// `mysql_async` is async-only; like `connector::postgres`, calls here
/// block on a dedicated runtime owned by the connection.
pub struct MysqlConnection {
    runtime: tokio::runtime::Runtime,
    conn: Conn,
    in_transaction: bool,
}

impl MysqlConnection {
    pub fn connect(connection_string: &str) -> Result<Self, Error> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::db(e.to_string()))?;

        let opts = Opts::from_url(connection_string).map_err(|e| Error::db(e.to_string()))?;
        let conn = runtime
            .block_on(Conn::new(opts))
            .map_err(|e| Error::db(e.to_string()))?;

        Ok(Self {
            runtime,
            conn,
            in_transaction: false,
        })
    }

    fn to_driver_params(params: Vec<Value>) -> Params {
        let values: Vec<MysqlValue> = params.into_iter().map(Self::to_driver_value).collect();
        Params::Positional(values)
    }

    fn to_driver_value(value: Value) -> MysqlValue {
        match value.typed {
            ValueType::Int32(v) => v.map(MysqlValue::from).unwrap_or(MysqlValue::NULL),
            ValueType::Int64(v) => v.map(MysqlValue::from).unwrap_or(MysqlValue::NULL),
            ValueType::Double(v) => v.map(MysqlValue::from).unwrap_or(MysqlValue::NULL),
            ValueType::Float(v) => v.map(MysqlValue::from).unwrap_or(MysqlValue::NULL),
            ValueType::Text(v) => v.map(MysqlValue::from).unwrap_or(MysqlValue::NULL),
            ValueType::Bytes(v) => v.map(MysqlValue::from).unwrap_or(MysqlValue::NULL),
            ValueType::Boolean(v) => v.map(|b| MysqlValue::from(b as i64)).unwrap_or(MysqlValue::NULL),
            ValueType::Uuid(v) => v.map(|u| MysqlValue::from(u.to_string())).unwrap_or(MysqlValue::NULL),
            ValueType::DateTime(v) => v.map(|d| MysqlValue::from(d.naive_utc())).unwrap_or(MysqlValue::NULL),
            other => Value::new(other).to_string().into(),
        }
    }

    fn row_to_ormkit(row: mysql_async::Row) -> Row {
        let columns: Vec<String> = row
            .columns_ref()
            .iter()
            .map(|c| c.name_str().into_owned())
            .collect();

        let mut values = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            let cell: Option<String> = row.get(i);
            values.push(cell.map(Value::text).unwrap_or_else(|| Value::new(ValueType::Text(None))));
        }
        Row::new(columns, values)
    }
}

impl Queryable for MysqlConnection {
    fn dialect(&self) -> &'static dyn Dialect {
        MysqlDialect::instance()
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
        let count = params.len();
        let driver_params = Self::to_driver_params(params);
        let sql = sql.to_string();
        let conn = &mut self.conn;
        self.runtime
            .block_on(async move {
                conn.exec_drop(&sql, driver_params).await?;
                Ok::<_, mysql_async::Error>(conn.affected_rows())
            })
            .map_err(|e| Error::db(e.to_string()).with_sql(&sql, count))
    }

    fn query_raw(&mut self, sql: &str, params: Vec<Value>) -> Result<RawResultSet, Error> {
        let count = params.len();
        let driver_params = Self::to_driver_params(params);
        let sql_owned = sql.to_string();
        let conn = &mut self.conn;
        let rows: Vec<mysql_async::Row> = self
            .runtime
            .block_on(conn.exec(&sql_owned, driver_params))
            .map_err(|e| Error::db(e.to_string()).with_sql(&sql_owned, count))?;

        Ok(RawResultSet {
            rows: rows.into_iter().map(Self::row_to_ormkit).collect(),
        })
    }
}

impl TransactionCapable for MysqlConnection {
    fn start_transaction(&mut self, isolation: Option<IsolationLevel>) -> Result<(), Error> {
        if self.in_transaction {
            return Err(ErrorKind::InvalidContextState {
                reason: "a transaction is already active on this connection".to_string(),
            }
            .into());
        }

        if let Some(level) = isolation {
            let sql = match level {
                IsolationLevel::ReadUncommitted => "SET TRANSACTION ISOLATION LEVEL READ UNCOMMITTED",
                IsolationLevel::ReadCommitted => "SET TRANSACTION ISOLATION LEVEL READ COMMITTED",
                IsolationLevel::RepeatableRead => "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ",
                IsolationLevel::Serializable => "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE",
                IsolationLevel::Snapshot => {
                    return Err(ErrorKind::InvalidContextState {
                        reason: "mysql has no snapshot isolation level".to_string(),
                    }
                    .into())
                }
            };
            self.execute_raw(sql, vec![])?;
        }

        self.execute_raw("START TRANSACTION", vec![])?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), Error> {
        self.execute_raw("COMMIT", vec![])?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), Error> {
        self.execute_raw("ROLLBACK", vec![])?;
        self.in_transaction = false;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }
}
