use super::{IsolationLevel, Queryable, RawResultSet, TransactionCapable};
use crate::ast::Query;
use crate::dialect::{Dialect, PostgresDialect};
use crate::error::{Error, ErrorKind};
use crate::value::{Row, Value, ValueType};
use crate::visitor::Visitor;
use tokio_postgres::{Client, NoTls};

/// A connection to the networked engine's postgresql-compatible driver.
/// `tokio-postgres` is async-only; this wraps it with a small dedicated
/// runtime and blocks on every call, matching the blocking-I/O
/// requirement in spec.md §5.
pub struct PostgresConnection {
    runtime: tokio::runtime::Runtime,
    client: Client,
    in_transaction: bool,
}

impl PostgresConnection {
    pub fn connect(connection_string: &str) -> Result<Self, Error> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::db(e.to_string()))?;

        let (client, connection) = runtime
            .block_on(tokio_postgres::connect(connection_string, NoTls))
            .map_err(|e| Error::db(e.to_string()))?;

        runtime.spawn(async move {
            if let Err(err) = connection.await {
                tracing::error!(error = %err, "postgresql connection task terminated");
            }
        });

        Ok(Self {
            runtime,
            client,
            in_transaction: false,
        })
    }

    fn to_sql_params(params: &[Value]) -> Vec<Box<dyn postgres_types::ToSql + Sync>> {
        params
            .iter()
            .map(|v| -> Box<dyn postgres_types::ToSql + Sync> {
                match &v.typed {
                    ValueType::Int32(x) => Box::new(*x),
                    ValueType::Int64(x) => Box::new(*x),
                    ValueType::Double(x) => Box::new(*x),
                    ValueType::Text(x) => Box::new(x.clone()),
                    ValueType::Bytes(x) => Box::new(x.clone()),
                    ValueType::Boolean(x) => Box::new(*x),
                    ValueType::Uuid(x) => Box::new(*x),
                    ValueType::DateTime(x) => Box::new(*x),
                    _ => Box::new(v.to_string()),
                }
            })
            .collect()
    }

    fn row_to_ormkit(row: &tokio_postgres::Row) -> Row {
        let columns: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();
        let values = columns
            .iter()
            .enumerate()
            .map(|(i, _)| {
                row.try_get::<_, Option<String>>(i)
                    .map(|v| v.map(Value::text).unwrap_or_else(|| Value::new(ValueType::Text(None))))
                    .unwrap_or_else(|_| Value::new(ValueType::Text(None)))
            })
            .collect();
        Row::new(columns, values)
    }
}

impl Queryable for PostgresConnection {
    fn dialect(&self) -> &'static dyn Dialect {
        PostgresDialect::instance()
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
        let bound = Self::to_sql_params(&params);
        let refs: Vec<&(dyn postgres_types::ToSql + Sync)> = bound.iter().map(|b| b.as_ref()).collect();
        let client = &self.client;
        self.runtime
            .block_on(client.execute(sql, &refs))
            .map_err(|e| Error::db(e.to_string()).with_sql(sql, params.len()))
    }

    fn query_raw(&mut self, sql: &str, params: Vec<Value>) -> Result<RawResultSet, Error> {
        let bound = Self::to_sql_params(&params);
        let refs: Vec<&(dyn postgres_types::ToSql + Sync)> = bound.iter().map(|b| b.as_ref()).collect();
        let client = &self.client;
        let rows = self
            .runtime
            .block_on(client.query(sql, &refs))
            .map_err(|e| Error::db(e.to_string()).with_sql(sql, params.len()))?;
        Ok(RawResultSet {
            rows: rows.iter().map(Self::row_to_ormkit).collect(),
        })
    }
}

impl TransactionCapable for PostgresConnection {
    fn start_transaction(&mut self, isolation: Option<IsolationLevel>) -> Result<(), Error> {
        if self.in_transaction {
            return Err(ErrorKind::InvalidContextState {
                reason: "a transaction is already active on this connection".to_string(),
            }
            .into());
        }

        self.execute_raw("BEGIN", vec![])?;
        if let Some(level) = isolation {
            let sql = match level {
                IsolationLevel::ReadUncommitted => "SET TRANSACTION ISOLATION LEVEL READ UNCOMMITTED",
                IsolationLevel::ReadCommitted => "SET TRANSACTION ISOLATION LEVEL READ COMMITTED",
                IsolationLevel::RepeatableRead => "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ",
                IsolationLevel::Serializable => "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE",
                IsolationLevel::Snapshot => {
                    return Err(ErrorKind::InvalidContextState {
                        reason: "postgresql has no snapshot isolation level".to_string(),
                    }
                    .into())
                }
            };
            self.execute_raw(sql, vec![])?;
        }
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
