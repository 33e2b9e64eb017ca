use super::{IsolationLevel, Queryable, RawResultSet, TransactionCapable};
use crate::ast::Query;
use crate::dialect::{Dialect, MssqlDialect};
use crate::error::{Error, ErrorKind};
use crate::value::{Row, Value, ValueType};
use crate::visitor::Visitor;
use tiberius::{Client, Config, ColumnData};
use tokio::net::TcpStream;
use tokio_util::compat::TokioAsyncWriteCompatExt;

type TiberiusClient = Client<tokio_util::compat::Compat<TcpStream>>;

/// A connection to the networked engine's mssql-compatible driver.
/// `tiberius` is async-only, same bridging strategy as `connector::postgres`
/// and `connector::mysql`.
pub struct MssqlConnection {
    runtime: tokio::runtime::Runtime,
    client: TiberiusClient,
    in_transaction: bool,
}

impl MssqlConnection {
    pub fn connect(connection_string: &str) -> Result<Self, Error> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::db(e.to_string()))?;

        let config = Config::from_ado_string(connection_string).map_err(|e| Error::db(e.to_string()))?;

        let client = runtime.block_on(async {
            let tcp = TcpStream::connect(config.get_addr()).await?;
            tcp.set_nodelay(true).ok();
            Client::connect(config, tcp.compat_write()).await
        });
        let client = client.map_err(|e| Error::db(e.to_string()))?;

        Ok(Self {
            runtime,
            client,
            in_transaction: false,
        })
    }

    fn to_query_values(params: &[Value]) -> Vec<ColumnData<'static>> {
        params
            .iter()
            .map(|v| match &v.typed {
                ValueType::Int32(x) => ColumnData::I32(*x),
                ValueType::Int64(x) => ColumnData::I64(*x),
                ValueType::Double(x) => ColumnData::F64(*x),
                ValueType::Float(x) => ColumnData::F32(*x),
                ValueType::Boolean(x) => ColumnData::Bit(*x),
                ValueType::Text(x) => ColumnData::String(x.clone().map(Into::into)),
                ValueType::Bytes(x) => ColumnData::Binary(x.clone().map(Into::into)),
                ValueType::Uuid(x) => ColumnData::Guid(*x),
                other => ColumnData::String(Some(Value::new(other.clone()).to_string().into())),
            })
            .collect()
    }

    fn row_to_ormkit(row: &tiberius::Row) -> Row {
        let columns: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();
        let values = columns
            .iter()
            .enumerate()
            .map(|(i, _)| {
                row.try_get::<&str, _>(i)
                    .ok()
                    .flatten()
                    .map(|s| Value::text(s.to_string()))
                    .unwrap_or_else(|| Value::new(ValueType::Text(None)))
            })
            .collect();
        Row::new(columns, values)
    }
}

impl Queryable for MssqlConnection {
    fn dialect(&self) -> &'static dyn Dialect {
        MssqlDialect::instance()
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
        let values = Self::to_query_values(&params);
        let refs: Vec<&dyn tiberius::ToSql> = values.iter().map(|v| v as &dyn tiberius::ToSql).collect();
        let client = &mut self.client;
        let result = self
            .runtime
            .block_on(client.execute(sql, &refs))
            .map_err(|e| Error::db(e.to_string()).with_sql(sql, count))?;
        Ok(result.rows_affected().iter().sum())
    }

    fn query_raw(&mut self, sql: &str, params: Vec<Value>) -> Result<RawResultSet, Error> {
        let count = params.len();
        let values = Self::to_query_values(&params);
        let refs: Vec<&dyn tiberius::ToSql> = values.iter().map(|v| v as &dyn tiberius::ToSql).collect();
        let client = &mut self.client;
        let rows = self
            .runtime
            .block_on(async {
                let stream = client.query(sql, &refs).await?;
                stream.into_first_result().await
            })
            .map_err(|e| Error::db(e.to_string()).with_sql(sql, count))?;

        Ok(RawResultSet {
            rows: rows.iter().map(Self::row_to_ormkit).collect(),
        })
    }
}

impl TransactionCapable for MssqlConnection {
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
                IsolationLevel::Snapshot => "SET TRANSACTION ISOLATION LEVEL SNAPSHOT",
            };
            self.execute_raw(sql, vec![])?;
        }

        self.execute_raw("BEGIN TRANSACTION", vec![])?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), Error> {
        self.execute_raw("COMMIT TRANSACTION", vec![])?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), Error> {
        self.execute_raw("ROLLBACK TRANSACTION", vec![])?;
        self.in_transaction = false;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }
}
