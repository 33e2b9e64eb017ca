//! Connection pooling (spec.md §4.5's "pooled" feature), backed by `mobc`.
//!
//! `mobc`'s `Manager` trait is async; the connections it hands out here are
//! the same synchronous `Queryable` implementations the rest of the crate
//! uses (see `connector`'s module docs on the blocking-I/O decision), so the
//! pool owns a small dedicated runtime and blocks on checkout the same way
//! an individual async-only connector blocks on a query.

use crate::connector::Queryable;
use crate::error::Error;
use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// Builds a fresh connection on demand. Implemented by a plain closure for
/// each engine's `connect`/`open` constructor.
pub trait ConnectionFactory<T>: Send + Sync {
    fn build(&self) -> Result<T, Error>;
}

impl<T, F> ConnectionFactory<T> for F
where
    F: Fn() -> Result<T, Error> + Send + Sync,
{
    fn build(&self) -> Result<T, Error> {
        self()
    }
}

struct ManagerAdapter<T, F> {
    factory: F,
    _marker: PhantomData<T>,
}

#[async_trait]
impl<T, F> mobc::Manager for ManagerAdapter<T, F>
where
    T: Queryable + Send + 'static,
    F: ConnectionFactory<T> + 'static,
{
    type Connection = T;
    type Error = Error;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        self.factory.build()
    }

    async fn check(&self, conn: Self::Connection) -> Result<Self::Connection, Self::Error> {
        Ok(conn)
    }
}

/// Settings controlling pool sizing and connection lifetime. Mirrors the
/// knobs exposed on `ConnectorConfig` (`SPEC_FULL.md`'s configuration
/// section).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_size: u64,
    pub min_idle: Option<u64>,
    pub connect_timeout: Duration,
    pub max_lifetime: Option<Duration>,
    pub idle_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            min_idle: None,
            connect_timeout: Duration::from_secs(5),
            max_lifetime: Some(Duration::from_secs(30 * 60)),
            idle_timeout: Some(Duration::from_secs(10 * 60)),
        }
    }
}

/// A checked-out connection. Returned to the pool on drop.
pub struct PooledConnection<T: Queryable + Send + 'static>(mobc::Connection<ManagerAdapter<T, BoxedFactory<T>>>);

impl<T: Queryable + Send + 'static> std::ops::Deref for PooledConnection<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Queryable + Send + 'static> std::ops::DerefMut for PooledConnection<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

type BoxedFactory<T> = Box<dyn ConnectionFactory<T>>;

/// A synchronous handle to a pool of connections of a single engine type.
pub struct Pool<T: Queryable + Send + 'static> {
    runtime: Arc<tokio::runtime::Runtime>,
    inner: mobc::Pool<ManagerAdapter<T, BoxedFactory<T>>>,
}

impl<T: Queryable + Send + 'static> Pool<T> {
    pub fn new(config: PoolConfig, factory: impl ConnectionFactory<T> + 'static) -> Result<Self, Error> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::db(e.to_string()))?;

        let manager = ManagerAdapter {
            factory: Box::new(factory) as BoxedFactory<T>,
            _marker: PhantomData,
        };

        let inner = mobc::Pool::builder()
            .max_open(config.max_size)
            .min_idle(config.min_idle)
            .get_timeout(Some(config.connect_timeout))
            .max_lifetime(config.max_lifetime)
            .max_idle_lifetime(config.idle_timeout)
            .build(manager);

        Ok(Self {
            runtime: Arc::new(runtime),
            inner,
        })
    }

    /// Checks out a connection, blocking the calling thread until one is
    /// available or `connect_timeout` elapses.
    pub fn get(&self) -> Result<PooledConnection<T>, Error> {
        let conn = self
            .runtime
            .block_on(self.inner.get())
            .map_err(|e| Error::db(e.to_string()))?;
        Ok(PooledConnection(conn))
    }

    pub fn state(&self) -> PoolState {
        let state = self.inner.state();
        PoolState {
            connections: state.connections,
            idle: state.idle,
            in_use: state.connections.saturating_sub(state.idle),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PoolState {
    pub connections: u64,
    pub idle: u64,
    pub in_use: u64,
}
