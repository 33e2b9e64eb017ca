//! `ormkit`: a relational object-mapping kernel for health-information
//! platforms. Typed predicate/projection ASTs, dialect-aware SQL
//! generation, a synchronous transactional `DataContext`, lazy
//! `ResultSet`s, and an optional application-level `EncryptionAdapter`
//! for columns that must never reach the database in the clear.
//!
//! Module layout follows the dependency flow a query actually travels:
//! `mapping` describes record types, `ast`/`builder`/`dialect`/`visitor`
//! turn predicates into SQL text, `connector`/`pooled` own the wire to
//! the database, `planner` builds the AST from a mapping plus a
//! predicate, and `context`/`resultset`/`stateful`/`provider` are the
//! application-facing surface on top of all of it.

pub mod ast;
pub mod builder;
pub mod config;
pub mod connector;
pub mod context;
pub mod dialect;
pub mod encryption;
pub mod error;
pub mod mapping;
pub mod planner;
#[cfg(feature = "pooled")]
pub mod pooled;
pub mod provider;
pub mod resultset;
pub mod stateful;
pub mod value;
pub mod visitor;

pub use ormkit_derive::Mapped;

/// Commonly imported types, mirroring quaint's own `crate::prelude::*`
/// convention.
pub mod prelude {
    pub use crate::ast::{Column, Comparable, Delete, Expression, Insert, Select, Table, Update};
    pub use crate::config::{ConnectionInfo, ConnectorConfig, EncryptionConfig, Mode};
    pub use crate::connector::{IsolationLevel, Queryable, RawResultSet, TransactionCapable};
    pub use crate::context::DataContext;
    pub use crate::encryption::{EncryptionAdapter, EncryptionMode};
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::mapping::{Mapped, MappingRegistry, Record};
    pub use crate::provider::MappedQueryProvider;
    pub use crate::resultset::ResultSet;
    pub use crate::stateful::{InMemoryQueryPersistence, QueryPersistenceService, StatefulQuerySet};
    pub use crate::value::{Row, Value};
    pub use ormkit_derive::Mapped;
}
