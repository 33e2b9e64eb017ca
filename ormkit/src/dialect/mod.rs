//! Dialect / Statement Factory (spec.md §4.3): per-engine feature flags,
//! keyword spellings, count/exists/returning emitters, the neutral
//! `SchemaType` mapping, and the filter-function plugin registry.

mod filter_function;
pub mod mssql;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use filter_function::{FilterFunction, FilterFunctionRegistry};
pub use mssql::MssqlDialect;
pub use mysql::MysqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use enumflags2::{bitflags, BitFlags};

/// Closed set of capability flags a dialect may or may not have
/// (spec.md §4.3).
#[bitflags]
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    AutoGenerateTimestamps,
    FetchOffset,
    ReturnedInsertsAsParms,
    StrictSubQueryColumnNames,
    AutoGenerateSequences,
    MaterializedViews,
    StoredProcedures,
    LimitOffsetUsesTop,
    IlikeOperator,
}

/// The neutral schema type enum columns are declared in (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
    Binary,
    Boolean,
    Date,
    DateTime,
    Timestamp,
    Decimal,
    Float,
    Integer,
    String,
    Uuid,
}

/// Everything a `Visitor` needs to turn dialect-neutral AST into
/// engine-native SQL text: keyword spellings, capability flags, and the
/// emitters for constructs that vary across engines.
pub trait Dialect: Send + Sync {
    /// Short identifier used in error messages (`UnsupportedFilter`).
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> BitFlags<Capability>;

    fn has(&self, cap: Capability) -> bool {
        self.capabilities().contains(cap)
    }

    /// Quotes an identifier (table/column/alias name) per the engine's
    /// quoting convention.
    fn quote_identifier(&self, ident: &str) -> String;

    /// The case-insensitive-LIKE operator spelling, or `None` if the
    /// dialect has no native operator and must fall back to
    /// `LOWER(col) LIKE LOWER(?)`.
    fn ilike_operator(&self) -> Option<&'static str> {
        if self.has(Capability::IlikeOperator) {
            Some("ILIKE")
        } else {
            None
        }
    }

    fn lower_fn(&self) -> &'static str {
        "LOWER"
    }

    fn upper_fn(&self) -> &'static str {
        "UPPER"
    }

    fn boolean_literal(&self, value: bool) -> &'static str;

    /// Rewrites the builder's positional `?` placeholders into the
    /// engine-native spelling, numbered left to right starting at
    /// `start_index` (1-based).
    fn parameter_placeholder(&self, index: usize) -> String;

    /// Wraps a placeholder for value-type quirks (spec.md §4.3
    /// "for engines that require UUIDs bound as strings").
    fn wrap_uuid_placeholder(&self, placeholder: String) -> String {
        placeholder
    }

    /// `SELECT COUNT(*) FROM (<stmt>) Q0`.
    fn wrap_count(&self, inner_sql: &str) -> String {
        format!("SELECT COUNT(*) FROM ({inner_sql}) Q0")
    }

    /// Dialect-appropriate `EXISTS` wrapping.
    fn wrap_exists(&self, inner_sql: &str) -> String;

    fn limit_offset(&self, limit: Option<u32>, offset: Option<u32>) -> String;

    fn returning_clause(&self, columns: &[String]) -> Option<String> {
        if !self.has(Capability::ReturnedInsertsAsParms) || columns.is_empty() {
            return None;
        }
        let cols = columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!(" RETURNING {cols}"))
    }

    fn data_type_name(&self, ty: SchemaType) -> &'static str;

    fn filter_functions(&self) -> &FilterFunctionRegistry;
}
