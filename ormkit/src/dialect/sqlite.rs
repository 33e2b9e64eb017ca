use super::filter_function::{FilterFunction, FilterFunctionRegistry};
use super::{Capability, Dialect, SchemaType};
use crate::ast::{Column, Expression};
use crate::builder::SqlBuilder;
use crate::error::Error;
use crate::value::ValueType;
use enumflags2::BitFlags;
use once_cell::sync::Lazy;

/// The embedded file database dialect (spec.md "an embedded file
/// database"). Has no native `EXISTS` projection shortcut the way
/// postgresql/mysql do, so `wrap_exists` falls back to the
/// `CASE WHEN EXISTS (...) THEN 1 ELSE 0 END` shape spec.md §4.3 calls
/// out explicitly, and lacks native UUID storage so UUID placeholders are
/// wrapped through a deterministic string coercion (spec.md §9b, §4.3
/// "wrap the placeholder in `char_to_uuid(?)`").
pub struct SqliteDialect {
    functions: FilterFunctionRegistry,
}

impl Default for SqliteDialect {
    fn default() -> Self {
        let mut functions = FilterFunctionRegistry::new();
        functions.register("substring", Box::new(Substring));
        functions.register("trim", Box::new(Trim));
        Self { functions }
    }
}

static INSTANCE: Lazy<SqliteDialect> = Lazy::new(SqliteDialect::default);

impl SqliteDialect {
    pub fn instance() -> &'static SqliteDialect {
        &INSTANCE
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn capabilities(&self) -> BitFlags<Capability> {
        Capability::FetchOffset.into()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    fn parameter_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn wrap_uuid_placeholder(&self, placeholder: String) -> String {
        format!("char_to_uuid({placeholder})")
    }

    fn wrap_exists(&self, inner_sql: &str) -> String {
        format!("SELECT CASE WHEN EXISTS ({inner_sql}) THEN 1 ELSE 0 END FROM (SELECT 1) AS _dual")
    }

    fn limit_offset(&self, limit: Option<u32>, offset: Option<u32>) -> String {
        match (limit, offset) {
            (Some(l), Some(o)) => format!(" LIMIT {l} OFFSET {o}"),
            (Some(l), None) => format!(" LIMIT {l}"),
            (None, Some(o)) => format!(" LIMIT -1 OFFSET {o}"),
            (None, None) => String::new(),
        }
    }

    fn data_type_name(&self, ty: SchemaType) -> &'static str {
        match ty {
            SchemaType::Binary => "BLOB",
            SchemaType::Boolean => "BOOLEAN",
            SchemaType::Date => "DATE",
            SchemaType::DateTime => "DATETIME",
            SchemaType::Timestamp => "DATETIME",
            SchemaType::Decimal => "DECIMAL",
            SchemaType::Float => "REAL",
            SchemaType::Integer => "INTEGER",
            SchemaType::String => "TEXT",
            SchemaType::Uuid => "TEXT",
        }
    }

    fn filter_functions(&self) -> &FilterFunctionRegistry {
        &self.functions
    }
}

struct Substring;

impl FilterFunction for Substring {
    fn render(
        &self,
        builder: &mut SqlBuilder,
        column: &Column,
        args: &[Expression],
        _operand: &Expression,
        _operand_type: ValueType,
    ) -> Result<(), Error> {
        let start = args.first().map(|_| "?").unwrap_or("1");
        let len = args.get(1).map(|_| "?").unwrap_or("-1");
        builder.append(format!("substr({}, {}, {})", column.name, start, len), vec![]);
        Ok(())
    }
}

struct Trim;

impl FilterFunction for Trim {
    fn render(
        &self,
        builder: &mut SqlBuilder,
        column: &Column,
        _args: &[Expression],
        _operand: &Expression,
        _operand_type: ValueType,
    ) -> Result<(), Error> {
        builder.append(format!("trim({})", column.name), vec![]);
        Ok(())
    }
}
