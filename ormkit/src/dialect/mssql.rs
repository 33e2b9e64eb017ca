use super::filter_function::{FilterFunction, FilterFunctionRegistry};
use super::{Capability, Dialect, SchemaType};
use crate::ast::{Column, Expression};
use crate::builder::SqlBuilder;
use crate::error::Error;
use crate::value::ValueType;
use enumflags2::BitFlags;
use once_cell::sync::Lazy;

/// The networked engine dialect (spec.md "a networked engine").
pub struct MssqlDialect {
    functions: FilterFunctionRegistry,
}

impl Default for MssqlDialect {
    fn default() -> Self {
        let mut functions = FilterFunctionRegistry::new();
        functions.register("substring", Box::new(Substring));
        functions.register("trim", Box::new(Trim));
        functions.register("freetext", Box::new(Freetext));
        Self { functions }
    }
}

static INSTANCE: Lazy<MssqlDialect> = Lazy::new(MssqlDialect::default);

impl MssqlDialect {
    pub fn instance() -> &'static MssqlDialect {
        &INSTANCE
    }
}

impl Dialect for MssqlDialect {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn capabilities(&self) -> BitFlags<Capability> {
        Capability::AutoGenerateSequences
            | Capability::ReturnedInsertsAsParms
            | Capability::StoredProcedures
            | Capability::LimitOffsetUsesTop
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("[{}]", ident.replace(']', "]]"))
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    fn parameter_placeholder(&self, index: usize) -> String {
        format!("@p{index}")
    }

    fn wrap_exists(&self, inner_sql: &str) -> String {
        format!("SELECT EXISTS({inner_sql})")
    }

    fn limit_offset(&self, limit: Option<u32>, offset: Option<u32>) -> String {
        // MSSQL requires an ORDER BY for OFFSET/FETCH; the planner
        // guarantees one is always present when Skip/Take is used
        // (spec.md §4.4).
        match (limit, offset) {
            (Some(l), Some(o)) => format!(" OFFSET {o} ROWS FETCH NEXT {l} ROWS ONLY"),
            (Some(_), None) => String::new(), // rendered as TOP in the visitor instead
            (None, Some(o)) => format!(" OFFSET {o} ROWS"),
            (None, None) => String::new(),
        }
    }

    fn returning_clause(&self, columns: &[String]) -> Option<String> {
        if columns.is_empty() {
            return None;
        }
        let cols = columns
            .iter()
            .map(|c| format!("INSERTED.{}", self.quote_identifier(c)))
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!(" OUTPUT {cols}"))
    }

    fn data_type_name(&self, ty: SchemaType) -> &'static str {
        match ty {
            SchemaType::Binary => "VARBINARY(MAX)",
            SchemaType::Boolean => "BIT",
            SchemaType::Date => "DATE",
            SchemaType::DateTime => "DATETIME2",
            SchemaType::Timestamp => "DATETIME2",
            SchemaType::Decimal => "DECIMAL",
            SchemaType::Float => "FLOAT",
            SchemaType::Integer => "INT",
            SchemaType::String => "NVARCHAR(MAX)",
            SchemaType::Uuid => "UNIQUEIDENTIFIER",
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
        let len = args.get(1).map(|_| "?").unwrap_or("2147483647");
        builder.append(format!("SUBSTRING({}, {}, {})", column.name, start, len), vec![]);
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
        builder.append(format!("LTRIM(RTRIM({}))", column.name), vec![]);
        Ok(())
    }
}

struct Freetext;

impl FilterFunction for Freetext {
    fn render(
        &self,
        builder: &mut SqlBuilder,
        column: &Column,
        _args: &[Expression],
        _operand: &Expression,
        _operand_type: ValueType,
    ) -> Result<(), Error> {
        builder.append(format!("CONTAINS({}, ?)", column.name), vec![]);
        Ok(())
    }
}
