use super::filter_function::{FilterFunction, FilterFunctionRegistry};
use super::{Capability, Dialect, SchemaType};
use crate::ast::{Column, Expression};
use crate::builder::SqlBuilder;
use crate::error::Error;
use crate::value::ValueType;
use enumflags2::BitFlags;
use once_cell::sync::Lazy;

pub struct PostgresDialect {
    functions: FilterFunctionRegistry,
}

impl Default for PostgresDialect {
    fn default() -> Self {
        let mut functions = FilterFunctionRegistry::new();
        functions.register("substring", Box::new(Substring));
        functions.register("trim", Box::new(Trim));
        functions.register("freetext", Box::new(Freetext));
        Self { functions }
    }
}

static INSTANCE: Lazy<PostgresDialect> = Lazy::new(PostgresDialect::default);

impl PostgresDialect {
    pub fn instance() -> &'static PostgresDialect {
        &INSTANCE
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn capabilities(&self) -> BitFlags<Capability> {
        Capability::AutoGenerateTimestamps
            | Capability::FetchOffset
            | Capability::ReturnedInsertsAsParms
            | Capability::MaterializedViews
            | Capability::StoredProcedures
            | Capability::IlikeOperator
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    fn parameter_placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn wrap_exists(&self, inner_sql: &str) -> String {
        format!("SELECT EXISTS({inner_sql})")
    }

    fn limit_offset(&self, limit: Option<u32>, offset: Option<u32>) -> String {
        let mut s = String::new();
        if let Some(l) = limit {
            s.push_str(&format!(" LIMIT {l}"));
        }
        if let Some(o) = offset {
            s.push_str(&format!(" OFFSET {o}"));
        }
        s
    }

    fn data_type_name(&self, ty: SchemaType) -> &'static str {
        match ty {
            SchemaType::Binary => "BYTEA",
            SchemaType::Boolean => "BOOLEAN",
            SchemaType::Date => "DATE",
            SchemaType::DateTime => "TIMESTAMPTZ",
            SchemaType::Timestamp => "TIMESTAMPTZ",
            SchemaType::Decimal => "NUMERIC",
            SchemaType::Float => "DOUBLE PRECISION",
            SchemaType::Integer => "INTEGER",
            SchemaType::String => "TEXT",
            SchemaType::Uuid => "UUID",
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
        let len = args.get(1).map(|_| "?").unwrap_or("NULL");
        builder.append(format!("SUBSTRING({} FROM {} FOR {})", column.name, start, len), vec![]);
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
        builder.append(format!("TRIM({})", column.name), vec![]);
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
        builder.append(
            format!("to_tsvector({}) @@ plainto_tsquery(?)", column.name),
            vec![],
        );
        Ok(())
    }
}
