use super::filter_function::{FilterFunction, FilterFunctionRegistry};
use super::{Capability, Dialect, SchemaType};
use crate::ast::{Column, Expression};
use crate::builder::SqlBuilder;
use crate::error::Error;
use crate::value::ValueType;
use enumflags2::BitFlags;
use once_cell::sync::Lazy;

pub struct MysqlDialect {
    functions: FilterFunctionRegistry,
}

impl Default for MysqlDialect {
    fn default() -> Self {
        let mut functions = FilterFunctionRegistry::new();
        functions.register("substring", Box::new(Substring));
        functions.register("trim", Box::new(Trim));
        functions.register("freetext", Box::new(Freetext));
        Self { functions }
    }
}

static INSTANCE: Lazy<MysqlDialect> = Lazy::new(MysqlDialect::default);

impl MysqlDialect {
    pub fn instance() -> &'static MysqlDialect {
        &INSTANCE
    }
}

impl Dialect for MysqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn capabilities(&self) -> BitFlags<Capability> {
        Capability::AutoGenerateTimestamps | Capability::FetchOffset | Capability::StoredProcedures
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
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

    fn wrap_exists(&self, inner_sql: &str) -> String {
        format!("SELECT EXISTS({inner_sql})")
    }

    fn limit_offset(&self, limit: Option<u32>, offset: Option<u32>) -> String {
        match (limit, offset) {
            (Some(l), Some(o)) => format!(" LIMIT {o}, {l}"),
            (Some(l), None) => format!(" LIMIT {l}"),
            (None, Some(o)) => format!(" LIMIT {o}, 18446744073709551615"),
            (None, None) => String::new(),
        }
    }

    fn data_type_name(&self, ty: SchemaType) -> &'static str {
        match ty {
            SchemaType::Binary => "BLOB",
            SchemaType::Boolean => "TINYINT(1)",
            SchemaType::Date => "DATE",
            SchemaType::DateTime => "DATETIME",
            SchemaType::Timestamp => "TIMESTAMP",
            SchemaType::Decimal => "DECIMAL",
            SchemaType::Float => "DOUBLE",
            SchemaType::Integer => "INT",
            SchemaType::String => "VARCHAR(191)",
            SchemaType::Uuid => "CHAR(36)",
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
        let len = args.get(1).map(|_| "?").unwrap_or("18446744073709551615");
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
            format!("MATCH({}) AGAINST (? IN NATURAL LANGUAGE MODE)", column.name),
            vec![],
        );
        Ok(())
    }
}
