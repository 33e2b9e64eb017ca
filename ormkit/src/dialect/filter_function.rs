use crate::ast::{Column, Expression};
use crate::builder::SqlBuilder;
use crate::error::{Error, ErrorKind};
use crate::value::ValueType;
use std::collections::HashMap;

/// A named filter-function plugin (spec.md §4.3): given the in-progress
/// builder, the target column, the call's argument values, the comparison
/// operand and its declared type, appends the function-specific SQL.
///
/// `createSqlStatement` in spec.md §6 is `render` here.
pub trait FilterFunction: Send + Sync {
    fn render(
        &self,
        builder: &mut SqlBuilder,
        column: &Column,
        args: &[Expression],
        operand: &Expression,
        operand_type: ValueType,
    ) -> Result<(), Error>;
}

/// Registered by `(providerInvariant, functionName)` per spec.md §6; here
/// keyed just by name since one registry instance belongs to exactly one
/// dialect already.
#[derive(Default)]
pub struct FilterFunctionRegistry {
    functions: HashMap<String, Box<dyn FilterFunction>>,
}

impl FilterFunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, f: Box<dyn FilterFunction>) -> &mut Self {
        self.functions.insert(name.into(), f);
        self
    }

    pub fn resolve(&self, name: &str, dialect_name: &'static str) -> Result<&dyn FilterFunction, Error> {
        self.functions
            .get(name)
            .map(|f| f.as_ref())
            .ok_or_else(|| {
                ErrorKind::UnsupportedFilter {
                    dialect: dialect_name,
                    name: name.to_string(),
                }
                .into()
            })
    }
}
