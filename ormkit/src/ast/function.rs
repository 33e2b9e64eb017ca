use super::{Column, Expression};

/// A named filter-function pseudo-call: `fn(col, arg1, ...) OP value`
/// (spec.md §4.4). The planner resolves `name` through the dialect's
/// filter-function registry (`crate::dialect::FilterFunctions`); the
/// function plugin decides how the call renders to SQL.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub column: Column,
    pub args: Vec<Expression>,
}

impl Function {
    pub fn new(name: impl Into<String>, column: Column, args: Vec<Expression>) -> Self {
        Self {
            name: name.into(),
            column,
            args,
        }
    }
}

/// Ergonomic constructors for the filter functions every dialect is
/// expected to support (spec.md §4.3 "Filter-function registry").
pub fn substring(column: impl Into<Column>, start: i64, length: i64) -> Function {
    Function::new(
        "substring",
        column.into(),
        vec![Expression::from(start as i32), Expression::from(length as i32)],
    )
}

pub fn trim(column: impl Into<Column>) -> Function {
    Function::new("trim", column.into(), vec![])
}

pub fn freetext(column: impl Into<Column>, term: &str) -> Function {
    Function::new("freetext", column.into(), vec![Expression::from(term)])
}
