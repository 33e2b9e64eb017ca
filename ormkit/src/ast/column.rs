use super::{Compare, Expression, ExpressionKind, Table};
use crate::value::Value;

/// A column reference, optionally table-qualified and aliased.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub table: Option<Table>,
    pub alias: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            alias: None,
        }
    }

    pub fn table(mut self, table: impl Into<Table>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

impl From<&str> for Column {
    fn from(name: &str) -> Self {
        Column::new(name)
    }
}

impl From<String> for Column {
    fn from(name: String) -> Self {
        Column::new(name)
    }
}

impl From<(&str, &str)> for Column {
    fn from((table, name): (&str, &str)) -> Self {
        Column::new(name).table(Table::new(table))
    }
}

impl From<Column> for Expression {
    fn from(c: Column) -> Self {
        Expression::new(ExpressionKind::Column(Box::new(c)))
    }
}

/// Builder trait for predicates, implemented for anything convertible into
/// an `Expression` (bare columns, qualified columns, sub-expressions).
///
/// Mirrors quaint's `Comparable` trait: every comparison returns a fresh
/// `Expression` wrapping a `Compare`, ready to be combined with `.and()` /
/// `.or()` or handed to `Select::and_where`.
pub trait Comparable {
    fn equals<T: Into<Expression>>(self, other: T) -> Expression;
    fn not_equals<T: Into<Expression>>(self, other: T) -> Expression;
    fn less_than<T: Into<Expression>>(self, other: T) -> Expression;
    fn less_than_or_equals<T: Into<Expression>>(self, other: T) -> Expression;
    fn greater_than<T: Into<Expression>>(self, other: T) -> Expression;
    fn greater_than_or_equals<T: Into<Expression>>(self, other: T) -> Expression;
    fn like<T: Into<Expression>>(self, other: T) -> Expression;
    fn not_like<T: Into<Expression>>(self, other: T) -> Expression;
    fn in_selection<T: Into<Expression>>(self, other: Vec<T>) -> Expression;
    fn not_in_selection<T: Into<Expression>>(self, other: Vec<T>) -> Expression;
    fn is_null(self) -> Expression;
    fn is_not_null(self) -> Expression;
    fn between<T: Into<Expression>>(self, low: T, high: T) -> Expression;
}

impl<C> Comparable for C
where
    C: Into<Expression>,
{
    fn equals<T: Into<Expression>>(self, other: T) -> Expression {
        Compare::Equals(Box::new(self.into()), Box::new(other.into())).into()
    }

    fn not_equals<T: Into<Expression>>(self, other: T) -> Expression {
        Compare::NotEquals(Box::new(self.into()), Box::new(other.into())).into()
    }

    fn less_than<T: Into<Expression>>(self, other: T) -> Expression {
        Compare::LessThan(Box::new(self.into()), Box::new(other.into())).into()
    }

    fn less_than_or_equals<T: Into<Expression>>(self, other: T) -> Expression {
        Compare::LessThanOrEquals(Box::new(self.into()), Box::new(other.into())).into()
    }

    fn greater_than<T: Into<Expression>>(self, other: T) -> Expression {
        Compare::GreaterThan(Box::new(self.into()), Box::new(other.into())).into()
    }

    fn greater_than_or_equals<T: Into<Expression>>(self, other: T) -> Expression {
        Compare::GreaterThanOrEquals(Box::new(self.into()), Box::new(other.into())).into()
    }

    fn like<T: Into<Expression>>(self, other: T) -> Expression {
        Compare::Like(Box::new(self.into()), Box::new(other.into())).into()
    }

    fn not_like<T: Into<Expression>>(self, other: T) -> Expression {
        Compare::NotLike(Box::new(self.into()), Box::new(other.into())).into()
    }

    fn in_selection<T: Into<Expression>>(self, other: Vec<T>) -> Expression {
        let values: Vec<Expression> = other.into_iter().map(Into::into).collect();
        Compare::In(Box::new(self.into()), values).into()
    }

    fn not_in_selection<T: Into<Expression>>(self, other: Vec<T>) -> Expression {
        let values: Vec<Expression> = other.into_iter().map(Into::into).collect();
        Compare::NotIn(Box::new(self.into()), values).into()
    }

    fn is_null(self) -> Expression {
        Compare::IsNull(Box::new(self.into())).into()
    }

    fn is_not_null(self) -> Expression {
        Compare::IsNotNull(Box::new(self.into())).into()
    }

    fn between<T: Into<Expression>>(self, low: T, high: T) -> Expression {
        Compare::Between(Box::new(self.into()), Box::new(low.into()), Box::new(high.into())).into()
    }
}

impl From<Value> for Expression {
    fn from(v: Value) -> Self {
        Expression::new(ExpressionKind::Value(Box::new(v)))
    }
}

impl From<&str> for Expression {
    fn from(v: &str) -> Self {
        Value::text(v).into()
    }
}

impl From<i32> for Expression {
    fn from(v: i32) -> Self {
        Value::int32(v).into()
    }
}

impl From<i64> for Expression {
    fn from(v: i64) -> Self {
        Value::int64(v).into()
    }
}
