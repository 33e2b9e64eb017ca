use super::{Column, Function};
use crate::value::Value;

/// The recursive predicate/projection expression tree the planner and
/// visitor operate on.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Column(Box<Column>),
    Value(Box<Value>),
    Row(Vec<Expression>),
    ConditionTree(Box<ConditionTree>),
    Compare(Box<Compare>),
    Function(Box<Function>),
    /// `LOWER(inner)` (spec.md §4.4 "ignore-case columns use
    /// `LOWER(col) = LOWER(?)`"). Kept as its own variant rather than
    /// folded into `Function` since it wraps an arbitrary expression
    /// (column or bound value), not just a column.
    Lower(Box<Expression>),
    Asterisk,
}

impl Expression {
    pub fn new(kind: ExpressionKind) -> Self {
        Self { kind, alias: None }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn asterisk() -> Self {
        Expression::new(ExpressionKind::Asterisk)
    }

    pub fn and(self, other: Expression) -> Expression {
        ConditionTree::And(vec![self, other]).into()
    }

    pub fn or(self, other: Expression) -> Expression {
        ConditionTree::Or(vec![self, other]).into()
    }

    pub fn not(self) -> Expression {
        ConditionTree::Not(Box::new(self)).into()
    }

    pub fn is_column(&self) -> Option<&Column> {
        match &self.kind {
            ExpressionKind::Column(c) => Some(c),
            _ => None,
        }
    }

    pub fn lower(self) -> Expression {
        Expression::new(ExpressionKind::Lower(Box::new(self)))
    }
}

impl From<ConditionTree> for Expression {
    fn from(tree: ConditionTree) -> Self {
        Expression::new(ExpressionKind::ConditionTree(Box::new(tree)))
    }
}

impl From<Compare> for Expression {
    fn from(compare: Compare) -> Self {
        Expression::new(ExpressionKind::Compare(Box::new(compare)))
    }
}

impl From<Function> for Expression {
    fn from(f: Function) -> Self {
        Expression::new(ExpressionKind::Function(Box::new(f)))
    }
}

/// Binary/unary comparisons produced by `Comparable`.
#[derive(Debug, Clone, PartialEq)]
pub enum Compare {
    Equals(Box<Expression>, Box<Expression>),
    NotEquals(Box<Expression>, Box<Expression>),
    LessThan(Box<Expression>, Box<Expression>),
    LessThanOrEquals(Box<Expression>, Box<Expression>),
    GreaterThan(Box<Expression>, Box<Expression>),
    GreaterThanOrEquals(Box<Expression>, Box<Expression>),
    Like(Box<Expression>, Box<Expression>),
    NotLike(Box<Expression>, Box<Expression>),
    In(Box<Expression>, Vec<Expression>),
    NotIn(Box<Expression>, Vec<Expression>),
    IsNull(Box<Expression>),
    IsNotNull(Box<Expression>),
    Between(Box<Expression>, Box<Expression>, Box<Expression>),
}

/// Boolean combination of predicates. `NoCondition`/`NegativeCondition` are
/// the builder's identity elements for an empty `WHERE` (matches
/// everything / matches nothing), used when a predicate list collapses to
/// empty during planning (e.g. an `Any()` over no associative rows).
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionTree {
    And(Vec<Expression>),
    Or(Vec<Expression>),
    Not(Box<Expression>),
    Single(Box<Expression>),
    NoCondition,
    NegativeCondition,
}

impl ConditionTree {
    pub fn single(expr: Expression) -> Self {
        ConditionTree::Single(Box::new(expr))
    }

    pub fn and(self, other: Expression) -> Expression {
        match self {
            ConditionTree::And(mut exprs) => {
                exprs.push(other);
                ConditionTree::And(exprs).into()
            }
            other_tree => ConditionTree::And(vec![other_tree.into(), other]).into(),
        }
    }
}
