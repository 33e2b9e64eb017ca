use super::{ConditionTree, Expression, Table};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: Table,
    pub assignments: Vec<(String, Expression)>,
    pub conditions: Option<ConditionTree>,
}

impl Update {
    pub fn table(table: impl Into<Table>) -> Self {
        Self {
            table: table.into(),
            assignments: Vec::new(),
            conditions: None,
        }
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assignments.push((column.into(), Expression::from(value.into())));
        self
    }

    pub fn and_where(mut self, expr: Expression) -> Self {
        self.conditions = Some(match self.conditions.take() {
            Some(existing) => existing.and(expr).into(),
            None => ConditionTree::single(expr),
        });
        self
    }
}

impl From<Expression> for ConditionTree {
    fn from(expr: Expression) -> Self {
        match expr.kind {
            super::ExpressionKind::ConditionTree(tree) => *tree,
            _ => ConditionTree::single(expr),
        }
    }
}
