use super::{ConditionTree, Expression, Table};

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub table: Table,
    pub conditions: Option<ConditionTree>,
}

impl Delete {
    pub fn from_table(table: impl Into<Table>) -> Self {
        Self {
            table: table.into(),
            conditions: None,
        }
    }

    pub fn and_where(mut self, expr: Expression) -> Self {
        self.conditions = Some(match self.conditions.take() {
            Some(existing) => existing.and(expr).into(),
            None => ConditionTree::single(expr),
        });
        self
    }
}
