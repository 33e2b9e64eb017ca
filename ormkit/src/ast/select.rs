use super::{ConditionTree, Expression, Join, OrderDefinition, Order, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperation {
    Union,
    UnionAll,
    Intersect,
}

/// A `SELECT` statement under construction. Mirrors quaint's `Select`
/// builder (`Select::default()`, `Select::from_table`, `.value(..)`,
/// `.column(..)`, `.and_where(..)`) with the set-operation and grouping
/// extensions spec.md §4.2/§4.6 call for.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Select {
    pub table: Option<Table>,
    pub columns: Vec<Expression>,
    pub joins: Vec<Join>,
    pub conditions: Option<ConditionTree>,
    pub grouping: Vec<Expression>,
    pub having: Option<ConditionTree>,
    pub ordering: Vec<OrderDefinition>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub distinct: bool,
    pub unions: Vec<(SetOperation, Select)>,
}

impl Select {
    pub fn from_table(table: impl Into<Table>) -> Self {
        Self {
            table: Some(table.into()),
            ..Default::default()
        }
    }

    pub fn value(mut self, expr: impl Into<Expression>) -> Self {
        self.columns.push(expr.into());
        self
    }

    pub fn column(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        let expr = match &self.table {
            Some(t) => t.column(name).into(),
            None => super::Column::new(name).into(),
        };
        self.columns.push(expr);
        self
    }

    pub fn columns<I, C>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        for name in names {
            self = self.column(name);
        }
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn inner_join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn left_join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn and_where(mut self, expr: Expression) -> Self {
        self.conditions = Some(match self.conditions.take() {
            Some(ConditionTree::And(mut exprs)) => {
                exprs.push(expr);
                ConditionTree::And(exprs)
            }
            Some(existing) => ConditionTree::And(vec![existing.into(), expr]),
            None => ConditionTree::single(expr),
        });
        self
    }

    pub fn group_by(mut self, expr: impl Into<Expression>) -> Self {
        self.grouping.push(expr.into());
        self
    }

    pub fn having(mut self, expr: Expression) -> Self {
        self.having = Some(ConditionTree::single(expr));
        self
    }

    pub fn order_by(mut self, expr: impl Into<Expression>) -> Self {
        self.ordering.push(OrderDefinition::new(expr.into(), Order::Asc));
        self
    }

    pub fn order_by_desc(mut self, expr: impl Into<Expression>) -> Self {
        self.ordering.push(OrderDefinition::new(expr.into(), Order::Desc));
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u32) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn union(mut self, other: Select) -> Self {
        self.unions.push((SetOperation::Union, other));
        self
    }

    pub fn intersect(mut self, other: Select) -> Self {
        self.unions.push((SetOperation::Intersect, other));
        self
    }

    /// True when every projected column is a plain column reference (no
    /// function/expression), the precondition for the planner to keep the
    /// projection server-side rather than falling back to client-side
    /// mapping (spec.md §4.4 "Projection").
    pub fn is_plain_column_projection(&self) -> bool {
        self.columns.iter().all(|e| e.is_column().is_some() || matches!(e.kind, super::ExpressionKind::Asterisk))
    }
}

impl Default for SetOperation {
    fn default() -> Self {
        SetOperation::Union
    }
}
