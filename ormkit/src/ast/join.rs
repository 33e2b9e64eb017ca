use super::{ConditionTree, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

/// A single join clause. `conditions` is the `ON` clause; the planner
/// appends any declared join-filter (spec.md §3 `JoinFilter`) into it as
/// `AND <jf-column> = <jf-value>` at plan time.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinType,
    pub table: Table,
    pub conditions: ConditionTree,
}

impl Join {
    pub fn inner(table: impl Into<Table>, conditions: ConditionTree) -> Self {
        Self {
            kind: JoinType::Inner,
            table: table.into(),
            conditions,
        }
    }

    pub fn left(table: impl Into<Table>, conditions: ConditionTree) -> Self {
        Self {
            kind: JoinType::Left,
            table: table.into(),
            conditions,
        }
    }
}
