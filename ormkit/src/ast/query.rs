use super::{Delete, Insert, Select, Update};

/// The top-level statement type a `Visitor` renders and a `DataContext`
/// executes. A `Raw` variant backs `ExecuteNonQuery`/`ExecuteScalar`
/// (spec.md §4.5) and the builder's lower-level escape hatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Select(Box<Select>),
    Insert(Box<Insert>),
    Update(Box<Update>),
    Delete(Box<Delete>),
    Raw(RawQuery),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawQuery {
    pub sql: String,
    pub params: Vec<crate::value::Value>,
}

impl From<Select> for Query {
    fn from(s: Select) -> Self {
        Query::Select(Box::new(s))
    }
}

impl From<Insert> for Query {
    fn from(i: Insert) -> Self {
        Query::Insert(Box::new(i))
    }
}

impl From<Update> for Query {
    fn from(u: Update) -> Self {
        Query::Update(Box::new(u))
    }
}

impl From<Delete> for Query {
    fn from(d: Delete) -> Self {
        Query::Delete(Box::new(d))
    }
}
