use super::Table;
use crate::value::Value;

/// An `INSERT` statement under construction, built column-by-column like
/// quaint's `Insert::single_into(&table).value("col", val)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: Table,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub returning: Vec<String>,
    pub on_conflict_do_nothing: bool,
}

impl Insert {
    pub fn single_into(table: impl Into<Table>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            rows: vec![Vec::new()],
            returning: Vec::new(),
            on_conflict_do_nothing: false,
        }
    }

    pub fn value(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.push(column.into());
        self.rows[0].push(value.into());
        self
    }

    /// Append another row, reusing the column list established by the
    /// first. Values must be supplied in the same order.
    pub fn row(mut self, values: Vec<Value>) -> Self {
        debug_assert_eq!(values.len(), self.columns.len(), "row width must match column list");
        self.rows.push(values);
        self
    }

    pub fn returning(mut self, columns: Vec<impl Into<String>>) -> Self {
        self.returning = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn on_conflict_do_nothing(mut self) -> Self {
        self.on_conflict_do_nothing = true;
        self
    }
}
