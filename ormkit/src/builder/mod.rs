//! The SQL statement builder (spec.md §4.2): an ordered accumulator of
//! text fragments and bound parameter values, independent of any single
//! dialect. The `Visitor` uses this internally while walking an `ast`
//! tree; `DataContext`'s raw escape hatches (`ExecuteNonQuery`,
//! `ExecuteScalar`) and hand-written SQL use it directly.

use crate::error::{Error, ErrorKind};
use crate::value::Value;

#[derive(Debug, Clone)]
struct Fragment {
    sql: String,
    params: Vec<Value>,
}

/// A mutable builder; `build()` flattens it into an immutable
/// `SqlStatement`.
#[derive(Debug, Clone, Default)]
pub struct SqlBuilder {
    fragments: Vec<Fragment>,
    has_where: bool,
}

/// The flattened, immutable result of a build: final SQL text plus the
/// positional parameter list in the order they appear in the text.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl SqlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a fragment with its positional parameters. Each `?` in
    /// `text` must have a corresponding entry in `params`, verified at
    /// `build()` time (spec.md §4.2 "the builder validates count matches").
    pub fn append(&mut self, text: impl Into<String>, params: Vec<Value>) -> &mut Self {
        self.fragments.push(Fragment {
            sql: text.into(),
            params,
        });
        self
    }

    /// Appends a nested builder; its fragments and parameters are
    /// concatenated in order.
    pub fn append_builder(&mut self, other: SqlBuilder) -> &mut Self {
        self.fragments.extend(other.fragments);
        self.has_where = self.has_where || other.has_where;
        self
    }

    /// Appends `WHERE <predicate>`, or `AND <predicate>` if a `WHERE` has
    /// already been opened at this builder's top level. The predicate is
    /// parenthesised.
    pub fn where_clause(&mut self, predicate: impl Into<String>, params: Vec<Value>) -> &mut Self {
        let keyword = if self.has_where { " AND " } else { " WHERE " };
        self.has_where = true;
        self.append(format!("{keyword}({})", predicate.into()), params)
    }

    pub fn and(&mut self, predicate: impl Into<String>, params: Vec<Value>) -> &mut Self {
        self.append(format!(" AND ({})", predicate.into()), params)
    }

    pub fn or(&mut self, predicate: impl Into<String>, params: Vec<Value>) -> &mut Self {
        self.append(format!(" OR ({})", predicate.into()), params)
    }

    pub fn order_by(&mut self, clause: impl Into<String>) -> &mut Self {
        self.append(format!(" ORDER BY {}", clause.into()), vec![])
    }

    pub fn group_by(&mut self, clause: impl Into<String>) -> &mut Self {
        self.append(format!(" GROUP BY {}", clause.into()), vec![])
    }

    pub fn limit(&mut self, n: u32) -> &mut Self {
        self.append(format!(" LIMIT {n}"), vec![])
    }

    pub fn offset(&mut self, n: u32) -> &mut Self {
        self.append(format!(" OFFSET {n}"), vec![])
    }

    /// Flattens all fragments into a single statement, normalises
    /// contiguous whitespace, and verifies the text's placeholder count
    /// matches the bound parameter count.
    pub fn build(self) -> Result<SqlStatement, Error> {
        let mut sql = String::new();
        let mut params = Vec::new();

        for fragment in self.fragments {
            if !sql.is_empty() && !fragment.sql.starts_with(' ') && !sql.ends_with(' ') && !sql.ends_with('(') {
                sql.push(' ');
            }
            sql.push_str(&fragment.sql);
            params.extend(fragment.params);
        }

        let sql = normalize_whitespace(&sql);
        let placeholder_count = sql.matches('?').count();

        if placeholder_count != params.len() {
            return Err(ErrorKind::ParameterCountMismatch {
                expected: placeholder_count,
                actual: params.len(),
            }
            .into());
        }

        Ok(SqlStatement { sql, params })
    }
}

fn normalize_whitespace(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut last_was_space = false;

    for ch in sql.trim().chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn where_then_and_accumulates_with_parens() {
        let mut b = SqlBuilder::new();
        b.append("SELECT * FROM t", vec![]);
        b.where_clause("a = ?", vec![Value::int32(1)]);
        b.and("b = ?", vec![Value::int32(2)]);

        let stmt = b.build().unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM t WHERE (a = ?) AND (b = ?)");
        assert_eq!(stmt.params, vec![Value::int32(1), Value::int32(2)]);
    }

    #[test]
    fn mismatched_parameter_count_is_rejected() {
        let mut b = SqlBuilder::new();
        b.append("SELECT * FROM t WHERE a = ?", vec![]);
        assert!(matches!(b.build().unwrap_err().kind(), ErrorKind::ParameterCountMismatch { .. }));
    }

    #[test]
    fn nested_builder_append_concatenates_params() {
        let mut inner = SqlBuilder::new();
        inner.append("x = ?", vec![Value::int32(9)]);

        let mut outer = SqlBuilder::new();
        outer.append("SELECT * FROM t WHERE", vec![]);
        outer.append_builder(inner);

        let stmt = outer.build().unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM t WHERE x = ?");
        assert_eq!(stmt.params, vec![Value::int32(9)]);
    }
}
