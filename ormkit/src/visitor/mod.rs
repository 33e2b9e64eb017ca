//! Renders `ast::Query` trees to dialect-specific SQL text plus a
//! positional parameter list (spec.md §4.3/§4.4). This is quaint's
//! `Visitor` trait collapsed into one generic implementation driven by a
//! `&dyn Dialect`, since every per-engine difference this kernel needs is
//! already expressed as a `Dialect` method rather than a trait override.

use crate::ast::*;
use crate::builder::{SqlBuilder, SqlStatement};
use crate::dialect::Dialect;
use crate::error::Error;
use crate::value::{Value, ValueType};

pub struct Visitor<'a> {
    dialect: &'a dyn Dialect,
}

impl<'a> Visitor<'a> {
    pub fn new(dialect: &'a dyn Dialect) -> Self {
        Self { dialect }
    }

    pub fn render(&self, query: &Query) -> Result<SqlStatement, Error> {
        let (sql, params) = match query {
            Query::Select(s) => self.render_select(s)?,
            Query::Insert(i) => self.render_insert(i)?,
            Query::Update(u) => self.render_update(u)?,
            Query::Delete(d) => self.render_delete(d)?,
            Query::Raw(r) => (r.sql.clone(), r.params.clone()),
        };

        let mut builder = SqlBuilder::new();
        let placeholders = sql.matches('?').count();
        debug_assert_eq!(placeholders, params.len());
        builder.append(sql, params);
        let stmt = builder.build()?;
        Ok(SqlStatement {
            sql: self.rewrite_placeholders(&stmt.sql, &stmt.params),
            params: stmt.params,
        })
    }

    /// `SELECT COUNT(*) FROM (<stmt>) Q0`.
    pub fn render_count(&self, query: &Query) -> Result<SqlStatement, Error> {
        let inner = self.render(query)?;
        Ok(SqlStatement {
            sql: self.dialect.wrap_count(&strip_placeholders_back(&inner.sql, self.dialect)),
            params: inner.params,
        })
    }

    pub fn render_exists(&self, query: &Query) -> Result<SqlStatement, Error> {
        let inner = self.render(query)?;
        Ok(SqlStatement {
            sql: self.dialect.wrap_exists(&strip_placeholders_back(&inner.sql, self.dialect)),
            params: inner.params,
        })
    }

    fn rewrite_placeholders(&self, sql: &str, params: &[Value]) -> String {
        let mut out = String::with_capacity(sql.len());
        let mut index = 0usize;

        for ch in sql.chars() {
            if ch == '?' {
                index += 1;
                let placeholder = self.dialect.parameter_placeholder(index);
                let placeholder = match params.get(index - 1) {
                    Some(Value { typed: ValueType::Uuid(_) }) => self.dialect.wrap_uuid_placeholder(placeholder),
                    _ => placeholder,
                };
                out.push_str(&placeholder);
            } else {
                out.push(ch);
            }
        }

        out
    }

    // ---- SELECT ----

    fn render_select(&self, select: &Select) -> Result<(String, Vec<Value>), Error> {
        let mut params = Vec::new();
        let mut sql = String::from("SELECT ");

        if select.distinct {
            sql.push_str("DISTINCT ");
        }

        if select.columns.is_empty() {
            sql.push('*');
        } else {
            let mut first = true;
            for col in &select.columns {
                if !first {
                    sql.push_str(", ");
                }
                first = false;
                let (s, p) = self.render_expression(col)?;
                sql.push_str(&s);
                if let Some(alias) = &col.alias {
                    sql.push_str(&format!(" AS {}", self.dialect.quote_identifier(alias)));
                }
                params.extend(p);
            }
        }

        if let Some(table) = &select.table {
            sql.push_str(" FROM ");
            sql.push_str(&self.render_table(table));
        }

        for join in &select.joins {
            let keyword = match join.kind {
                JoinType::Inner => "INNER JOIN",
                JoinType::Left => "LEFT JOIN",
            };
            sql.push_str(&format!(" {keyword} {} ON ", self.render_table(&join.table)));
            let (s, p) = self.render_condition_tree(&join.conditions)?;
            sql.push_str(&s);
            params.extend(p);
        }

        if let Some(cond) = &select.conditions {
            let (s, p) = self.render_condition_tree(cond)?;
            sql.push_str(" WHERE ");
            sql.push_str(&s);
            params.extend(p);
        }

        if !select.grouping.is_empty() {
            sql.push_str(" GROUP BY ");
            let parts: Result<Vec<String>, Error> = select
                .grouping
                .iter()
                .map(|e| self.render_expression(e).map(|(s, _)| s))
                .collect();
            sql.push_str(&parts?.join(", "));
        }

        if let Some(having) = &select.having {
            let (s, p) = self.render_condition_tree(having)?;
            sql.push_str(" HAVING ");
            sql.push_str(&s);
            params.extend(p);
        }

        if !select.ordering.is_empty() {
            sql.push_str(" ORDER BY ");
            let mut parts = Vec::new();
            for ord in &select.ordering {
                let (s, _) = self.render_expression(&ord.expr)?;
                let dir = match ord.order {
                    Order::Asc => "ASC",
                    Order::Desc => "DESC",
                };
                parts.push(format!("{s} {dir}"));
            }
            sql.push_str(&parts.join(", "));
        }

        sql.push_str(&self.dialect.limit_offset(select.limit, select.offset));

        for (op, other) in &select.unions {
            let keyword = match op {
                SetOperation::Union => "UNION",
                SetOperation::UnionAll => "UNION ALL",
                SetOperation::Intersect => "INTERSECT",
            };
            let (s, p) = self.render_select(other)?;
            sql.push_str(&format!(" {keyword} {s}"));
            params.extend(p);
        }

        Ok((sql, params))
    }

    fn render_table(&self, table: &Table) -> String {
        let mut s = String::new();
        if let Some(db) = &table.database {
            s.push_str(&self.dialect.quote_identifier(db));
            s.push('.');
        }
        s.push_str(&self.dialect.quote_identifier(&table.name));
        if let Some(alias) = &table.alias {
            s.push_str(&format!(" {}", self.dialect.quote_identifier(alias)));
        }
        s
    }

    fn render_column(&self, column: &Column) -> String {
        let mut s = String::new();
        if let Some(table) = &column.table {
            s.push_str(&self.dialect.quote_identifier(table.reference_name()));
            s.push('.');
        }
        s.push_str(&self.dialect.quote_identifier(&column.name));
        s
    }

    fn render_expression(&self, expr: &Expression) -> Result<(String, Vec<Value>), Error> {
        match &expr.kind {
            ExpressionKind::Asterisk => Ok(("*".to_string(), vec![])),
            ExpressionKind::Column(c) => Ok((self.render_column(c), vec![])),
            ExpressionKind::Value(v) => Ok(("?".to_string(), vec![(**v).clone()])),
            ExpressionKind::Row(items) => {
                let mut params = Vec::new();
                let mut parts = Vec::new();
                for item in items {
                    let (s, p) = self.render_expression(item)?;
                    parts.push(s);
                    params.extend(p);
                }
                Ok((format!("({})", parts.join(", ")), params))
            }
            ExpressionKind::ConditionTree(tree) => self.render_condition_tree(tree),
            ExpressionKind::Compare(compare) => self.render_compare(compare),
            ExpressionKind::Function(function) => self.render_function(function),
            ExpressionKind::Lower(inner) => {
                let (s, p) = self.render_expression(inner)?;
                Ok((format!("{}({s})", self.dialect.lower_fn()), p))
            }
        }
    }

    fn render_condition_tree(&self, tree: &ConditionTree) -> Result<(String, Vec<Value>), Error> {
        match tree {
            ConditionTree::And(exprs) => self.join_exprs(exprs, "AND"),
            ConditionTree::Or(exprs) => self.join_exprs(exprs, "OR"),
            ConditionTree::Not(expr) => {
                let (s, p) = self.render_expression(expr)?;
                Ok((format!("NOT ({s})"), p))
            }
            ConditionTree::Single(expr) => self.render_expression(expr),
            ConditionTree::NoCondition => Ok(("1 = 1".to_string(), vec![])),
            ConditionTree::NegativeCondition => Ok(("1 = 0".to_string(), vec![])),
        }
    }

    fn join_exprs(&self, exprs: &[Expression], op: &str) -> Result<(String, Vec<Value>), Error> {
        let mut parts = Vec::new();
        let mut params = Vec::new();
        for e in exprs {
            let (s, p) = self.render_expression(e)?;
            parts.push(format!("({s})"));
            params.extend(p);
        }
        Ok((parts.join(&format!(" {op} ")), params))
    }

    fn render_compare(&self, compare: &Compare) -> Result<(String, Vec<Value>), Error> {
        match compare {
            Compare::Equals(l, r) => self.binary_null_aware(l, r, "=", "IS"),
            Compare::NotEquals(l, r) => self.binary_null_aware(l, r, "<>", "IS NOT"),
            Compare::LessThan(l, r) => self.binary(l, r, "<"),
            Compare::LessThanOrEquals(l, r) => self.binary(l, r, "<="),
            Compare::GreaterThan(l, r) => self.binary(l, r, ">"),
            Compare::GreaterThanOrEquals(l, r) => self.binary(l, r, ">="),
            Compare::Like(l, r) => self.binary(l, r, "LIKE"),
            Compare::NotLike(l, r) => self.binary(l, r, "NOT LIKE"),
            Compare::In(l, values) => {
                let (ls, mut params) = self.render_expression(l)?;
                let mut parts = Vec::new();
                for v in values {
                    let (s, p) = self.render_expression(v)?;
                    parts.push(s);
                    params.extend(p);
                }
                if parts.is_empty() {
                    return Ok(("1 = 0".to_string(), vec![]));
                }
                Ok((format!("{ls} IN ({})", parts.join(", ")), params))
            }
            Compare::NotIn(l, values) => {
                let (ls, mut params) = self.render_expression(l)?;
                let mut parts = Vec::new();
                for v in values {
                    let (s, p) = self.render_expression(v)?;
                    parts.push(s);
                    params.extend(p);
                }
                if parts.is_empty() {
                    return Ok(("1 = 1".to_string(), vec![]));
                }
                Ok((format!("{ls} NOT IN ({})", parts.join(", ")), params))
            }
            Compare::IsNull(e) => {
                let (s, p) = self.render_expression(e)?;
                Ok((format!("{s} IS NULL"), p))
            }
            Compare::IsNotNull(e) => {
                let (s, p) = self.render_expression(e)?;
                Ok((format!("{s} IS NOT NULL"), p))
            }
            Compare::Between(e, low, high) => {
                let (es, mut params) = self.render_expression(e)?;
                let (ls, lp) = self.render_expression(low)?;
                let (hs, hp) = self.render_expression(high)?;
                params.extend(lp);
                params.extend(hp);
                Ok((format!("{es} BETWEEN {ls} AND {hs}"), params))
            }
        }
    }

    fn binary(&self, l: &Expression, r: &Expression, op: &str) -> Result<(String, Vec<Value>), Error> {
        let (ls, mut params) = self.render_expression(l)?;
        let (rs, rp) = self.render_expression(r)?;
        params.extend(rp);
        Ok((format!("{ls} {op} {rs}"), params))
    }

    /// `=`/`<>` against a NULL-valued right-hand side become `IS [NOT]
    /// NULL` (spec.md §4.4 "null comparisons become `IS [NOT] NULL`").
    fn binary_null_aware(
        &self,
        l: &Expression,
        r: &Expression,
        op: &str,
        null_op: &str,
    ) -> Result<(String, Vec<Value>), Error> {
        if let ExpressionKind::Value(v) = &r.kind {
            if v.is_null() {
                let (ls, params) = self.render_expression(l)?;
                return Ok((format!("{ls} {null_op} NULL"), params));
            }
        }
        self.binary(l, r, op)
    }

    fn render_function(&self, function: &Function) -> Result<(String, Vec<Value>), Error> {
        let mut builder = SqlBuilder::new();
        let operand = Expression::asterisk();
        self.dialect
            .filter_functions()
            .resolve(&function.name, self.dialect.name())?
            .render(&mut builder, &function.column, &function.args, &operand, ValueType::Boolean(None))?;

        let mut params = Vec::new();
        for arg in &function.args {
            if let ExpressionKind::Value(v) = &arg.kind {
                params.push((**v).clone());
            }
        }
        if !params.is_empty() {
            builder.append("", params);
        }

        let stmt = builder.build()?;
        Ok((stmt.sql, stmt.params))
    }

    // ---- INSERT ----

    fn render_insert(&self, insert: &Insert) -> Result<(String, Vec<Value>), Error> {
        let columns = insert
            .columns
            .iter()
            .map(|c| self.dialect.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");

        let mut params = Vec::new();
        let mut row_groups = Vec::new();
        for row in &insert.rows {
            row_groups.push(format!("({})", vec!["?"; row.len()].join(", ")));
            params.extend(row.iter().cloned());
        }

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.render_table(&insert.table),
            columns,
            row_groups.join(", ")
        );

        if insert.on_conflict_do_nothing {
            sql.push_str(" ON CONFLICT DO NOTHING");
        }

        if let Some(returning) = self.dialect.returning_clause(&insert.returning) {
            sql.push_str(&returning);
        }

        Ok((sql, params))
    }

    // ---- UPDATE ----

    fn render_update(&self, update: &Update) -> Result<(String, Vec<Value>), Error> {
        let mut params = Vec::new();
        let mut assignments = Vec::new();
        for (col, expr) in &update.assignments {
            let (s, p) = self.render_expression(expr)?;
            assignments.push(format!("{} = {s}", self.dialect.quote_identifier(col)));
            params.extend(p);
        }

        let mut sql = format!(
            "UPDATE {} SET {}",
            self.render_table(&update.table),
            assignments.join(", ")
        );

        if let Some(cond) = &update.conditions {
            let (s, p) = self.render_condition_tree(cond)?;
            sql.push_str(" WHERE ");
            sql.push_str(&s);
            params.extend(p);
        }

        Ok((sql, params))
    }

    // ---- DELETE ----

    fn render_delete(&self, delete: &Delete) -> Result<(String, Vec<Value>), Error> {
        let mut sql = format!("DELETE FROM {}", self.render_table(&delete.table));
        let mut params = Vec::new();

        if let Some(cond) = &delete.conditions {
            let (s, p) = self.render_condition_tree(cond)?;
            sql.push_str(" WHERE ");
            sql.push_str(&s);
            params.extend(p);
        }

        Ok((sql, params))
    }
}

/// `render_count`/`render_exists` wrap an already-placeholder-rewritten
/// statement, whose `?` markers are gone; this restores plain `?` markers
/// so the wrapping dialect methods (which only care about the inner SQL
/// shape) compose correctly when nested inside a further `render()` call
/// is not needed. In practice the wrapped SQL is final and not re-rendered,
/// so this simply returns the text unchanged — kept as a named seam so a
/// future caller that *does* need to re-enter the placeholder rewrite
/// pipeline has an obvious place to do it.
fn strip_placeholders_back(sql: &str, _dialect: &dyn Dialect) -> String {
    sql.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Comparable;
    use crate::dialect::{PostgresDialect, SqliteDialect};

    #[test]
    fn simple_equality_select() {
        let select = Select::from_table("sec_pol_tbl")
            .column("pol_id")
            .column("pol_name")
            .and_where(Column::new("pol_name").equals("Login"));

        let visitor = Visitor::new(PostgresDialect::instance());
        let stmt = visitor.render(&select.into()).unwrap();

        assert_eq!(
            stmt.sql,
            "SELECT \"sec_pol_tbl\".\"pol_id\", \"sec_pol_tbl\".\"pol_name\" FROM \"sec_pol_tbl\" WHERE \"pol_name\" = $1"
        );
        assert_eq!(stmt.params, vec![Value::text("Login")]);
    }

    #[test]
    fn null_equality_becomes_is_null() {
        let select = Select::from_table("t").and_where(Column::new("deleted_at").equals(Value::null_datetime()));
        let visitor = Visitor::new(SqliteDialect::instance());
        let stmt = visitor.render(&select.into()).unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM \"t\" WHERE \"deleted_at\" IS NULL");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn insert_renders_positional_params() {
        let insert = Insert::single_into("foo").value("name", "a");
        let visitor = Visitor::new(SqliteDialect::instance());
        let stmt = visitor.render(&insert.into()).unwrap();
        assert_eq!(stmt.sql, "INSERT INTO \"foo\" (\"name\") VALUES (?)");
        assert_eq!(stmt.params, vec![Value::text("a")]);
    }

    #[test]
    fn deterministic_rendering_is_byte_identical() {
        let build = || {
            Select::from_table("t")
                .column("id")
                .and_where(Column::new("id").greater_than(1))
        };

        let visitor = Visitor::new(PostgresDialect::instance());
        let a = visitor.render(&build().into()).unwrap();
        let b = visitor.render(&build().into()).unwrap();
        assert_eq!(a, b);
    }
}
