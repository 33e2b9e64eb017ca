//! Result Set (spec.md §4.6): the lazily-built query surface returned by
//! `MappedQueryProvider` — nothing runs until a terminal operation
//! (`count`/`any`/`to_vec`/`first`/...) is called.
//!
//! Scope note: chain methods here operate over a single mapped type `T`.
//! Composite (joined) projections are assembled one level down, in
//! `planner`/`provider`, which hand a pre-built `Select` (already carrying
//! whatever joins it needs) to `ResultSet::from_select` — the chain
//! methods added afterward (`where_`, `skip`, `take`, ...) still apply to
//! that joined statement exactly as they would to a bare one.

use std::marker::PhantomData;

use crate::ast::{Column, Compare, ConditionTree, Expression, ExpressionKind, Select, Table};
use crate::connector::TransactionCapable;
use crate::context::DataContext;
use crate::encryption::{EncryptionAdapter, EncryptionMode};
use crate::error::{ErrorKind, Result};
use crate::mapping::{ColumnMapping, MappingRegistry, Record, TableMapping};
use crate::planner::Planner;
use crate::stateful::StatefulQuerySet;
use crate::value::Value;

/// Walks `expr` for any `Compare` touching an `application_encrypted`
/// column of `mapping` and rejects it unless it's a bare equality
/// (spec.md §4.4/§4.8, enforced here since `ResultSet::where_` is the one
/// place a caller-built predicate enters the pipeline).
fn validate_encrypted_predicates(expr: &Expression, mapping: &TableMapping) -> Result<()> {
    fn column_name(expr: &Expression) -> Option<&str> {
        match &expr.kind {
            ExpressionKind::Column(c) => Some(c.name.as_str()),
            _ => None,
        }
    }

    fn check_pair(left: &Expression, right: &Expression, is_equality: bool, mapping: &TableMapping) -> Result<()> {
        for side in [left, right] {
            if let Some(name) = column_name(side) {
                if let Some(col) = mapping.column(name) {
                    Planner::validate_encrypted_predicate(col, is_equality, true)?;
                }
            }
        }
        Ok(())
    }

    match &expr.kind {
        ExpressionKind::Compare(cmp) => match cmp.as_ref() {
            Compare::Equals(l, r) => check_pair(l, r, true, mapping),
            Compare::NotEquals(l, r)
            | Compare::LessThan(l, r)
            | Compare::LessThanOrEquals(l, r)
            | Compare::GreaterThan(l, r)
            | Compare::GreaterThanOrEquals(l, r)
            | Compare::Like(l, r)
            | Compare::NotLike(l, r) => check_pair(l, r, false, mapping),
            Compare::In(col, _) | Compare::NotIn(col, _) | Compare::IsNull(col) | Compare::IsNotNull(col) => {
                check_pair(col, col, false, mapping)
            }
            Compare::Between(col, _, _) => check_pair(col, col, false, mapping),
        },
        ExpressionKind::ConditionTree(tree) => match tree.as_ref() {
            crate::ast::ConditionTree::And(exprs) | crate::ast::ConditionTree::Or(exprs) => {
                exprs.iter().try_for_each(|e| validate_encrypted_predicates(e, mapping))
            }
            crate::ast::ConditionTree::Not(inner) | crate::ast::ConditionTree::Single(inner) => {
                validate_encrypted_predicates(inner, mapping)
            }
            crate::ast::ConditionTree::NoCondition | crate::ast::ConditionTree::NegativeCondition => Ok(()),
        },
        _ => Ok(()),
    }
}

/// Seals any literal compared for equality against an `application_encrypted`
/// column so the predicate actually matches the ciphertext stored on disk
/// (spec.md §4.8). A no-op when no adapter is configured — the column then
/// holds plaintext, so the literal needs no transformation either.
fn encrypt_predicate_literals(
    expr: Expression,
    mapping: &TableMapping,
    encryption: Option<&EncryptionAdapter>,
) -> Result<Expression> {
    let Some(adapter) = encryption else {
        return Ok(expr);
    };

    let Expression { kind, alias } = expr;
    let kind = match kind {
        ExpressionKind::Compare(cmp) => {
            let cmp = match *cmp {
                Compare::Equals(l, r) => {
                    let (l, r) = encrypt_pair(*l, *r, mapping, adapter)?;
                    Compare::Equals(Box::new(l), Box::new(r))
                }
                other => other,
            };
            ExpressionKind::Compare(Box::new(cmp))
        }
        ExpressionKind::ConditionTree(tree) => {
            let tree = match *tree {
                ConditionTree::And(exprs) => ConditionTree::And(
                    exprs.into_iter().map(|e| encrypt_predicate_literals(e, mapping, encryption)).collect::<Result<_>>()?,
                ),
                ConditionTree::Or(exprs) => ConditionTree::Or(
                    exprs.into_iter().map(|e| encrypt_predicate_literals(e, mapping, encryption)).collect::<Result<_>>()?,
                ),
                ConditionTree::Not(inner) => {
                    ConditionTree::Not(Box::new(encrypt_predicate_literals(*inner, mapping, encryption)?))
                }
                ConditionTree::Single(inner) => {
                    ConditionTree::Single(Box::new(encrypt_predicate_literals(*inner, mapping, encryption)?))
                }
                other => other,
            };
            ExpressionKind::ConditionTree(Box::new(tree))
        }
        other => other,
    };
    Ok(Expression { kind, alias })
}

fn encrypt_pair(
    left: Expression,
    right: Expression,
    mapping: &TableMapping,
    adapter: &EncryptionAdapter,
) -> Result<(Expression, Expression)> {
    fn encrypted_column<'a>(e: &Expression, mapping: &'a TableMapping) -> Option<&'a ColumnMapping> {
        match &e.kind {
            ExpressionKind::Column(c) => mapping.column(&c.name).filter(|col| col.application_encrypted),
            _ => None,
        }
    }

    if encrypted_column(&left, mapping).is_some() {
        Ok((left, encrypt_value_expr(right, adapter)?))
    } else if encrypted_column(&right, mapping).is_some() {
        Ok((encrypt_value_expr(left, adapter)?, right))
    } else {
        Ok((left, right))
    }
}

fn encrypt_value_expr(expr: Expression, adapter: &EncryptionAdapter) -> Result<Expression> {
    let Expression { kind, alias } = expr;
    let kind = match kind {
        ExpressionKind::Value(v) => {
            let sealed = adapter.bind_for_query(EncryptionMode::Deterministic, &v)?;
            ExpressionKind::Value(Box::new(sealed))
        }
        other => other,
    };
    Ok(Expression { kind, alias })
}

pub struct ResultSet<'a, T: Record, C: TransactionCapable> {
    context: &'a mut DataContext<C>,
    select: Select,
    alias: String,
    _marker: PhantomData<T>,
}

impl<'a, T: Record, C: TransactionCapable> ResultSet<'a, T, C> {
    /// The default projection over `T`'s own table, secrets excluded
    /// (spec.md §4.1 `columnsFor`).
    pub fn new(context: &'a mut DataContext<C>) -> Self {
        let mapping = MappingRegistry::get::<T>();
        let alias = "t0".to_string();
        let select = Planner::base_select(&mapping, alias.clone(), false);
        Self { context, select, alias, _marker: PhantomData }
    }

    /// Wraps an already-built `Select` (e.g. one carrying joins from
    /// `Planner::apply_always_joins`) under the same chain API.
    pub fn from_select(context: &'a mut DataContext<C>, select: Select, alias: impl Into<String>) -> Self {
        Self { context, select, alias: alias.into(), _marker: PhantomData }
    }

    fn table_column(&self, name: impl Into<String>) -> Column {
        let mapping = MappingRegistry::get::<T>();
        Table::new(mapping.table.clone()).alias(self.alias.clone()).column(name)
    }

    /// `Where` (spec.md §4.6). Rejects a non-equality predicate against
    /// an `application_encrypted` column with `UnsupportedEncryptedPredicate`
    /// rather than silently accepting a query that could never match.
    pub fn where_(mut self, predicate: Expression) -> Result<Self> {
        let mapping = MappingRegistry::get::<T>();
        validate_encrypted_predicates(&predicate, &mapping)?;
        let predicate = encrypt_predicate_literals(predicate, &mapping, self.context.encryption_adapter())?;
        self.select = self.select.and_where(predicate);
        Ok(self)
    }

    /// `OrderBy` (spec.md §4.6), by `T`'s own column.
    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        let col = self.table_column(column);
        self.select = Planner::replace_order(self.select, col, false);
        self
    }

    /// `OrderByDescending` (spec.md §4.6).
    pub fn order_by_descending(mut self, column: impl Into<String>) -> Self {
        let col = self.table_column(column);
        self.select = Planner::replace_order(self.select, col, true);
        self
    }

    fn ensure_stable(&mut self) {
        let mapping = MappingRegistry::get::<T>();
        let select = std::mem::take(&mut self.select);
        self.select = Planner::ensure_stable_order(select, &mapping, &self.alias);
    }

    /// `Skip` (spec.md §4.6, §9c: adds a deterministic order when none
    /// was given).
    pub fn skip(mut self, n: u32) -> Self {
        self.select = self.select.offset(n);
        self.ensure_stable();
        self
    }

    /// `Take` (spec.md §4.6).
    pub fn take(mut self, n: u32) -> Self {
        self.select = self.select.limit(n);
        self.ensure_stable();
        self
    }

    /// `Union` (spec.md §4.6).
    pub fn union(mut self, other: ResultSet<'_, T, C>) -> Self {
        self.select = self.select.union(other.select);
        self
    }

    /// `Intersect` (spec.md §4.6).
    pub fn intersect(mut self, other: ResultSet<'_, T, C>) -> Self {
        self.select = self.select.intersect(other.select);
        self
    }

    /// `Count` (spec.md §4.6).
    pub fn count(self) -> Result<i64> {
        self.context.count(self.select)
    }

    /// `Any` (spec.md §4.6).
    pub fn any(self) -> Result<bool> {
        self.context.any(self.select)
    }

    /// Materialises every matching row into `T` immediately — the escape
    /// from laziness every other terminal operation goes through.
    pub fn to_vec(self) -> Result<Vec<T>> {
        self.context.query(self.select)
    }

    /// `First` (spec.md §4.6): errors with `NoRows` on an empty set.
    pub fn first(self) -> Result<T> {
        let select = self.select.limit(1);
        let mut rows = self.context.query::<T>(select)?;
        rows.pop().ok_or_else(|| ErrorKind::NoRows.into())
    }

    /// `FirstOrDefault` (spec.md §4.6).
    pub fn first_or_default(self) -> Result<Option<T>> {
        let select = self.select.limit(1);
        let mut rows = self.context.query::<T>(select)?;
        Ok(rows.pop())
    }

    /// `Single` (spec.md §4.6): errors with `MoreThanOne` if more than
    /// one row matched.
    pub fn single(self) -> Result<T> {
        let select = self.select.limit(2);
        let mut rows = self.context.query::<T>(select)?;
        match rows.len() {
            0 => Err(ErrorKind::NoRows.into()),
            1 => Ok(rows.remove(0)),
            _ => Err(ErrorKind::MoreThanOne.into()),
        }
    }

    /// `SingleOrDefault` (spec.md §4.6).
    pub fn single_or_default(self) -> Result<Option<T>> {
        let select = self.select.limit(2);
        let mut rows = self.context.query::<T>(select)?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(Some(rows.remove(0))),
            _ => Err(ErrorKind::MoreThanOne.into()),
        }
    }

    /// `Keys` (spec.md §4.6): the primary key column's values only,
    /// without materialising full records.
    pub fn keys(mut self) -> Result<Vec<Value>> {
        let mapping = MappingRegistry::get::<T>();
        let pk = mapping.primary_key_columns().into_iter().next().ok_or_else(|| {
            crate::error::ErrorKind::MappingError {
                reason: format!("`{}` has no primary key column", mapping.type_name),
            }
        })?;
        self.select.columns = vec![self.table_column(pk.physical_name.clone()).into()];
        self.context.scalars(self.select)
    }

    /// `AsStateful` (spec.md §4.6): freezes the query built so far to SQL
    /// text, detaching it from this context.
    pub fn as_stateful(self, id: impl Into<String>) -> Result<StatefulQuerySet<T>> {
        let stmt = self.context.render_select(self.select)?;
        Ok(StatefulQuerySet::new(id, stmt.sql, stmt.params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Comparable;
    use crate::connector::sqlite::SqliteConnection;
    use crate::dialect::SchemaType;
    use crate::mapping::{ColumnMapping, Mapped, TableMapping};

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Person {
        id: i64,
        name: String,
    }

    impl Mapped for Person {
        fn describe() -> TableMapping {
            TableMapping::new(
                "Person",
                "person",
                vec![
                    ColumnMapping { primary_key: true, auto_generated: true, ..ColumnMapping::plain("id", SchemaType::Integer) },
                    ColumnMapping::plain("name", SchemaType::String),
                ],
            )
        }
    }

    impl Record for Person {
        fn column_value(&self, physical_name: &str) -> Value {
            match physical_name {
                "id" => Value::from(self.id),
                "name" => Value::from(self.name.clone()),
                other => panic!("no such column `{other}`"),
            }
        }

        fn set_column_value(&mut self, physical_name: &str, value: Value) -> Result<()> {
            match physical_name {
                "id" => {
                    self.id = value.try_into()?;
                    Ok(())
                }
                "name" => {
                    self.name = value.try_into()?;
                    Ok(())
                }
                other => Err(ErrorKind::MappingError { reason: format!("no such column `{other}`") }.into()),
            }
        }
    }

    fn seeded(names: &[&str]) -> DataContext<SqliteConnection> {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute_raw("CREATE TABLE person (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT)", vec![]).unwrap();
        let mut ctx = DataContext::open(conn);
        for name in names {
            let mut p = Person { id: 0, name: name.to_string() };
            ctx.insert(&mut p).unwrap();
        }
        ctx
    }

    #[test]
    fn skip_take_is_stable_across_a_twenty_row_table() {
        let names: Vec<String> = (0..20).map(|i| format!("p{i}")).collect();
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut ctx = seeded(&name_refs);

        let page1: Vec<Person> = ResultSet::new(&mut ctx).skip(0).take(5).to_vec().unwrap();
        let page2: Vec<Person> = ResultSet::new(&mut ctx).skip(0).take(5).to_vec().unwrap();
        assert_eq!(page1, page2);
    }

    #[test]
    fn first_differs_with_distinct_ordering() {
        let mut ctx = seeded(&["charlie", "alice", "bob"]);

        let asc = ResultSet::<Person, _>::new(&mut ctx).order_by("name").first().unwrap();
        assert_eq!(asc.name, "alice");

        let desc = ResultSet::<Person, _>::new(&mut ctx).order_by_descending("name").first().unwrap();
        assert_eq!(desc.name, "charlie");
    }

    #[test]
    fn where_filters_rows() {
        let mut ctx = seeded(&["alice", "bob"]);
        let found = ResultSet::<Person, _>::new(&mut ctx)
            .where_(Column::new("name").equals("bob"))
            .unwrap()
            .single()
            .unwrap();
        assert_eq!(found.name, "bob");
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct UserAccount {
        id: i64,
        password_hash: String,
    }

    impl Mapped for UserAccount {
        fn describe() -> TableMapping {
            TableMapping::new(
                "UserAccount",
                "user_account",
                vec![
                    ColumnMapping { primary_key: true, auto_generated: true, ..ColumnMapping::plain("id", SchemaType::Integer) },
                    ColumnMapping { application_encrypted: true, ..ColumnMapping::plain("password_hash", SchemaType::String) },
                ],
            )
        }
    }

    impl Record for UserAccount {
        fn column_value(&self, physical_name: &str) -> Value {
            match physical_name {
                "id" => Value::from(self.id),
                "password_hash" => Value::from(self.password_hash.clone()),
                other => panic!("no such column `{other}`"),
            }
        }

        fn set_column_value(&mut self, physical_name: &str, value: Value) -> Result<()> {
            match physical_name {
                "id" => {
                    self.id = value.try_into()?;
                    Ok(())
                }
                "password_hash" => {
                    self.password_hash = value.try_into()?;
                    Ok(())
                }
                other => Err(ErrorKind::MappingError { reason: format!("no such column `{other}`") }.into()),
            }
        }
    }

    #[test]
    fn equality_on_encrypted_column_is_allowed_but_like_is_rejected() {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute_raw("CREATE TABLE user_account (id INTEGER PRIMARY KEY AUTOINCREMENT, password_hash TEXT)", vec![]).unwrap();
        let mut ctx = DataContext::open(conn);

        assert!(ResultSet::<UserAccount, _>::new(&mut ctx).where_(Column::new("password_hash").equals("abc")).is_ok());
        assert!(ResultSet::<UserAccount, _>::new(&mut ctx).where_(Column::new("password_hash").like("a%")).is_err());
    }
}
