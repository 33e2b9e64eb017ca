//! Query Planner (spec.md §4.4): turns a predicate/projection/order
//! expression over one or more mapped record types into an `ast::Select`.
//!
//! The planner is deliberately dialect-agnostic — it only ever produces
//! `ast` nodes, never SQL text — so `Visitor` remains the single place
//! dialect differences are applied, and the same plan renders identically
//! across engines save for spelling.

use crate::ast::{Column, ConditionTree, Expression, Join, Order, OrderDefinition, Select, Table};
use crate::error::{Error, ErrorKind};
use crate::mapping::{ColumnMapping, JoinPath, MappingRegistry, TableMapping};

pub struct Planner;

impl Planner {
    /// A bare `SELECT <columns> FROM <table> <alias>` with the mapping's
    /// default projection (secrets excluded unless `include_secret`).
    pub fn base_select(mapping: &TableMapping, alias: impl Into<String>, include_secret: bool) -> Select {
        let alias = alias.into();
        let table = Table::new(mapping.table.clone()).alias(alias);
        let mut select = Select::from_table(table);

        for name in MappingRegistry::columns_for(mapping, include_secret) {
            select = select.column(name);
        }

        select
    }

    /// The join clause(s) needed to reach `target` from `primary`
    /// (spec.md §4.1 `resolveJoin`, §4.4 "member access chains resolve via
    /// mapping"). An associative-table path (spec.md §4.1 "two-hop path")
    /// produces two joins: one to the link table, one onward to `target`.
    pub fn joins_for(
        primary: &TableMapping,
        primary_alias: &str,
        target: &TableMapping,
        target_alias: &str,
    ) -> Result<Vec<Join>, Error> {
        match MappingRegistry::resolve_join(primary, target)? {
            JoinPath::Direct { fk_column, target_pk_column } => {
                let on = ConditionTree::single(
                    Table::new(primary.table.clone())
                        .alias(primary_alias)
                        .column(fk_column)
                        .equals(Table::new(target.table.clone()).alias(target_alias).column(target_pk_column)),
                );
                Ok(vec![Join::inner(
                    Table::new(target.table.clone()).alias(target_alias),
                    apply_join_filter(on, target, target_alias),
                )])
            }
            JoinPath::Reverse { source_pk_column, fk_column } => {
                let on = ConditionTree::single(
                    Table::new(primary.table.clone())
                        .alias(primary_alias)
                        .column(source_pk_column)
                        .equals(Table::new(target.table.clone()).alias(target_alias).column(fk_column)),
                );
                Ok(vec![Join::inner(
                    Table::new(target.table.clone()).alias(target_alias),
                    apply_join_filter(on, target, target_alias),
                )])
            }
            JoinPath::Associative {
                link_table,
                source_pk_column,
                source_fk_column,
                target_fk_column,
                target_pk_column,
            } => {
                let link_alias = format!("{target_alias}_lnk");

                let link_on = ConditionTree::single(
                    Table::new(primary.table.clone())
                        .alias(primary_alias)
                        .column(source_pk_column)
                        .equals(Table::new(link_table.clone()).alias(link_alias.clone()).column(source_fk_column)),
                );
                let link_join = Join::inner(Table::new(link_table.clone()).alias(link_alias.clone()), link_on);

                let target_on = ConditionTree::single(
                    Table::new(link_table).alias(link_alias).column(target_fk_column).equals(
                        Table::new(target.table.clone()).alias(target_alias).column(target_pk_column),
                    ),
                );
                let target_join = Join::inner(
                    Table::new(target.table.clone()).alias(target_alias),
                    apply_join_filter(target_on, target, target_alias),
                );

                Ok(vec![link_join, target_join])
            }
        }
    }

    /// Appends a join for every table named in `primary.always_join`
    /// (spec.md §3 "always-join" relationships). Callers supply the
    /// resolved `TableMapping` for each always-join target alongside the
    /// alias to use for it — the registry itself only knows mappings by
    /// Rust type, so the name-to-mapping link is made by the caller, who
    /// already holds both types generically.
    pub fn apply_always_joins(
        mut select: Select,
        primary: &TableMapping,
        primary_alias: &str,
        targets: &[(&TableMapping, &str)],
    ) -> Result<Select, Error> {
        for table_name in &primary.always_join {
            let (target, target_alias) = targets
                .iter()
                .find(|(t, _)| &t.table == table_name)
                .ok_or_else(|| {
                    Error::from(ErrorKind::MappingError {
                        reason: format!(
                            "`{}` declares an always-join to `{table_name}` but no mapping for it was supplied",
                            primary.type_name
                        ),
                    })
                })?;

            for join in Self::joins_for(primary, primary_alias, target, target_alias)? {
                select = select.inner_join(join);
            }
        }

        Ok(select)
    }

    /// Appends a deterministic `ORDER BY` on the mapping's first
    /// primary-key column when `Skip`/`Take` is used without an explicit
    /// ordering (spec.md §4.4, §9c).
    pub fn ensure_stable_order(select: Select, mapping: &TableMapping, alias: &str) -> Select {
        if !select.ordering.is_empty() {
            return select;
        }
        if select.limit.is_none() && select.offset.is_none() {
            return select;
        }

        match mapping.primary_key_columns().first() {
            Some(pk) => {
                let col = Table::new(mapping.table.clone()).alias(alias).column(pk.physical_name.clone());
                select.order_by(col)
            }
            None => select,
        }
    }

    /// Builds the `LOWER(col) = LOWER(?)` predicate spec.md §4.4 requires
    /// for `ignoreCase` columns.
    pub fn ignore_case_equals(column: Column, value: impl Into<Expression>) -> Expression {
        use crate::ast::Compare;
        Compare::Equals(
            Box::new(Expression::new(crate::ast::ExpressionKind::Column(Box::new(column))).lower()),
            Box::new(value.into().lower()),
        )
        .into()
    }

    /// spec.md §4.4 "Application-encrypted columns used in predicates
    /// permit only equality... any other operator... fails with
    /// `UnsupportedEncryptedPredicate`". `is_equality` and
    /// `deterministic_mode` are supplied by the caller, which already
    /// knows both the shape of the predicate being built and the active
    /// encryption mode for the column.
    pub fn validate_encrypted_predicate(
        column: &ColumnMapping,
        is_equality: bool,
        deterministic_mode: bool,
    ) -> Result<(), Error> {
        if column.application_encrypted && (!is_equality || !deterministic_mode) {
            return Err(ErrorKind::UnsupportedEncryptedPredicate {
                column: column.physical_name.clone(),
            }
            .into());
        }
        Ok(())
    }

    /// `OrderBy`/`OrderByDescending` (spec.md §4.6): replaces the select's
    /// ordering wholesale, matching the result set's "replace order
    /// clause" semantics.
    pub fn replace_order(mut select: Select, column: Column, descending: bool) -> Select {
        select.ordering = vec![OrderDefinition::new(
            column.into(),
            if descending { Order::Desc } else { Order::Asc },
        )];
        select
    }
}

fn apply_join_filter(base: ConditionTree, target: &TableMapping, alias: &str) -> ConditionTree {
    let mut cond = base;

    for col in &target.columns {
        if let Some(jf) = &col.join_filter {
            let expr = Table::new(target.table.clone())
                .alias(alias)
                .column(jf.column.clone())
                .equals(jf.value.clone());

            cond = match cond {
                ConditionTree::And(mut exprs) => {
                    exprs.push(expr);
                    ConditionTree::And(exprs)
                }
                other => ConditionTree::And(vec![other.into(), expr]),
            };
        }
    }

    cond
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Comparable;
    use crate::dialect::{Dialect, SqliteDialect};
    use crate::mapping::{AssociativeTableRef, ForeignKeyDescriptor};
    use crate::value::Value;
    use crate::visitor::Visitor;

    fn foo() -> TableMapping {
        TableMapping::new(
            "Foo",
            "foo",
            vec![
                ColumnMapping { primary_key: true, ..ColumnMapping::plain("id", crate::dialect::SchemaType::Integer) },
                ColumnMapping {
                    foreign_key: Some(ForeignKeyDescriptor { target_table: "bar".into(), target_column: "id".into() }),
                    ..ColumnMapping::plain("bar_id", crate::dialect::SchemaType::Integer)
                },
            ],
        )
    }

    fn bar() -> TableMapping {
        TableMapping::new(
            "Bar",
            "bar",
            vec![ColumnMapping { primary_key: true, ..ColumnMapping::plain("id", crate::dialect::SchemaType::Integer) }],
        )
    }

    #[test]
    fn base_select_excludes_secret_columns_by_default() {
        let mut mapping = foo();
        mapping.columns.push(ColumnMapping { secret: true, ..ColumnMapping::plain("ssn", crate::dialect::SchemaType::String) });

        let select = Planner::base_select(&mapping, "t0", false);
        assert_eq!(select.columns.len(), 2);
    }

    #[test]
    fn joins_for_direct_fk_renders_expected_sql() {
        let foo = foo();
        let bar = bar();
        let select = Planner::base_select(&foo, "t0", false);
        let join = Planner::joins_for(&foo, "t0", &bar, "t1").unwrap();
        let select = select.inner_join(join.into_iter().next().unwrap());

        let visitor = Visitor::new(SqliteDialect::instance());
        let stmt = visitor.render(&select.into()).unwrap();
        assert!(stmt.sql.contains("INNER JOIN \"bar\" \"t1\" ON \"t0\".\"bar_id\" = \"t1\".\"id\""));
    }

    #[test]
    fn ensure_stable_order_adds_pk_order_when_paging_without_order() {
        let foo = foo();
        let select = Planner::base_select(&foo, "t0", false).limit(10).offset(5);
        let select = Planner::ensure_stable_order(select, &foo, "t0");
        assert_eq!(select.ordering.len(), 1);
    }

    #[test]
    fn associative_path_produces_two_joins() {
        let mut foo = foo();
        foo.associative_tables = vec![AssociativeTableRef {
            target_table: "baz".into(),
            link_table: "foo_baz".into(),
            source_fk_column: "foo_id".into(),
            target_fk_column: "baz_id".into(),
        }];
        let baz = TableMapping::new(
            "Baz",
            "baz",
            vec![ColumnMapping { primary_key: true, ..ColumnMapping::plain("id", crate::dialect::SchemaType::Integer) }],
        );

        let joins = Planner::joins_for(&foo, "t0", &baz, "t1").unwrap();
        assert_eq!(joins.len(), 2);
    }

    #[test]
    fn encrypted_predicate_rejects_non_equality() {
        let col = ColumnMapping { application_encrypted: true, ..ColumnMapping::plain("password_hash", crate::dialect::SchemaType::String) };
        assert!(Planner::validate_encrypted_predicate(&col, false, true).is_err());
        assert!(Planner::validate_encrypted_predicate(&col, true, true).is_ok());
        let _ = Value::text("x");
    }
}
