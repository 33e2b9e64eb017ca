use super::types::TableMapping;
use crate::error::{Error, ErrorKind};
use once_cell::sync::Lazy;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Implemented by `#[derive(ormkit_derive::Mapped)]` on a record type.
/// `describe()` builds the `TableMapping` exactly once; the registry owns
/// caching it by `TypeId` from then on (spec.md §4.1 "reflects a record
/// type once, on first use, and caches").
pub trait Mapped: 'static {
    fn describe() -> TableMapping;
}

/// A resolved path for joining mapping `A` to mapping `B` (spec.md §4.1
/// `resolveJoin`). Table names are carried as plain strings rather than
/// owning references to the target `TableMapping` — the design note in
/// spec.md §9 calls for resolving cyclic foreign keys through a name
/// registry rather than owning pointers, which this mirrors even for the
/// acyclic case.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinPath {
    /// A direct foreign key from A to B: `A.fk_column = B.target_pk_column`.
    Direct { fk_column: String, target_pk_column: String },
    /// A foreign key from B back to A: `A.source_pk_column = B.fk_column`.
    Reverse { source_pk_column: String, fk_column: String },
    /// A two-hop path through an associative table declared on A.
    Associative {
        link_table: String,
        source_pk_column: String,
        source_fk_column: String,
        target_fk_column: String,
        target_pk_column: String,
    },
}

/// Process-wide, read-mostly cache of `TableMapping`s (spec.md §4.1, §5
/// "first-write-then-publish semantics"). A `RwLock<HashMap>` gives many
/// concurrent readers after the first writer publishes a given type's
/// mapping; the lock is only ever held briefly to clone an `Arc`.
static CACHE: Lazy<RwLock<HashMap<TypeId, Arc<TableMapping>>>> = Lazy::new(|| RwLock::new(HashMap::new()));

pub struct MappingRegistry;

impl MappingRegistry {
    /// `get(T) -> TableMapping` (spec.md §4.1).
    pub fn get<T: Mapped>() -> Arc<TableMapping> {
        let key = TypeId::of::<T>();

        if let Some(existing) = CACHE.read().unwrap().get(&key) {
            return existing.clone();
        }

        let mapping = Arc::new(T::describe());

        let mut write = CACHE.write().unwrap();
        write.entry(key).or_insert_with(|| mapping.clone()).clone()
    }

    /// `resolveJoin(A, B) -> JoinPath` (spec.md §4.1). Tie-break order,
    /// applied literally: (1) direct FK A→B, (2) reverse FK B→A, (3) an
    /// associative table declared on A targeting B. First match wins.
    pub fn resolve_join(a: &TableMapping, b: &TableMapping) -> Result<JoinPath, Error> {
        if let Some(col) = a.columns.iter().find(|c| {
            c.foreign_key
                .as_ref()
                .map(|fk| fk.target_table == b.table)
                .unwrap_or(false)
        }) {
            let fk = col.foreign_key.as_ref().unwrap();
            return Ok(JoinPath::Direct {
                fk_column: col.physical_name.clone(),
                target_pk_column: fk.target_column.clone(),
            });
        }

        if let Some(col) = b.columns.iter().find(|c| {
            c.foreign_key
                .as_ref()
                .map(|fk| fk.target_table == a.table)
                .unwrap_or(false)
        }) {
            let fk = col.foreign_key.as_ref().unwrap();
            return Ok(JoinPath::Reverse {
                source_pk_column: fk.target_column.clone(),
                fk_column: col.physical_name.clone(),
            });
        }

        if let Some(assoc) = a.associative_tables.iter().find(|r| r.target_table == b.table) {
            let source_pk = a
                .primary_key_columns()
                .first()
                .map(|c| c.physical_name.clone())
                .ok_or_else(|| ErrorKind::MappingError {
                    reason: format!("`{}` has no primary key column", a.type_name),
                })?;
            let target_pk = b
                .primary_key_columns()
                .first()
                .map(|c| c.physical_name.clone())
                .ok_or_else(|| ErrorKind::MappingError {
                    reason: format!("`{}` has no primary key column", b.type_name),
                })?;

            return Ok(JoinPath::Associative {
                link_table: assoc.link_table.clone(),
                source_pk_column: source_pk,
                source_fk_column: assoc.source_fk_column.clone(),
                target_fk_column: assoc.target_fk_column.clone(),
                target_pk_column: target_pk,
            });
        }

        Err(ErrorKind::NoJoinPath {
            from: a.table.clone(),
            to: b.table.clone(),
        }
        .into())
    }

    /// `columnsFor(T, {includeSecret})` (spec.md §4.1).
    pub fn columns_for(mapping: &TableMapping, include_secret: bool) -> Vec<String> {
        mapping
            .columns_for(include_secret)
            .into_iter()
            .map(|c| c.physical_name.clone())
            .collect()
    }

    /// `alwaysJoinTargets(T)` (spec.md §4.1).
    pub fn always_join_targets(mapping: &TableMapping) -> &[String] {
        &mapping.always_join
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::SchemaType;
    use crate::mapping::types::{ColumnMapping, ForeignKeyDescriptor};

    fn foo_mapping() -> TableMapping {
        TableMapping::new(
            "Foo",
            "foo",
            vec![
                ColumnMapping {
                    primary_key: true,
                    ..ColumnMapping::plain("id", SchemaType::Integer)
                },
                ColumnMapping {
                    foreign_key: Some(ForeignKeyDescriptor {
                        target_table: "bar".to_string(),
                        target_column: "id".to_string(),
                    }),
                    ..ColumnMapping::plain("bar_id", SchemaType::Integer)
                },
            ],
        )
    }

    fn bar_mapping() -> TableMapping {
        TableMapping::new(
            "Bar",
            "bar",
            vec![ColumnMapping {
                primary_key: true,
                ..ColumnMapping::plain("id", SchemaType::Integer)
            }],
        )
    }

    #[test]
    fn resolves_direct_foreign_key_before_reverse() {
        let foo = foo_mapping();
        let bar = bar_mapping();

        let path = MappingRegistry::resolve_join(&foo, &bar).unwrap();
        assert_eq!(
            path,
            JoinPath::Direct {
                fk_column: "bar_id".to_string(),
                target_pk_column: "id".to_string(),
            }
        );
    }

    #[test]
    fn resolves_reverse_foreign_key_when_no_direct_one_exists() {
        let foo = foo_mapping();
        let bar = bar_mapping();

        let path = MappingRegistry::resolve_join(&bar, &foo).unwrap();
        assert_eq!(
            path,
            JoinPath::Reverse {
                source_pk_column: "id".to_string(),
                fk_column: "bar_id".to_string(),
            }
        );
    }

    #[test]
    fn no_join_path_between_unrelated_tables() {
        let bar = bar_mapping();
        let unrelated = TableMapping::new(
            "Baz",
            "baz",
            vec![ColumnMapping {
                primary_key: true,
                ..ColumnMapping::plain("id", SchemaType::Integer)
            }],
        );

        assert!(matches!(
            MappingRegistry::resolve_join(&bar, &unrelated).unwrap_err().into_kind(),
            ErrorKind::NoJoinPath { .. }
        ));
    }
}
