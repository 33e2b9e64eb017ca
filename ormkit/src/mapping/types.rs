use crate::dialect::SchemaType;
use crate::value::Value;

/// A foreign-key descriptor on a `ColumnMapping` (spec.md §3, §6
/// `ForeignKey(targetRecordType, targetAttributeName)`).
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyDescriptor {
    pub target_table: String,
    pub target_column: String,
}

/// A constant predicate automatically appended to a join's `ON` clause
/// when the owning column's table is joined (spec.md §3, §6 `JoinFilter`).
#[derive(Debug, Clone, PartialEq)]
pub struct JoinFilter {
    pub column: String,
    pub value: Value,
}

/// An associative (link) table declared on a mapped type, connecting it
/// to another mapped type through a join table (spec.md §6
/// `AssociativeTable(targetRecordType, linkRecordType)`).
#[derive(Debug, Clone, PartialEq)]
pub struct AssociativeTableRef {
    pub target_table: String,
    pub link_table: String,
    /// Column on `link_table` referencing the owning mapping's primary key.
    pub source_fk_column: String,
    /// Column on `link_table` referencing `target_table`'s primary key.
    pub target_fk_column: String,
}

/// The physical/logical description of one mapped attribute (spec.md §3).
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMapping {
    pub physical_name: String,
    pub logical_name: String,
    pub schema_type: SchemaType,
    pub nullable: bool,

    pub primary_key: bool,
    pub auto_generated: bool,
    pub not_null: bool,
    pub secret: bool,
    pub unique: bool,
    pub hashed: bool,
    pub application_encrypted: bool,
    pub ignore_case: bool,

    pub public_key: bool,
    pub public_key_ref: Option<String>,

    pub foreign_key: Option<ForeignKeyDescriptor>,
    pub join_filter: Option<JoinFilter>,
    pub default_value: Option<Value>,
}

impl ColumnMapping {
    /// Minimal, non-key, non-flagged column. Tests and the derive macro
    /// build on top of this with `..ColumnMapping::plain(...)`.
    pub fn plain(physical_name: impl Into<String>, schema_type: SchemaType) -> Self {
        Self {
            physical_name: physical_name.into(),
            logical_name: String::new(),
            schema_type,
            nullable: true,
            primary_key: false,
            auto_generated: false,
            not_null: false,
            secret: false,
            unique: false,
            hashed: false,
            application_encrypted: false,
            ignore_case: false,
            public_key: false,
            public_key_ref: None,
            foreign_key: None,
            join_filter: None,
            default_value: None,
        }
    }

    pub fn logical(mut self, name: impl Into<String>) -> Self {
        self.logical_name = name.into();
        self
    }
}

/// The static description tying a mapped record type to a table and its
/// columns (spec.md §3 `TableMapping`). Produced once by
/// `ormkit_derive::Mapped` and cached by `MappingRegistry`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableMapping {
    pub type_name: &'static str,
    pub table: String,
    pub columns: Vec<ColumnMapping>,
    pub associative_tables: Vec<AssociativeTableRef>,
    pub always_join: Vec<String>,
    pub skip_hints: Vec<String>,
}

impl TableMapping {
    pub fn new(type_name: &'static str, table: impl Into<String>, columns: Vec<ColumnMapping>) -> Self {
        Self {
            type_name,
            table: table.into(),
            columns,
            associative_tables: Vec::new(),
            always_join: Vec::new(),
            skip_hints: Vec::new(),
        }
    }

    pub fn with_associative_tables(mut self, refs: Vec<AssociativeTableRef>) -> Self {
        self.associative_tables = refs;
        self
    }

    pub fn with_always_join(mut self, tables: Vec<String>) -> Self {
        self.always_join = tables;
        self
    }

    pub fn primary_key_columns(&self) -> Vec<&ColumnMapping> {
        self.columns.iter().filter(|c| c.primary_key).collect()
    }

    pub fn column(&self, physical_name: &str) -> Option<&ColumnMapping> {
        self.columns.iter().find(|c| c.physical_name == physical_name)
    }

    pub fn column_for_logical(&self, logical_name: &str) -> Option<&ColumnMapping> {
        self.columns.iter().find(|c| c.logical_name == logical_name)
    }

    /// Projection list (spec.md §4.1 `columnsFor`): secret columns are
    /// excluded unless `include_secret` is set.
    pub fn columns_for(&self, include_secret: bool) -> Vec<&ColumnMapping> {
        self.columns
            .iter()
            .filter(|c| include_secret || !c.secret)
            .collect()
    }
}
