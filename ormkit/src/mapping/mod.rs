//! Mapping Registry (spec.md §3/§4.1): reflects record-type descriptors
//! into `TableMapping`/`ColumnMapping`, caches them process-wide, and
//! resolves foreign-key and associative-table join paths between them.

mod record;
mod registry;
mod types;

pub use record::Record;
pub use registry::{JoinPath, Mapped, MappingRegistry};
pub use types::{AssociativeTableRef, ColumnMapping, ForeignKeyDescriptor, JoinFilter, TableMapping};
