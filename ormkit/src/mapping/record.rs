use super::Mapped;
use crate::error::Result;
use crate::value::Value;

/// Implemented by `#[derive(ormkit_derive::Mapped)]` alongside `Mapped`:
/// gives the context/result-set layers field-level read/write access by
/// physical column name without requiring a hand-written `FromRow`/`ToRow`
/// per record type.
///
/// `from_values` rehydrates a record from a positional `(column, value)`
/// projection — used both for single-table rows and for the per-table
/// slices a composite (joined) row is split into, so two tables sharing a
/// physical column name (e.g. both having an `id`) never collide. Columns
/// the projection omitted (secret columns excluded from the default
/// projection, spec.md §4.1) are left at the type's `Default`.
pub trait Record: Mapped + Default {
    fn column_value(&self, physical_name: &str) -> Value;

    fn set_column_value(&mut self, physical_name: &str, value: Value) -> Result<()>;

    fn from_values(columns: &[String], values: &[Value]) -> Result<Self>
    where
        Self: Sized,
    {
        let mut record = Self::default();
        for (name, value) in columns.iter().zip(values.iter()) {
            record.set_column_value(name, value.clone())?;
        }
        Ok(record)
    }
}
