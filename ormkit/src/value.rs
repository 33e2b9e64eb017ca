//! The dynamic value type bound to and read from query parameters.
//!
//! Quaint parameterizes `Value` over a borrow lifetime; this kernel owns its
//! values outright, which keeps mapped records (and the per-context data
//! cache keyed on them) free of lifetime parameters.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::fmt;
use uuid::Uuid;

/// The neutral, engine-independent shape a bound value can take.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    Int32(Option<i32>),
    Int64(Option<i64>),
    Float(Option<f32>),
    Double(Option<f64>),
    Text(Option<String>),
    Bytes(Option<Vec<u8>>),
    Boolean(Option<bool>),
    Json(Option<serde_json::Value>),
    Uuid(Option<Uuid>),
    DateTime(Option<DateTime<Utc>>),
    Date(Option<NaiveDate>),
    Time(Option<NaiveTime>),
    Numeric(Option<bigdecimal::BigDecimal>),
    Array(Option<Vec<Value>>),
}

/// A single bound value or materialised column value.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub typed: ValueType,
}

impl Value {
    pub fn new(typed: ValueType) -> Self {
        Self { typed }
    }

    pub fn is_null(&self) -> bool {
        use ValueType::*;
        matches!(
            &self.typed,
            Int32(None)
                | Int64(None)
                | Float(None)
                | Double(None)
                | Text(None)
                | Bytes(None)
                | Boolean(None)
                | Json(None)
                | Uuid(None)
                | DateTime(None)
                | Date(None)
                | Time(None)
                | Numeric(None)
                | Array(None)
        )
    }

    pub fn text(v: impl Into<String>) -> Self {
        Value::new(ValueType::Text(Some(v.into())))
    }

    pub fn null_text() -> Self {
        Value::new(ValueType::Text(None))
    }

    pub fn int32(v: i32) -> Self {
        Value::new(ValueType::Int32(Some(v)))
    }

    pub fn null_int32() -> Self {
        Value::new(ValueType::Int32(None))
    }

    pub fn int64(v: i64) -> Self {
        Value::new(ValueType::Int64(Some(v)))
    }

    pub fn null_int64() -> Self {
        Value::new(ValueType::Int64(None))
    }

    pub fn double(v: f64) -> Self {
        Value::new(ValueType::Double(Some(v)))
    }

    pub fn boolean(v: bool) -> Self {
        Value::new(ValueType::Boolean(Some(v)))
    }

    pub fn null_boolean() -> Self {
        Value::new(ValueType::Boolean(None))
    }

    pub fn bytes(v: impl Into<Vec<u8>>) -> Self {
        Value::new(ValueType::Bytes(Some(v.into())))
    }

    pub fn null_bytes() -> Self {
        Value::new(ValueType::Bytes(None))
    }

    pub fn uuid(v: Uuid) -> Self {
        Value::new(ValueType::Uuid(Some(v)))
    }

    pub fn null_uuid() -> Self {
        Value::new(ValueType::Uuid(None))
    }

    pub fn datetime(v: DateTime<Utc>) -> Self {
        Value::new(ValueType::DateTime(Some(v)))
    }

    pub fn null_datetime() -> Self {
        Value::new(ValueType::DateTime(None))
    }

    pub fn json(v: serde_json::Value) -> Self {
        Value::new(ValueType::Json(Some(v)))
    }

    /// The `ValueType` variant's name, never its contents — used only for
    /// trace events (spec.md §7 "Trace output" never logs bound values).
    pub fn type_name(&self) -> &'static str {
        match &self.typed {
            ValueType::Int32(_) => "int32",
            ValueType::Int64(_) => "int64",
            ValueType::Float(_) => "float",
            ValueType::Double(_) => "double",
            ValueType::Text(_) => "text",
            ValueType::Bytes(_) => "bytes",
            ValueType::Boolean(_) => "boolean",
            ValueType::Json(_) => "json",
            ValueType::Uuid(_) => "uuid",
            ValueType::DateTime(_) => "datetime",
            ValueType::Date(_) => "date",
            ValueType::Time(_) => "time",
            ValueType::Numeric(_) => "numeric",
            ValueType::Array(_) => "array",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.typed {
            ValueType::Text(Some(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match &self.typed {
            ValueType::Int64(Some(v)) => Some(*v),
            ValueType::Int32(Some(v)) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.typed {
            ValueType::Bytes(Some(b)) => Some(b.as_slice()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.typed {
            ValueType::Int32(v) => write!(f, "{v:?}"),
            ValueType::Int64(v) => write!(f, "{v:?}"),
            ValueType::Float(v) => write!(f, "{v:?}"),
            ValueType::Double(v) => write!(f, "{v:?}"),
            ValueType::Text(v) => write!(f, "{v:?}"),
            ValueType::Bytes(v) => write!(f, "<{} bytes>", v.as_ref().map(|b| b.len()).unwrap_or(0)),
            ValueType::Boolean(v) => write!(f, "{v:?}"),
            ValueType::Json(v) => write!(f, "{v:?}"),
            ValueType::Uuid(v) => write!(f, "{v:?}"),
            ValueType::DateTime(v) => write!(f, "{v:?}"),
            ValueType::Date(v) => write!(f, "{v:?}"),
            ValueType::Time(v) => write!(f, "{v:?}"),
            ValueType::Numeric(v) => write!(f, "{v:?}"),
            ValueType::Array(v) => write!(f, "{v:?}"),
        }
    }
}

macro_rules! from_impl {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::new(ValueType::$variant(Some(v.into())))
            }
        }

        impl From<Option<$ty>> for Value {
            fn from(v: Option<$ty>) -> Self {
                Value::new(ValueType::$variant(v.map(Into::into)))
            }
        }
    };
}

from_impl!(i32, Int32);
from_impl!(i64, Int64);
from_impl!(f64, Double);
from_impl!(bool, Boolean);
from_impl!(String, Text);
from_impl!(Vec<u8>, Bytes);
from_impl!(Uuid, Uuid);
from_impl!(DateTime<Utc>, DateTime);
from_impl!(NaiveDate, Date);
from_impl!(NaiveTime, Time);
from_impl!(f32, Float);
from_impl!(bigdecimal::BigDecimal, Numeric);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::text(v)
    }
}

macro_rules! try_from_impl {
    ($ty:ty, $variant:ident) => {
        impl TryFrom<Value> for $ty {
            type Error = crate::error::Error;

            fn try_from(v: Value) -> Result<Self, Self::Error> {
                match v.typed {
                    ValueType::$variant(Some(inner)) => Ok(inner.into()),
                    other => Err(crate::error::ErrorKind::ConversionError {
                        reason: format!("cannot convert {other:?} into {}", stringify!($ty)),
                    }
                    .into()),
                }
            }
        }

        impl TryFrom<Value> for Option<$ty> {
            type Error = crate::error::Error;

            fn try_from(v: Value) -> Result<Self, Self::Error> {
                match v.typed {
                    ValueType::$variant(inner) => Ok(inner.map(Into::into)),
                    other => Err(crate::error::ErrorKind::ConversionError {
                        reason: format!("cannot convert {other:?} into Option<{}>", stringify!($ty)),
                    }
                    .into()),
                }
            }
        }
    };
}

try_from_impl!(i32, Int32);
try_from_impl!(i64, Int64);
try_from_impl!(f64, Double);
try_from_impl!(bool, Boolean);
try_from_impl!(String, Text);
try_from_impl!(Vec<u8>, Bytes);
try_from_impl!(Uuid, Uuid);
try_from_impl!(DateTime<Utc>, DateTime);
try_from_impl!(NaiveDate, Date);
try_from_impl!(NaiveTime, Time);
try_from_impl!(f32, Float);
try_from_impl!(bigdecimal::BigDecimal, Numeric);

/// Convenience macro matching quaint's `val!` helper: wraps anything
/// convertible into a bound `Value`.
#[macro_export]
macro_rules! val {
    ($e:expr) => {
        $crate::value::Value::from($e)
    };
}

/// A materialised row: ordered column names paired with bound values.
#[derive(Debug, Clone, Default)]
pub struct Row {
    pub columns: Vec<String>,
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.iter().position(|c| c == name).map(|i| &self.values[i])
    }

    pub fn at(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::ops::Index<&str> for Row {
    type Output = Value;

    fn index(&self, name: &str) -> &Value {
        self.get(name)
            .unwrap_or_else(|| panic!("no such column `{name}` in row"))
    }
}

impl std::ops::Index<usize> for Row {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.values[index]
    }
}
