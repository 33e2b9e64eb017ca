//! Error kinds propagated to callers. The core never swallows an error and
//! never retries; see the module docs on `context` for the transaction
//! failure-handling policy.

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// Kinds drawn directly from the specification's error-handling design.
#[derive(Debug)]
pub enum ErrorKind {
    /// Missing or contradictory mapping annotations on a record type.
    MappingError { reason: String },
    /// The planner could not resolve a join between two mapped types.
    NoJoinPath { from: String, to: String },
    /// No filter-function plugin registered for this name on the active dialect.
    UnsupportedFilter { dialect: &'static str, name: String },
    /// A disallowed operator was used against an application-encrypted column.
    UnsupportedEncryptedPredicate { column: String },
    /// A single-row update/delete matched zero rows.
    NotFound,
    /// `First`/`Single` ran against an empty result set.
    NoRows,
    /// `Single` ran against a result set with more than one row.
    MoreThanOne,
    /// Generic constraint violation, classified from the engine where possible.
    ConstraintViolation { constraint: Option<String> },
    NotNullViolation { column: Option<String> },
    UniqueViolation { constraint: Option<String> },
    /// Operation cancelled mid-flight (driver-reported).
    Cancelled,
    /// Operation attempted on a closed/disposed context, or transaction misuse.
    InvalidContextState { reason: String },
    /// A bound value could not be converted to/from the requested Rust type.
    ConversionError { reason: String },
    /// The builder's fragment text and bound parameter count diverged.
    ParameterCountMismatch { expected: usize, actual: usize },
    /// Catch-all for engine-reported failures.
    DbError {
        code: Option<String>,
        message: String,
        sql: Option<String>,
        param_count: usize,
    },
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::MappingError { reason } => write!(f, "mapping error: {reason}"),
            ErrorKind::NoJoinPath { from, to } => write!(f, "no join path from `{from}` to `{to}`"),
            ErrorKind::UnsupportedFilter { dialect, name } => {
                write!(f, "filter function `{name}` is not supported on dialect `{dialect}`")
            }
            ErrorKind::UnsupportedEncryptedPredicate { column } => {
                write!(f, "unsupported predicate against encrypted column `{column}`")
            }
            ErrorKind::NotFound => write!(f, "no row matched the given key"),
            ErrorKind::NoRows => write!(f, "expected at least one row, found none"),
            ErrorKind::MoreThanOne => write!(f, "expected at most one row, found more than one"),
            ErrorKind::ConstraintViolation { constraint } => {
                write!(f, "constraint violation{}", fmt_opt(constraint))
            }
            ErrorKind::NotNullViolation { column } => write!(f, "not-null violation{}", fmt_opt(column)),
            ErrorKind::UniqueViolation { constraint } => write!(f, "unique violation{}", fmt_opt(constraint)),
            ErrorKind::Cancelled => write!(f, "operation cancelled"),
            ErrorKind::InvalidContextState { reason } => write!(f, "invalid context state: {reason}"),
            ErrorKind::ConversionError { reason } => write!(f, "conversion error: {reason}"),
            ErrorKind::ParameterCountMismatch { expected, actual } => write!(
                f,
                "parameter count mismatch: fragment expects {expected}, got {actual}"
            ),
            ErrorKind::DbError { code, message, .. } => match code {
                Some(code) => write!(f, "database error [{code}]: {message}"),
                None => write!(f, "database error: {message}"),
            },
        }
    }
}

fn fmt_opt(value: &Option<String>) -> String {
    match value {
        Some(v) => format!(" ({v})"),
        None => String::new(),
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }

    pub fn db(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DbError {
            code: None,
            message: message.into(),
            sql: None,
            param_count: 0,
        })
    }

    pub fn with_sql(mut self, sql: impl Into<String>, param_count: usize) -> Self {
        if let ErrorKind::DbError { sql: s, param_count: p, .. } = &mut self.kind {
            *s = Some(sql.into());
            *p = param_count;
        }
        self
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::Error as E;

        match &err {
            E::SqliteFailure(sql_err, msg) => {
                let code = sql_err.extended_code;
                // SQLITE_CONSTRAINT_UNIQUE = 2067, SQLITE_CONSTRAINT_PRIMARYKEY = 1555,
                // SQLITE_CONSTRAINT_NOTNULL = 1299.
                let kind = match code {
                    2067 | 1555 => ErrorKind::UniqueViolation { constraint: msg.clone() },
                    1299 => ErrorKind::NotNullViolation { column: msg.clone() },
                    _ if sql_err.code == rusqlite::ErrorCode::ConstraintViolation => {
                        ErrorKind::ConstraintViolation { constraint: msg.clone() }
                    }
                    _ => ErrorKind::DbError {
                        code: Some(code.to_string()),
                        message: err.to_string(),
                        sql: None,
                        param_count: 0,
                    },
                };
                Error::new(kind)
            }
            _ => Error::new(ErrorKind::DbError {
                code: None,
                message: err.to_string(),
                sql: None,
                param_count: 0,
            }),
        }
    }
}
