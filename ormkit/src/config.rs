//! Connector configuration surface (`SPEC_FULL.md`'s configuration
//! section). Parsing a connection string's own syntax is out of scope
//! (spec.md §1) — this only defines the contract a connector factory
//! consumes once a caller has already produced one, the same split
//! quaint draws between its connection-string crate and the connector
//! constructors that take an already-parsed `ConnectionInfo`.

use serde::{Deserialize, Serialize};

/// Read/write posture a connection was opened under. `ReadOnly` is
/// advisory at this layer — nothing in `connector`/`context` enforces it
/// today, it exists so a `ConnectorConfig` can express the intent a
/// deployment's routing layer (primary vs. replica) already knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    ReadWrite,
    ReadOnly,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::ReadWrite
    }
}

/// Per-field encryption mode name, as it would appear in a config file
/// next to the field it governs. Mirrors `crate::encryption::EncryptionMode`
/// without depending on it directly, so a config can be deserialized
/// before any `EncryptionAdapter` exists to interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionModeName {
    Off,
    Random,
    Deterministic,
}

/// One field's encryption assignment within an `EncryptionConfig`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEncryptionSetting {
    pub field: String,
    pub mode: EncryptionModeName,
}

/// Settings consumed by the Encryption Adapter (spec.md §4.8). The
/// `certificate_ref`/`salt_seed` fields name where the real key material
/// lives (a secrets manager, an HSM slot) rather than carrying it inline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EncryptionConfig {
    pub enabled: bool,
    pub certificate_ref: Option<String>,
    pub salt_seed: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldEncryptionSetting>,
}

/// A parsed description of one database connection: which engine, how to
/// reach it, and under what posture. Connector factories (`sqlite::SqliteConnection::open`
/// and friends) take the connection string directly; `ConnectionInfo` is
/// the richer, serializable form a deployment's configuration file
/// carries end to end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub invariant: String,
    pub connection_string: String,
    #[serde(default)]
    pub mode: Mode,
}

impl ConnectionInfo {
    pub fn new(invariant: impl Into<String>, connection_string: impl Into<String>) -> Self {
        Self {
            invariant: invariant.into(),
            connection_string: connection_string.into(),
            mode: Mode::ReadWrite,
        }
    }

    pub fn is_one_of(&self, invariants: &[&str]) -> bool {
        invariants.iter().any(|i| i.eq_ignore_ascii_case(&self.invariant))
    }
}

/// The full connector configuration: connection info, a SQL-trace toggle
/// (feeding `tracing`'s span/event output — `DataContext`'s module docs),
/// and an optional encryption configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    #[serde(flatten)]
    pub connection: ConnectionInfo,
    #[serde(default)]
    pub sql_trace: bool,
    #[serde(default)]
    pub encryption: Option<EncryptionConfig>,
}

impl ConnectorConfig {
    pub fn new(connection: ConnectionInfo) -> Self {
        Self {
            connection,
            sql_trace: false,
            encryption: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_info_matches_case_insensitively() {
        let info = ConnectionInfo::new("SQLite", "file::memory:");
        assert!(info.is_one_of(&["sqlite", "postgresql"]));
        assert!(!info.is_one_of(&["mysql", "mssql"]));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = ConnectorConfig {
            connection: ConnectionInfo::new("postgresql", "postgresql://localhost/db"),
            sql_trace: true,
            encryption: Some(EncryptionConfig {
                enabled: true,
                certificate_ref: Some("vault://ormkit/key".to_string()),
                salt_seed: None,
                fields: vec![FieldEncryptionSetting {
                    field: "password_hash".to_string(),
                    mode: EncryptionModeName::Deterministic,
                }],
            }),
        };

        let json = serde_json::to_string(&config).unwrap();
        let back: ConnectorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn mode_defaults_to_read_write() {
        let json = r#"{"invariant":"sqlite","connection_string":"file::memory:"}"#;
        let info: ConnectionInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.mode, Mode::ReadWrite);
    }
}
