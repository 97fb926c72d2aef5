//! Core type definitions for Lakelog
//!
//! Identifiers and the table record owned by the catalog's persistence
//! layer. The coordinated commits core only reads `TableInfo` to check that a
//! table may accept coordinated commits, and writes back metadata updates
//! carried by commits.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Opaque, immutable table identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{_0}")]
#[serde(transparent)]
pub struct TableId(String);

impl TableId {
    /// Create a table id, rejecting empty or whitespace-only input
    pub fn new(id: impl Into<String>) -> Result<Self, TableIdError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(TableIdError::Empty);
        }
        if id.chars().any(char::is_control) {
            return Err(TableIdError::ControlCharacter);
        }
        Ok(Self(id))
    }

    /// Generate a new random table id
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Table id validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableIdError {
    #[error("table id must not be empty")]
    Empty,
    #[error("table id must not contain control characters")]
    ControlCharacter,
}

/// How the catalog owns a table's storage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableType {
    #[display("MANAGED")]
    Managed,
    #[display("EXTERNAL")]
    External,
}

/// On-disk format of a table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSourceFormat {
    #[display("DELTA")]
    Delta,
    #[display("ICEBERG")]
    Iceberg,
    #[display("PARQUET")]
    Parquet,
    #[display("CSV")]
    Csv,
    #[display("JSON")]
    Json,
}

/// A single column of a table schema
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_json: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default)]
    pub position: u32,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

const fn default_nullable() -> bool {
    true
}

/// Table record as seen by the coordinated commits core
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    pub table_id: TableId,
    pub name: String,
    pub table_type: TableType,
    pub data_source_format: DataSourceFormat,
    pub storage_location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
    /// Milliseconds since epoch
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl TableInfo {
    /// Whether this table may take part in coordinated commits
    #[must_use]
    pub fn accepts_coordinated_commits(&self) -> bool {
        self.table_type == TableType::Managed && self.data_source_format == DataSourceFormat::Delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(table_type: TableType, format: DataSourceFormat) -> TableInfo {
        TableInfo {
            table_id: TableId::generate(),
            name: "events".to_string(),
            table_type,
            data_source_format: format,
            storage_location: "s3://bucket/events".to_string(),
            comment: None,
            properties: HashMap::new(),
            columns: Vec::new(),
            created_at: 0,
            updated_at: None,
        }
    }

    #[test]
    fn test_table_id_validation() {
        assert!(TableId::new("abc").is_ok());
        assert_eq!(TableId::new("   "), Err(TableIdError::Empty));
        assert_eq!(TableId::new("a\nb"), Err(TableIdError::ControlCharacter));
        assert_eq!(TableId::new("t-1").unwrap().to_string(), "t-1");
    }

    #[test]
    fn test_accepts_coordinated_commits() {
        assert!(table(TableType::Managed, DataSourceFormat::Delta).accepts_coordinated_commits());
        assert!(!table(TableType::External, DataSourceFormat::Delta).accepts_coordinated_commits());
        assert!(!table(TableType::Managed, DataSourceFormat::Iceberg).accepts_coordinated_commits());
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(serde_json::to_string(&TableType::Managed).unwrap(), "\"MANAGED\"");
        assert_eq!(
            serde_json::from_str::<DataSourceFormat>("\"DELTA\"").unwrap(),
            DataSourceFormat::Delta
        );
    }
}
