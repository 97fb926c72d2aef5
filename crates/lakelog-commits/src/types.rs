//! Coordinated commits REST API JSON types.
//!
//! Request and response bodies use camelCase field names; the `getCommits`
//! query string uses snake_case parameters.

use lakelog_common::{ColumnInfo, DataSourceFormat, TableInfo, TableType};
use lakelog_meta_store::CommitLogEntry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---- Commits ----

/// A commit request, or one commit of a `getCommits` response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    #[serde(default)]
    pub table_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub table_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_info: Option<CommitInfo>,
    /// Highest version the writer has durably backfilled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_backfilled_version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfo {
    pub version: i64,
    /// Accept time in ms since epoch; the server fills it in when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    pub file_name: String,
    pub file_size: i64,
    pub file_modification_timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_disown_commit: Option<bool>,
}

impl CommitInfo {
    #[must_use]
    pub fn is_disown(&self) -> bool {
        self.is_disown_commit.unwrap_or(false)
    }
}

/// Table metadata changes carried by a commit
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<MetadataSchema>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataSchema {
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
}

/// Query parameters for `GET /coordinated-commits`.
///
/// Every field is optional at the serde level so that missing parameters
/// surface as `INVALID_ARGUMENT` bodies rather than extractor rejections.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct GetCommitsQuery {
    #[serde(default)]
    pub table_id: String,
    #[serde(default)]
    pub table_uri: String,
    pub start_version: Option<i64>,
    pub table_full_name: Option<String>,
    pub max_num_commits: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetCommitsResponse {
    pub commits: Vec<Commit>,
    /// `-1` when the table has no coordinated history
    pub latest_table_version: i64,
}

impl GetCommitsResponse {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            commits: Vec::new(),
            latest_table_version: -1,
        }
    }
}

impl From<&CommitLogEntry> for Commit {
    fn from(entry: &CommitLogEntry) -> Self {
        let version = to_wire_version(entry.commit_version);
        Self {
            table_id: entry.table_id.to_string(),
            table_uri: String::new(),
            commit_info: Some(CommitInfo {
                version,
                timestamp: Some(entry.commit_timestamp),
                file_name: entry.commit_filename.clone(),
                file_size: i64::try_from(entry.commit_filesize).unwrap_or(i64::MAX),
                file_modification_timestamp: entry.commit_file_modification_timestamp,
                is_disown_commit: entry.is_disown_commit.then_some(true),
            }),
            latest_backfilled_version: entry.is_backfilled_latest_commit.then_some(version),
            metadata: None,
        }
    }
}

/// Stored versions are `u64`; the wire uses signed longs.
#[must_use]
pub fn to_wire_version(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

// ---- Tables ----

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTableRequest {
    pub name: String,
    pub table_type: TableType,
    pub data_source_format: DataSourceFormat,
    pub storage_location: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Serialize)]
pub struct ListTablesResponse {
    pub tables: Vec<TableInfo>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use lakelog_common::TableId;
    use serde_json::json;

    #[test]
    fn test_commit_request_wire_names() {
        let body = json!({
            "tableId": "t1",
            "tableUri": "s3://bucket/t1",
            "commitInfo": {
                "version": 3,
                "fileName": "00000000000000000003.uuid.json",
                "fileSize": 120,
                "fileModificationTimestamp": 1700000000000_i64,
                "isDisownCommit": true
            },
            "latestBackfilledVersion": 2
        });
        let commit: Commit = serde_json::from_value(body).unwrap();
        let info = commit.commit_info.unwrap();
        assert_eq!(info.version, 3);
        assert!(info.timestamp.is_none());
        assert!(info.is_disown());
        assert_eq!(commit.latest_backfilled_version, Some(2));
    }

    #[test]
    fn test_entry_to_response_commit() {
        let entry = CommitLogEntry {
            table_id: TableId::new("t1").unwrap(),
            commit_version: 7,
            commit_filename: "f7".to_string(),
            commit_filesize: 10,
            commit_file_modification_timestamp: 5,
            commit_timestamp: 6,
            is_backfilled_latest_commit: true,
            is_preregistration_commit: false,
            is_disown_commit: false,
        };
        let value = serde_json::to_value(Commit::from(&entry)).unwrap();
        assert_eq!(
            value,
            json!({
                "tableId": "t1",
                "commitInfo": {
                    "version": 7,
                    "timestamp": 6,
                    "fileName": "f7",
                    "fileSize": 10,
                    "fileModificationTimestamp": 5
                },
                "latestBackfilledVersion": 7
            })
        );
    }
}
