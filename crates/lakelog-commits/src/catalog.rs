//! Minimal table registry backing the coordinated commits API.

use crate::error::CommitError;
use crate::types::CreateTableRequest;
use lakelog_common::{TableId, TableInfo};
use lakelog_meta_store::MetaStore;
use tracing::info;

type Result<T> = std::result::Result<T, CommitError>;

/// Register a new table under a generated id.
///
/// # Errors
/// `InvalidArgument` if the name or storage location is empty.
pub fn create_table(store: &MetaStore, req: CreateTableRequest) -> Result<TableInfo> {
    if req.name.trim().is_empty() {
        return Err(CommitError::invalid_argument("name is required"));
    }
    if req.storage_location.trim().is_empty() {
        return Err(CommitError::invalid_argument("storageLocation is required"));
    }

    let table = TableInfo {
        table_id: TableId::generate(),
        name: req.name,
        table_type: req.table_type,
        data_source_format: req.data_source_format,
        storage_location: req.storage_location,
        comment: req.comment,
        properties: req.properties,
        columns: req.columns,
        created_at: chrono::Utc::now().timestamp_millis(),
        updated_at: None,
    };
    store.put_table(&table)?;
    info!(
        "Created {} {} table {} ({})",
        table.table_type, table.data_source_format, table.name, table.table_id
    );
    Ok(table)
}

/// # Errors
/// `InvalidArgument` for a malformed id, `NotFound` if absent.
pub fn get_table(store: &MetaStore, table_id: &str) -> Result<TableInfo> {
    let table_id = TableId::new(table_id).map_err(lakelog_common::Error::from)?;
    store
        .get_table(&table_id)?
        .ok_or_else(|| lakelog_common::Error::TableNotFound(table_id.to_string()).into())
}

/// All registered tables, ordered by id.
///
/// # Errors
/// `Internal` on store failures.
pub fn list_tables(store: &MetaStore) -> Result<Vec<TableInfo>> {
    Ok(store.list_tables()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lakelog_common::{DataSourceFormat, TableType};
    use std::collections::HashMap;

    fn request(name: &str) -> CreateTableRequest {
        CreateTableRequest {
            name: name.to_string(),
            table_type: TableType::Managed,
            data_source_format: DataSourceFormat::Delta,
            storage_location: format!("s3://warehouse/{name}"),
            comment: None,
            properties: HashMap::new(),
            columns: Vec::new(),
        }
    }

    #[test]
    fn test_create_and_get() {
        let store = MetaStore::open_in_memory().unwrap();
        let table = create_table(&store, request("events")).unwrap();
        assert!(table.accepts_coordinated_commits());

        let loaded = get_table(&store, table.table_id.as_str()).unwrap();
        assert_eq!(loaded, table);
    }

    #[test]
    fn test_create_requires_name() {
        let store = MetaStore::open_in_memory().unwrap();
        let err = create_table(&store, request(" ")).unwrap_err();
        assert!(matches!(err, CommitError::InvalidArgument(_)));
    }

    #[test]
    fn test_get_missing() {
        let store = MetaStore::open_in_memory().unwrap();
        assert!(matches!(get_table(&store, "nope"), Err(CommitError::NotFound(_))));
        assert!(matches!(get_table(&store, ""), Err(CommitError::InvalidArgument(_))));
    }

    #[test]
    fn test_list_tables() {
        let store = MetaStore::open_in_memory().unwrap();
        assert!(list_tables(&store).unwrap().is_empty());
        create_table(&store, request("events")).unwrap();
        create_table(&store, request("clicks")).unwrap();

        let mut names: Vec<String> = list_tables(&store)
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["clicks", "events"]);
    }
}
