//! End-to-end coordinated commits behaviour through the HTTP router.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use lakelog_commits::{CommitsState, router};
use lakelog_common::config::CommitsConfig;
use lakelog_meta_store::MetaStore;
use serde_json::{Value, json};
use tower::ServiceExt;

struct Harness {
    router: Router,
}

fn make_harness(config: CommitsConfig) -> Harness {
    let store = Arc::new(MetaStore::open_in_memory().unwrap());
    Harness {
        router: router(CommitsState::new(store, config)),
    }
}

impl Harness {
    async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn create_table(&self, table_type: &str, format: &str) -> String {
        let (status, body) = self
            .request(
                Method::POST,
                "/tables",
                Some(json!({
                    "name": "events",
                    "tableType": table_type,
                    "dataSourceFormat": format,
                    "storageLocation": "s3://warehouse/events"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["tableId"].as_str().unwrap().to_string()
    }

    async fn commit(&self, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, "/coordinated-commits", Some(body))
            .await
    }

    async fn get_commits(&self, table_id: &str, start: i64) -> (StatusCode, Value) {
        let uri = format!(
            "/coordinated-commits?table_id={table_id}&table_uri=s3://warehouse/events&start_version={start}"
        );
        self.request(Method::GET, &uri, None).await
    }
}

fn commit_body(table_id: &str, version: i64) -> Value {
    json!({
        "tableId": table_id,
        "tableUri": "s3://warehouse/events",
        "commitInfo": {
            "version": version,
            "timestamp": 1_700_000_000_000_i64 + version,
            "fileName": format!("{version:020}.4f1c.json"),
            "fileSize": 100,
            "fileModificationTimestamp": 1_700_000_000_000_i64
        }
    })
}

fn versions(body: &Value) -> Vec<i64> {
    body["commits"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["commitInfo"]["version"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn commit_lifecycle_matches_example_scenario() {
    let h = make_harness(CommitsConfig::default());
    let table_id = h.create_table("MANAGED", "DELTA").await;

    let (status, body) = h.get_commits(&table_id, 0).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["latestTableVersion"], -1);
    assert_eq!(versions(&body), Vec::<i64>::new());

    let (status, _) = h.commit(commit_body(&table_id, 1)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = h.get_commits(&table_id, 0).await;
    assert_eq!(versions(&body), vec![1]);
    assert_eq!(body["commits"][0]["commitInfo"]["fileSize"], 100);

    let (status, body) = h.commit(commit_body(&table_id, 1)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["errorCode"], "ALREADY_EXISTS");

    for v in 2..=3 {
        let (status, _) = h.commit(commit_body(&table_id, v)).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (_, body) = h.get_commits(&table_id, 0).await;
    assert_eq!(versions(&body), vec![1, 2, 3]);
    assert_eq!(body["latestTableVersion"], 3);

    let (status, _) = h
        .commit(json!({
            "tableId": table_id,
            "tableUri": "s3://warehouse/events",
            "latestBackfilledVersion": 2
        }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = h.get_commits(&table_id, 0).await;
    assert_eq!(versions(&body), vec![3]);
    assert_eq!(body["latestTableVersion"], 3);
}

#[tokio::test]
async fn rejects_invalid_requests() {
    let h = make_harness(CommitsConfig::default());
    let table_id = h.create_table("MANAGED", "DELTA").await;

    let mut body = commit_body(&table_id, 1);
    body["tableUri"] = json!("");
    let (status, body) = h.commit(body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "INVALID_ARGUMENT");

    let (status, _) = h.commit(commit_body("00000000-unknown", 1)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = h
        .request(
            Method::GET,
            &format!("/coordinated-commits?table_id={table_id}&table_uri=s3://warehouse/events"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn non_delta_tables_fail_precondition() {
    let h = make_harness(CommitsConfig::default());
    let external = h.create_table("EXTERNAL", "DELTA").await;
    let (status, body) = h.commit(commit_body(&external, 1)).await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(body["errorCode"], "FAILED_PRECONDITION");

    let iceberg = h.create_table("MANAGED", "ICEBERG").await;
    let (status, _) = h.get_commits(&iceberg, 0).await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
}

#[tokio::test]
async fn ceiling_returns_too_many_requests_until_backfilled() {
    let h = make_harness(CommitsConfig {
        max_commits_per_table: 2,
        ..CommitsConfig::default()
    });
    let table_id = h.create_table("MANAGED", "DELTA").await;
    for v in 0..=1 {
        let (status, _) = h.commit(commit_body(&table_id, v)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = h.commit(commit_body(&table_id, 2)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["errorCode"], "RESOURCE_EXHAUSTED");

    let mut body = commit_body(&table_id, 2);
    body["latestBackfilledVersion"] = json!(1);
    let (status, _) = h.commit(body).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = h.get_commits(&table_id, 0).await;
    assert_eq!(versions(&body), vec![2]);
}

#[tokio::test]
async fn commit_metadata_updates_table() {
    let h = make_harness(CommitsConfig::default());
    let table_id = h.create_table("MANAGED", "DELTA").await;

    let mut body = commit_body(&table_id, 0);
    body["metadata"] = json!({
        "description": "click events",
        "properties": {"delta.checkpointPolicy": "v2"},
        "schema": {"columns": [{"name": "id", "typeText": "bigint", "position": 0}]}
    });
    let (status, _) = h.commit(body).await;
    assert_eq!(status, StatusCode::OK);

    let (status, table) = h
        .request(Method::GET, &format!("/tables/{table_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(table["comment"], "click events");
    assert_eq!(table["properties"]["delta.checkpointPolicy"], "v2");
    assert_eq!(table["columns"][0]["name"], "id");

    let (status, body) = h.request(Method::GET, "/tables", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tables"].as_array().unwrap().len(), 1);
    assert_eq!(body["tables"][0]["tableId"], table_id.as_str());
}

#[tokio::test]
async fn health_and_metrics_endpoints() {
    let h = make_harness(CommitsConfig::default());
    let table_id = h.create_table("MANAGED", "DELTA").await;
    h.commit(commit_body(&table_id, 0)).await;
    h.commit(commit_body(&table_id, 0)).await;

    let (status, body) = h.request(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let req = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let response = h.router.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("lakelog_commits_accepted_total{kind=\"first\"} 1"));
    assert!(text.contains("lakelog_commit_conflicts_total 1"));
}
