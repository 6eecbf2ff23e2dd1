//! Google Sheets client against a mock server

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::sync::Arc;

use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use botsrv::integrations::google_auth::StaticTokenSource;
use botsrv::integrations::{GoogleSheetsClient, GridStore, WriteSummary};
use botsrv::BotError;

fn client(server: &MockServer) -> GoogleSheetsClient {
    GoogleSheetsClient::new(
        reqwest::Client::new(),
        server.uri(),
        Arc::new(StaticTokenSource("token-1".to_string())),
    )
}

fn meta(rows: usize, columns: usize) -> Value {
    json!({
        "sheets": [
            {"properties": {"sheetId": 1, "title": "Other", "gridProperties": {"rowCount": 5, "columnCount": 5}}},
            {"properties": {"sheetId": 42, "title": "Stuckup", "gridProperties": {"rowCount": rows, "columnCount": columns}}}
        ]
    })
}

#[tokio::test]
async fn test_read_renders_cells_as_trimmed_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/sheet-1/values/'Source'!A1:C"))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "range": "Source!A1:C3",
            "values": [["ID", " Status "], [1, "SOC_Packed", true]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let values = client(&server).read("sheet-1", "Source", "A1:C").await.unwrap();

    assert_eq!(
        values,
        vec![
            vec!["ID".to_string(), "Status".to_string()],
            vec!["1".to_string(), "SOC_Packed".to_string(), "true".to_string()],
        ]
    );
}

#[tokio::test]
async fn test_read_of_empty_range_has_no_values() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/v4/spreadsheets/sheet-1/values/.*Sync%20Log.*$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"range": "x"})))
        .mount(&server)
        .await;

    let values = client(&server).read("sheet-1", "Sync Log", "A2:B200").await.unwrap();
    assert!(values.is_empty());
}

#[tokio::test]
async fn test_api_error_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let err = client(&server).read("sheet-1", "Source", "A1").await.unwrap_err();
    assert!(matches!(err, BotError::Api { status: 403, .. }));
}

#[tokio::test]
async fn test_write_uses_user_entered_values() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v4/spreadsheets/sheet-1/values/'Stuckup'!A1"))
        .and(query_param("valueInputOption", "USER_ENTERED"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "updatedRows": 2, "updatedColumns": 2, "updatedCells": 4
        })))
        .expect(1)
        .mount(&server)
        .await;

    let rows = vec![
        vec!["ID".to_string(), "Hub".to_string()],
        vec!["1".to_string(), "North".to_string()],
    ];
    let summary = client(&server).write("sheet-1", "Stuckup", "A1", &rows).await.unwrap();

    assert_eq!(
        summary,
        WriteSummary {
            updated_rows: 2,
            updated_columns: 2,
            updated_cells: 4
        }
    );
    let sent = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&sent[0].body).unwrap();
    assert_eq!(body["majorDimension"], "ROWS");
    assert_eq!(body["values"][1][1], "North");
}

#[tokio::test]
async fn test_clear_posts_to_clear_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v4/spreadsheets/sheet-1/values/'Stuckup'!A:C:clear"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).clear("sheet-1", "Stuckup", "A:C").await.unwrap();
}

#[tokio::test]
async fn test_ensure_min_size_grows_only_what_is_short() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/sheet-1"))
        .and(query_param("fields", "sheets.properties"))
        .respond_with(ResponseTemplate::new(200).set_body_json(meta(100, 3)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v4/spreadsheets/sheet-1:batchUpdate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).ensure_min_size("sheet-1", "Stuckup", 50, 10).await.unwrap();

    let sent = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&sent[1].body).unwrap();
    let update = &body["requests"][0]["updateSheetProperties"];
    assert_eq!(update["properties"]["sheetId"], 42);
    assert_eq!(update["properties"]["gridProperties"], json!({"columnCount": 10}));
    assert_eq!(update["fields"], "gridProperties.columnCount");
}

#[tokio::test]
async fn test_ensure_min_size_is_noop_when_large_enough() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/sheet-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(meta(1000, 26)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    client(&server).ensure_min_size("sheet-1", "Stuckup", 10, 5).await.unwrap();
}

#[tokio::test]
async fn test_ensure_min_size_unknown_worksheet() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(meta(10, 10)))
        .mount(&server)
        .await;

    let err = client(&server)
        .ensure_min_size("sheet-1", "Missing", 1, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, BotError::InvalidInput(_)));
}
