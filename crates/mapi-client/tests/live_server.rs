//! Tests against a running MonetDB server.
//!
//! All tests are `#[ignore]`d and skip themselves when the environment is
//! not configured.
//!
//! Run with:
//!   MAPI_TEST_HOST=localhost \
//!   MAPI_TEST_PORT=50000 \
//!   MAPI_TEST_DATABASE=demo \
//!   MAPI_TEST_USER=monetdb \
//!   MAPI_TEST_PASSWORD=monetdb \
//!   cargo test -p mapi-client --test live_server -- --ignored

#![allow(clippy::unwrap_used, clippy::expect_used)]

use mapi_client::{Client, Config, QueryKind};

fn get_test_config() -> Option<Config> {
    let host = std::env::var("MAPI_TEST_HOST").ok()?;
    let port = std::env::var("MAPI_TEST_PORT").unwrap_or_else(|_| "50000".into());
    let database = std::env::var("MAPI_TEST_DATABASE").unwrap_or_else(|_| "demo".into());
    let user = std::env::var("MAPI_TEST_USER").unwrap_or_else(|_| "monetdb".into());
    let password = std::env::var("MAPI_TEST_PASSWORD").unwrap_or_else(|_| "monetdb".into());

    let conn_str = format!(
        "host={host};port={port};database={database};username={user};password={password}"
    );
    Config::from_connection_string(&conn_str).ok()
}

#[tokio::test]
#[ignore = "Requires MonetDB"]
async fn test_live_select_one() {
    let Some(config) = get_test_config() else {
        return;
    };

    let mut client = Client::connect(config).await.expect("connect");
    let value = client.query_scalar("SELECT 1").await.unwrap();
    assert_eq!(value.as_deref(), Some("1"));
    client.close().await.unwrap();
}

#[tokio::test]
#[ignore = "Requires MonetDB"]
async fn test_live_table_round_trip() {
    let Some(config) = get_test_config() else {
        return;
    };

    let client = Client::connect(config).await.expect("connect");
    let mut tx = client.begin_transaction().await.unwrap();
    tx.execute_non_query("CREATE TABLE mapi_live_test (id INT, name VARCHAR(20))")
        .await
        .unwrap();
    tx.execute_non_query("INSERT INTO mapi_live_test VALUES (1, 'one'), (2, NULL)")
        .await
        .unwrap();

    let mut stream = tx.execute("SELECT id, name FROM mapi_live_test ORDER BY id").await.unwrap();
    let set = stream.next_result_set().await.unwrap().unwrap();
    assert_eq!(set.kind(), QueryKind::Table);
    assert_eq!(set.columns()[0].type_name, "int");
    let rows = stream.collect_rows().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows[1].is_null(1));
    drop(stream);

    tx.rollback().await.unwrap();
}

#[tokio::test]
#[ignore = "Requires MonetDB"]
async fn test_live_catalog() {
    let Some(config) = get_test_config() else {
        return;
    };
    let database = config.database.clone();

    let mut client = Client::connect(config).await.expect("connect");
    let schemas = client.catalog().schemas(Some("sys")).await;
    assert_eq!(schemas.len(), 1);
    assert_eq!(schemas[0].catalog, database);

    let columns = client.catalog().columns(Some("sys"), Some("tables"), None).await;
    assert!(columns.iter().any(|c| c.name == "name"));
}
