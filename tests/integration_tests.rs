//! Integration tests for firebird-rs against a real Firebird server
//!
//! These tests require a running Firebird instance with legacy
//! authentication enabled. Set the following environment variables:
//! - FIREBIRD_HOST: server host (default: localhost)
//! - FIREBIRD_PORT: server port (default: 3050)
//! - FIREBIRD_DATABASE: database path on the server (default: /tmp/firebird_rs_test.fdb)
//! - FIREBIRD_USER: user name (default: SYSDBA)
//! - FIREBIRD_PASSWORD: password (default: masterkey)
//!
//! Run with: cargo test --test integration_tests -- --ignored --test-threads=1

use std::time::Duration;

use firebird_rs::{
    ArrayBound, ArraySlice, Config, Database, Error, ServiceManager, StatementType,
    TransactionOptions, UserData, Value,
};

/// Get test configuration from environment or use defaults
fn get_test_config() -> Config {
    let host = std::env::var("FIREBIRD_HOST").unwrap_or_else(|_| "localhost".to_string());
    let port: u16 = std::env::var("FIREBIRD_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3050);
    let database = std::env::var("FIREBIRD_DATABASE")
        .unwrap_or_else(|_| "/tmp/firebird_rs_test.fdb".to_string());
    let user = std::env::var("FIREBIRD_USER").unwrap_or_else(|_| "SYSDBA".to_string());
    let password = std::env::var("FIREBIRD_PASSWORD").unwrap_or_else(|_| "masterkey".to_string());

    Config::new(host, database, user, password).port(port)
}

/// Attach to the test database, creating it on first use
async fn connect() -> Result<Database, Error> {
    let config = get_test_config();
    match Database::connect(config.clone()).await {
        Ok(db) => Ok(db),
        Err(Error::Isc(_)) => Database::create(config).await,
        Err(e) => Err(e),
    }
}

/// Run one statement in its own transaction, ignoring a failure
async fn execute_quietly(db: &Database, sql: &str) {
    let Ok(mut tx) = db.begin_transaction(TransactionOptions::default()).await else {
        return;
    };
    let mut stmt = db.create_statement(&tx);
    let ok = stmt.prepare(sql).await.is_ok() && stmt.execute(&[]).await.is_ok();
    if ok {
        let _ = tx.commit().await;
    } else {
        let _ = tx.rollback().await;
    }
}

mod connection_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Firebird database"]
    async fn test_connect_and_detach() {
        let db = connect().await.expect("Failed to connect");
        assert!(!db.is_closed());
        assert!(db.protocol_version().await.unwrap() >= 10);

        db.ping().await.expect("ping failed");
        assert!(db.page_size().await.unwrap() >= 4096);
        assert!(db.server_version().await.is_some());

        db.detach().await.expect("Failed to detach");
        assert!(db.is_closed());
    }

    #[tokio::test]
    #[ignore = "requires Firebird database"]
    async fn test_wrong_password() {
        let mut config = get_test_config();
        config.set_password("definitely-wrong");
        let err = Database::connect(config).await.unwrap_err();
        assert!(matches!(err, Error::Isc(_)));
    }

    #[tokio::test]
    #[ignore = "requires Firebird database"]
    async fn test_detach_with_open_transaction() {
        let db = connect().await.expect("Failed to connect");
        let mut tx = db.begin_transaction(TransactionOptions::default()).await.unwrap();

        let err = db.detach().await.unwrap_err();
        assert_eq!(err.error_code(), Some(firebird_rs::constants::isc::OPEN_TRANS));

        tx.rollback().await.unwrap();
        db.detach().await.unwrap();
    }
}

mod query_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Firebird database"]
    async fn test_select_from_rdb_database() {
        let db = connect().await.expect("Failed to connect");
        let mut tx = db.begin_transaction(TransactionOptions::default()).await.unwrap();

        let mut stmt = db.create_statement(&tx);
        stmt.prepare("SELECT 1 AS ONE, CAST('abc' AS VARCHAR(10)) AS TXT, CAST(NULL AS INTEGER) FROM RDB$DATABASE")
            .await
            .unwrap();
        assert_eq!(stmt.statement_type(), StatementType::Select);
        stmt.execute(&[]).await.unwrap();

        let row = stmt.fetch().await.unwrap().expect("one row");
        assert_eq!(row.get_i64(0), Some(1));
        assert_eq!(row.get_by_name("TXT").and_then(Value::as_str), Some("abc"));
        assert!(row.is_null(2));
        assert!(stmt.fetch().await.unwrap().is_none());

        tx.commit().await.unwrap();
        db.detach().await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires Firebird database"]
    async fn test_insert_select_roundtrip() {
        let db = connect().await.expect("Failed to connect");
        execute_quietly(&db, "DROP TABLE FBRS_ITEMS").await;
        execute_quietly(
            &db,
            "CREATE TABLE FBRS_ITEMS (ID INTEGER NOT NULL, NAME VARCHAR(40), PRICE NUMERIC(10,2), CREATED TIMESTAMP)",
        )
        .await;

        let mut tx = db.begin_transaction(TransactionOptions::default()).await.unwrap();
        let mut insert = db.create_statement(&tx);
        insert
            .prepare("INSERT INTO FBRS_ITEMS (ID, NAME, PRICE, CREATED) VALUES (?, ?, ?, ?)")
            .await
            .unwrap();
        let created = chrono::NaiveDate::from_ymd_opt(2024, 2, 29)
            .and_then(|d| d.and_hms_milli_opt(13, 45, 10, 250))
            .unwrap();
        for id in 1..=25 {
            insert
                .execute(&[
                    Value::from(id),
                    Value::from(format!("item {}", id)),
                    Value::from(rust_decimal::Decimal::new(id as i64 * 150, 2)),
                    Value::from(created),
                ])
                .await
                .unwrap();
            assert_eq!(insert.records_affected(), 1);
        }
        tx.commit_retaining().await.unwrap();

        let mut select = db.create_statement(&tx);
        select.set_fetch_size(10);
        select
            .prepare("SELECT ID, NAME, PRICE, CREATED FROM FBRS_ITEMS ORDER BY ID")
            .await
            .unwrap();
        select.execute(&[]).await.unwrap();
        let rows = select.fetch_all().await.unwrap();
        assert_eq!(rows.len(), 25);
        assert_eq!(rows[24].get_string(1), Some("item 25"));
        assert_eq!(
            rows[1].get(2).and_then(Value::as_decimal),
            Some(rust_decimal::Decimal::new(300, 2))
        );
        assert_eq!(rows[0].get(3).and_then(Value::as_timestamp), Some(created));

        tx.commit().await.unwrap();
        execute_quietly(&db, "DROP TABLE FBRS_ITEMS").await;
        db.detach().await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires Firebird database"]
    async fn test_plan() {
        let db = connect().await.expect("Failed to connect");
        let mut tx = db.begin_transaction(TransactionOptions::default()).await.unwrap();
        let mut stmt = db.create_statement(&tx);
        stmt.prepare("SELECT * FROM RDB$RELATIONS").await.unwrap();
        let plan = stmt.plan().await.unwrap();
        assert!(plan.contains("RDB$RELATIONS"));
        tx.commit().await.unwrap();
        db.detach().await.unwrap();
    }
}

mod blob_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Firebird database"]
    async fn test_blob_roundtrip() {
        let db = connect().await.expect("Failed to connect");
        let mut tx = db.begin_transaction(TransactionOptions::default()).await.unwrap();

        let text = "firebird ".repeat(10_000);
        let mut blob = db.create_blob(&tx).await.unwrap();
        blob.write_string(&text).await.unwrap();

        let mut blob = db.open_blob(&tx, blob.id()).await.unwrap();
        assert_eq!(blob.read_string().await.unwrap(), text);

        tx.commit().await.unwrap();
        db.detach().await.unwrap();
    }
}

mod array_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Firebird database"]
    async fn test_array_roundtrip() {
        let db = connect().await.expect("Failed to connect");
        execute_quietly(&db, "DROP TABLE FBRS_ARRAYS").await;
        execute_quietly(&db, "CREATE TABLE FBRS_ARRAYS (ID INTEGER, VALS INTEGER[1:4])").await;

        let mut tx = db.begin_transaction(TransactionOptions::default()).await.unwrap();
        let array = db.array(&tx, "FBRS_ARRAYS", "VALS").await.unwrap();
        assert_eq!(array.desc().bounds, vec![ArrayBound::new(1, 4)]);

        let slice = ArraySlice {
            bounds: vec![ArrayBound::new(1, 4)],
            values: (10..14).map(Value::from).collect(),
        };
        let id = array.put_slice(&tx, &slice).await.unwrap();
        let read = array.get_slice(&tx, id).await.unwrap();
        assert_eq!(read.values, slice.values);

        tx.commit().await.unwrap();
        execute_quietly(&db, "DROP TABLE FBRS_ARRAYS").await;
        db.detach().await.unwrap();
    }
}

mod event_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Firebird database"]
    async fn test_event_posted_from_block() {
        let db = connect().await.expect("Failed to connect");
        let subscription = db.queue_events(&["FBRS_EVENT"]).await.unwrap();

        execute_quietly(
            &db,
            "EXECUTE BLOCK AS BEGIN POST_EVENT 'FBRS_EVENT'; POST_EVENT 'FBRS_EVENT'; END",
        )
        .await;

        let counts = tokio::time::timeout(Duration::from_secs(10), subscription.wait())
            .await
            .expect("event not delivered")
            .unwrap();
        assert!(counts.get("FBRS_EVENT").copied().unwrap_or(0) >= 1);
        db.detach().await.unwrap();
    }
}

mod service_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Firebird database"]
    async fn test_service_manager_users() {
        let mut service = ServiceManager::attach(get_test_config()).await.unwrap();
        assert!(!service.server_version().await.unwrap().is_empty());

        let _ = service.delete_user("FBRS_USER").await;
        let mut user = UserData::new("FBRS_USER", "secret");
        user.first_name = Some("Test".into());
        service.add_user(&user).await.unwrap();

        let users = service.display_users().await.unwrap();
        assert!(users.iter().any(|u| u.user_name == "FBRS_USER"));

        service.delete_user("FBRS_USER").await.unwrap();
        service.detach().await.unwrap();
    }
}
