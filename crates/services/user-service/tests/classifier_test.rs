//! Classifier tests against errors produced by a real SQLite engine.

use common::DatabaseConfig;
use sea_orm::{ConnectionTrait, DbErr, Statement};

use user_service_lib::infra::Database;
use user_service_lib::repository::{
    EngineFailure, ErrorClassifier, GenericClassifier, PostgresClassifier, SqliteClassifier,
};

async fn open_db() -> Database {
    let mut config = DatabaseConfig::with_url("sqlite::memory:");
    config.max_connections = 1;

    let db = Database::connect(&config).await.unwrap();
    db.create_schema().await.unwrap();
    db
}

async fn execute(db: &Database, sql: &str) -> Result<(), DbErr> {
    db.connection()
        .execute(Statement::from_string(db.backend(), sql.to_string()))
        .await
        .map(|_| ())
}

#[tokio::test]
async fn test_sqlite_unique_login_is_conflict() {
    let db = open_db().await;
    execute(&db, "INSERT INTO users (login, password_hash) VALUES ('alice', x'AA')")
        .await
        .unwrap();

    let err = execute(&db, "INSERT INTO users (login, password_hash) VALUES ('alice', x'BB')")
        .await
        .unwrap_err();

    assert_eq!(SqliteClassifier.classify(&err), EngineFailure::LoginConflict);
    assert_eq!(GenericClassifier.classify(&err), EngineFailure::LoginConflict);
}

#[tokio::test]
async fn test_sqlite_not_null_is_fault_with_code() {
    let db = open_db().await;

    let err = execute(&db, "INSERT INTO users (login, password_hash) VALUES ('bob', NULL)")
        .await
        .unwrap_err();

    match SqliteClassifier.classify(&err) {
        EngineFailure::Fault(diagnostics) => {
            assert!(diagnostics.code.is_some());
            assert!(diagnostics.message.contains("NOT NULL"));
        }
        other => panic!("unexpected classification: {:?}", other),
    }
}

#[tokio::test]
async fn test_sqlite_unique_on_other_column_is_fault() {
    let db = open_db().await;
    execute(&db, "CREATE TABLE contacts (email TEXT NOT NULL UNIQUE)")
        .await
        .unwrap();
    execute(&db, "INSERT INTO contacts (email) VALUES ('a@example.com')")
        .await
        .unwrap();

    let err = execute(&db, "INSERT INTO contacts (email) VALUES ('a@example.com')")
        .await
        .unwrap_err();

    assert!(matches!(
        SqliteClassifier.classify(&err),
        EngineFailure::Fault(_)
    ));
}

#[tokio::test]
async fn test_sqlite_syntax_error_is_fault() {
    let db = open_db().await;

    let err = execute(&db, "INSERT INTO missing_table VALUES (1)")
        .await
        .unwrap_err();

    match SqliteClassifier.classify(&err) {
        EngineFailure::Fault(diagnostics) => {
            assert!(diagnostics.message.contains("missing_table"));
        }
        other => panic!("unexpected classification: {:?}", other),
    }
}

#[tokio::test]
async fn test_postgres_classifier_ignores_sqlite_codes() {
    let db = open_db().await;
    execute(&db, "INSERT INTO users (login, password_hash) VALUES ('carol', x'01')")
        .await
        .unwrap();

    let err = execute(&db, "INSERT INTO users (login, password_hash) VALUES ('carol', x'02')")
        .await
        .unwrap_err();

    // SQLite codes are not SQLSTATEs, so the Postgres strategy reports a fault
    assert!(matches!(
        PostgresClassifier.classify(&err),
        EngineFailure::Fault(_)
    ));
}
