//! Engine-specific error classification.
//!
//! Each storage engine reports constraint violations and interruptions with
//! its own codes. An [`ErrorClassifier`] turns a raw [`DbErr`] into an
//! [`EngineFailure`] so the store never looks at vendor codes itself.

use std::fmt::Debug;
use std::sync::Arc;

use sea_orm::sqlx::error::DatabaseError;
use sea_orm::{DbBackend, DbErr, RuntimeErr, SqlErr};

use super::entities::user::LOGIN_COLUMN;

/// Postgres `unique_violation`
const PG_UNIQUE_VIOLATION: &str = "23505";
/// Postgres `query_canceled`
const PG_QUERY_CANCELED: &str = "57014";
/// SQLite `SQLITE_CONSTRAINT_UNIQUE` (extended code)
const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";
/// SQLite `SQLITE_CONSTRAINT` (primary code)
const SQLITE_CONSTRAINT: &str = "19";
/// SQLite `SQLITE_INTERRUPT`
const SQLITE_INTERRUPT: &str = "9";

/// Original engine code and message of a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineDiagnostics {
    pub code: Option<String>,
    pub message: String,
}

impl EngineDiagnostics {
    /// Extract diagnostics from any `DbErr`.
    pub fn from_db_err(err: &DbErr) -> Self {
        match database_error(err) {
            Some(db_err) => Self {
                code: db_err.code().map(|c| c.into_owned()),
                message: db_err.message().to_string(),
            },
            None => Self {
                code: None,
                message: err.to_string(),
            },
        }
    }
}

impl std::fmt::Display for EngineDiagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// What an engine failure means to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineFailure {
    /// The login uniqueness constraint rejected the write
    LoginConflict,
    /// The engine aborted the statement
    Interrupted,
    /// Anything else
    Fault(EngineDiagnostics),
}

/// Strategy mapping raw engine errors for one storage engine.
pub trait ErrorClassifier: Send + Sync + Debug {
    /// Engine name, for logs
    fn engine(&self) -> &'static str;

    fn classify(&self, err: &DbErr) -> EngineFailure;
}

/// Postgres SQLSTATE classification.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresClassifier;

impl ErrorClassifier for PostgresClassifier {
    fn engine(&self) -> &'static str {
        "postgres"
    }

    fn classify(&self, err: &DbErr) -> EngineFailure {
        let Some(db_err) = database_error(err) else {
            return EngineFailure::Fault(EngineDiagnostics::from_db_err(err));
        };

        match db_err.code().as_deref() {
            // Constraint name is "users_login_key" for the bootstrap schema
            Some(PG_UNIQUE_VIOLATION)
                if db_err
                    .constraint()
                    .map_or(true, |name| name.contains(LOGIN_COLUMN)) =>
            {
                EngineFailure::LoginConflict
            }
            Some(PG_QUERY_CANCELED) => EngineFailure::Interrupted,
            _ => EngineFailure::Fault(EngineDiagnostics::from_db_err(err)),
        }
    }
}

/// SQLite extended result code classification.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteClassifier;

impl ErrorClassifier for SqliteClassifier {
    fn engine(&self) -> &'static str {
        "sqlite"
    }

    fn classify(&self, err: &DbErr) -> EngineFailure {
        let Some(db_err) = database_error(err) else {
            return EngineFailure::Fault(EngineDiagnostics::from_db_err(err));
        };

        let message = db_err.message();
        // "UNIQUE constraint failed: users.login"
        let names_login = message.contains(&format!(".{}", LOGIN_COLUMN));

        match db_err.code().as_deref() {
            Some(SQLITE_CONSTRAINT_UNIQUE) if names_login => EngineFailure::LoginConflict,
            Some(SQLITE_CONSTRAINT)
                if names_login && message.starts_with("UNIQUE constraint failed") =>
            {
                EngineFailure::LoginConflict
            }
            Some(SQLITE_INTERRUPT) => EngineFailure::Interrupted,
            _ => EngineFailure::Fault(EngineDiagnostics::from_db_err(err)),
        }
    }
}

/// Fallback for engines without a dedicated classifier.
///
/// Relies on SeaORM's portable unique-violation detection.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericClassifier;

impl ErrorClassifier for GenericClassifier {
    fn engine(&self) -> &'static str {
        "generic"
    }

    fn classify(&self, err: &DbErr) -> EngineFailure {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => EngineFailure::LoginConflict,
            _ => EngineFailure::Fault(EngineDiagnostics::from_db_err(err)),
        }
    }
}

/// Pick the classifier matching a connection's backend.
pub fn classifier_for(backend: DbBackend) -> Arc<dyn ErrorClassifier> {
    match backend {
        DbBackend::Postgres => Arc::new(PostgresClassifier),
        DbBackend::Sqlite => Arc::new(SqliteClassifier),
        _ => Arc::new(GenericClassifier),
    }
}

/// Driver-level database error wrapped inside a `DbErr`, if any.
fn database_error(err: &DbErr) -> Option<&dyn DatabaseError> {
    match err {
        DbErr::Exec(RuntimeErr::SqlxError(e))
        | DbErr::Query(RuntimeErr::SqlxError(e))
        | DbErr::Conn(RuntimeErr::SqlxError(e)) => e.as_database_error(),
        _ => None,
    }
}
