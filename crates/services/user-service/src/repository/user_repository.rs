//! User repository implementation backed by a SeaORM connection pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, NotSet, QueryFilter, Set,
};

use super::classifier::{classifier_for, EngineDiagnostics, EngineFailure, ErrorClassifier};
use super::entities::user::{self, ActiveModel, Entity as UserEntity};
use super::error::{StoreError, StoreResult};
use crate::context::{Interrupted, RequestContext};
use domain::{validate_login, User};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

const OP_SAVE: &str = "user_store.save";
const OP_FIND_BY_LOGIN: &str = "user_store.find_by_login";
const OP_CLOSE: &str = "user_store.close";

/// User repository trait for dependency injection.
///
/// Implementations hold no per-user state between calls; every call is one
/// round trip to the storage engine.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user and return its engine-assigned id
    async fn save(
        &self,
        ctx: &RequestContext,
        login: &str,
        password_hash: &[u8],
    ) -> StoreResult<i64>;

    /// Find a user by exact login
    async fn find_by_login(&self, ctx: &RequestContext, login: &str) -> StoreResult<User>;

    /// Release the underlying pool. Safe to call more than once.
    async fn close(&self) -> StoreResult<()>;
}

/// Concrete implementation of UserRepository over a shared connection pool
pub struct UserStore {
    db: DatabaseConnection,
    classifier: Arc<dyn ErrorClassifier>,
    closed: AtomicBool,
}

impl UserStore {
    /// Create a store using the classifier matching the connection's backend
    pub fn new(db: DatabaseConnection) -> Self {
        let classifier = classifier_for(db.get_database_backend());
        Self::with_classifier(db, classifier)
    }

    /// Create a store with an explicit error classifier
    pub fn with_classifier(db: DatabaseConnection, classifier: Arc<dyn ErrorClassifier>) -> Self {
        Self {
            db,
            classifier,
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self, op: &'static str) -> StoreResult<()> {
        if self.is_closed() {
            return Err(StoreError::Closed { op });
        }
        Ok(())
    }

    /// Translate an engine error into the store taxonomy.
    ///
    /// A login conflict is reported as such even if the context expired
    /// meanwhile. For aborts and faults an
    /// interrupted context takes precedence over what the engine reported.
    fn map_db_err(&self, op: &'static str, ctx: &RequestContext, err: DbErr) -> StoreError {
        let failure = self.classifier.classify(&err);
        if failure != EngineFailure::LoginConflict {
            if let Some(reason) = ctx.interruption() {
                tracing::debug!(op, %reason, error = %err, "Engine error after context interruption");
                return StoreError::Interrupted { op, reason };
            }
        }

        match failure {
            EngineFailure::LoginConflict => StoreError::LoginAlreadyExists { op, source: err },
            EngineFailure::Interrupted => {
                tracing::warn!(
                    op,
                    engine = self.classifier.engine(),
                    diagnostics = %EngineDiagnostics::from_db_err(&err),
                    "Statement aborted by storage engine"
                );
                StoreError::Interrupted {
                    op,
                    reason: Interrupted::Canceled,
                }
            }
            EngineFailure::Fault(diagnostics) => {
                tracing::error!(
                    op,
                    engine = self.classifier.engine(),
                    code = diagnostics.code.as_deref().unwrap_or("-"),
                    message = %diagnostics.message,
                    error = ?err,
                    "Storage fault"
                );
                StoreError::Storage {
                    op,
                    diagnostics,
                    source: err,
                }
            }
        }
    }
}

impl std::fmt::Debug for UserStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserStore")
            .field("backend", &self.db.get_database_backend())
            .field("classifier", &self.classifier)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[async_trait]
impl UserRepository for UserStore {
    async fn save(
        &self,
        ctx: &RequestContext,
        login: &str,
        password_hash: &[u8],
    ) -> StoreResult<i64> {
        self.ensure_open(OP_SAVE)?;
        validate_login(login).map_err(|source| StoreError::InvalidLogin { op: OP_SAVE, source })?;

        // Single INSERT ... RETURNING; the uniqueness constraint rejects racing writers
        let active_model = ActiveModel {
            id: NotSet,
            login: Set(login.to_owned()),
            password_hash: Set(password_hash.to_vec()),
        };

        let inserted = ctx
            .run(UserEntity::insert(active_model).exec(&self.db))
            .await
            .map_err(|reason| StoreError::Interrupted { op: OP_SAVE, reason })?
            .map_err(|err| self.map_db_err(OP_SAVE, ctx, err))?;

        tracing::debug!(id = inserted.last_insert_id, "User saved");
        Ok(inserted.last_insert_id)
    }

    async fn find_by_login(&self, ctx: &RequestContext, login: &str) -> StoreResult<User> {
        self.ensure_open(OP_FIND_BY_LOGIN)?;

        let found = ctx
            .run(
                UserEntity::find()
                    .filter(user::Column::Login.eq(login))
                    .one(&self.db),
            )
            .await
            .map_err(|reason| StoreError::Interrupted {
                op: OP_FIND_BY_LOGIN,
                reason,
            })?
            .map_err(|err| self.map_db_err(OP_FIND_BY_LOGIN, ctx, err))?;

        found
            .map(User::from)
            .ok_or(StoreError::UserNotFound {
                op: OP_FIND_BY_LOGIN,
            })
    }

    async fn close(&self) -> StoreResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        // Closing a clone closes the shared pool behind every handle
        self.db.clone().close().await.map_err(|err| {
            let diagnostics = EngineDiagnostics::from_db_err(&err);
            tracing::error!(diagnostics = %diagnostics, "Failed to close connection pool");
            StoreError::Storage {
                op: OP_CLOSE,
                diagnostics,
                source: err,
            }
        })?;

        tracing::info!("User store closed");
        Ok(())
    }
}
