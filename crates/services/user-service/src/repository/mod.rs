//! Repository layer for data access.

pub mod classifier;
pub mod entities;
mod error;
mod user_repository;

pub use classifier::{
    classifier_for, EngineDiagnostics, EngineFailure, ErrorClassifier, GenericClassifier,
    PostgresClassifier, SqliteClassifier,
};
pub use error::{ErrorKind, StoreError, StoreResult};
pub use user_repository::{UserRepository, UserStore};

// Export mock for tests (both unit and integration)
#[cfg(any(test, feature = "test-utils"))]
pub use user_repository::MockUserRepository;
