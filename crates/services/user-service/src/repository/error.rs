//! Store error taxonomy.
//!
//! Callers branch on [`StoreError::kind`] only. Engine codes travel along in
//! [`EngineDiagnostics`] for logging and are never part of the matchable surface.

use std::error::Error as _;

use domain::DomainError;
use sea_orm::DbErr;
use thiserror::Error;

use super::classifier::EngineDiagnostics;
use crate::context::Interrupted;

/// Stable, engine-independent error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    LoginAlreadyExists,
    UserNotFound,
    Canceled,
    DeadlineExceeded,
    InvalidLogin,
    StorageFault,
}

impl ErrorKind {
    /// Lowercase label, used for metrics outcomes.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::LoginAlreadyExists => "login_already_exists",
            ErrorKind::UserNotFound => "user_not_found",
            ErrorKind::Canceled => "canceled",
            ErrorKind::DeadlineExceeded => "deadline_exceeded",
            ErrorKind::InvalidLogin => "invalid_login",
            ErrorKind::StorageFault => "storage_fault",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the user store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{op}: login already exists")]
    LoginAlreadyExists {
        op: &'static str,
        #[source]
        source: DbErr,
    },

    #[error("{op}: user not found")]
    UserNotFound { op: &'static str },

    #[error("{op}: {reason}")]
    Interrupted {
        op: &'static str,
        reason: Interrupted,
    },

    #[error("{op}: invalid login")]
    InvalidLogin {
        op: &'static str,
        #[source]
        source: DomainError,
    },

    #[error("{op}: storage fault ({diagnostics})")]
    Storage {
        op: &'static str,
        diagnostics: EngineDiagnostics,
        #[source]
        source: DbErr,
    },

    #[error("{op}: store is closed, connection pool unavailable")]
    Closed { op: &'static str },
}

impl StoreError {
    /// Matchable kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::LoginAlreadyExists { .. } => ErrorKind::LoginAlreadyExists,
            StoreError::UserNotFound { .. } => ErrorKind::UserNotFound,
            StoreError::Interrupted {
                reason: Interrupted::Canceled,
                ..
            } => ErrorKind::Canceled,
            StoreError::Interrupted {
                reason: Interrupted::DeadlineExceeded,
                ..
            } => ErrorKind::DeadlineExceeded,
            StoreError::InvalidLogin { .. } => ErrorKind::InvalidLogin,
            StoreError::Storage { .. } | StoreError::Closed { .. } => ErrorKind::StorageFault,
        }
    }

    /// Get error code for clients
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::LoginAlreadyExists => "LOGIN_ALREADY_EXISTS",
            ErrorKind::UserNotFound => "USER_NOT_FOUND",
            ErrorKind::Canceled => "CANCELED",
            ErrorKind::DeadlineExceeded => "DEADLINE_EXCEEDED",
            ErrorKind::InvalidLogin => "INVALID_LOGIN",
            ErrorKind::StorageFault => "STORAGE_FAULT",
        }
    }

    /// Operation that produced the error
    pub fn operation(&self) -> &'static str {
        match self {
            StoreError::LoginAlreadyExists { op, .. }
            | StoreError::UserNotFound { op }
            | StoreError::Interrupted { op, .. }
            | StoreError::InvalidLogin { op, .. }
            | StoreError::Storage { op, .. }
            | StoreError::Closed { op } => *op,
        }
    }

    /// Engine code and message, for logging only
    pub fn diagnostics(&self) -> Option<&EngineDiagnostics> {
        match self {
            StoreError::Storage { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }

    /// Whether retrying with a fresh context may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Canceled | ErrorKind::DeadlineExceeded)
    }

    /// Get user-facing message (hides engine details)
    pub fn user_message(&self) -> String {
        match self {
            StoreError::LoginAlreadyExists { .. } => "Account already registered".to_string(),
            StoreError::UserNotFound { .. } => "No such account".to_string(),
            StoreError::Interrupted { .. } => "The request was interrupted".to_string(),
            StoreError::InvalidLogin {
                source: DomainError::Validation(msg),
                ..
            } => msg.clone(),
            StoreError::Storage { .. } | StoreError::Closed { .. } => {
                "A storage error occurred".to_string()
            }
        }
    }

    /// Render the cause chain, outermost first.
    ///
    /// Driver errors repeat their source's text in their own message, so a
    /// cause already present in the rendered text is skipped. Causes quoting
    /// the engine message already shown as diagnostics are skipped as well.
    pub fn chain(&self) -> String {
        let shown = self.diagnostics().map(|d| d.message.as_str());
        let mut rendered = self.to_string();
        let mut cause = self.source();
        while let Some(err) = cause {
            let text = err.to_string();
            let repeats_diagnostics = shown.is_some_and(|message| text.contains(message));
            if !repeats_diagnostics && !rendered.contains(&text) {
                rendered.push_str(": ");
                rendered.push_str(&text);
            }
            cause = err.source();
        }
        rendered
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
