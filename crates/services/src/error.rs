//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::SessionError;
use quiz_core::model::{AttemptError, CategoryId, ProfileError, QuizId};
use storage::catalog::CatalogBuildError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `CatalogService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("unknown category: {0}")]
    UnknownCategory(CategoryId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `QuizRunService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizRunError {
    #[error("quiz {quiz} not found in category {category}")]
    NotFound { category: CategoryId, quiz: QuizId },
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by identity providers and the auth session manager.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error("invalid email address")]
    InvalidEmail,
    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("email is already registered")]
    EmailTaken,
    #[error("not signed in")]
    NotSignedIn,
    #[error("account requires email confirmation before sign-in")]
    ConfirmationRequired,
    #[error("identity provider rejected the request: {0}")]
    Rejected(String),
    #[error("identity provider returned status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("identity provider returned a malformed response: {0}")]
    MalformedResponse(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Reported when a sign-up succeeded but its profile could not be created.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProfileSetupError {
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Catalog(#[from] CatalogBuildError),
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
