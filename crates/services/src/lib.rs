#![forbid(unsafe_code)]

pub mod app_services;
pub mod auth;
pub mod catalog_service;
pub mod error;
pub mod progress_service;
pub mod quiz_run;

pub use quiz_core::Clock;

pub use app_services::{AppServices, IdentityBackend};
pub use auth::{
    AuthEvent, AuthEventKind, AuthSession, AuthSessionManager, AuthState, AuthUser,
    HostedIdentityConfig, HostedIdentityProvider, IdentityProvider, InMemoryIdentityProvider,
    SignUpOutcome, Subscription,
};
pub use catalog_service::CatalogService;
pub use error::{
    AppServicesError, AuthError, CatalogError, ProfileSetupError, ProgressError, QuizRunError,
};
pub use progress_service::{
    Achievement, AttemptListItem, LeaderboardEntry, ProgressService, UserProgress,
};
pub use quiz_run::{FinishedRun, QuizRun, QuizRunService};
