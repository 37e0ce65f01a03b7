use std::sync::Arc;

use storage::catalog::StaticCatalog;
use storage::repository::Storage;

use crate::Clock;
use crate::auth::{
    AuthSessionManager, HostedIdentityConfig, HostedIdentityProvider, IdentityProvider,
    InMemoryIdentityProvider,
};
use crate::catalog_service::CatalogService;
use crate::error::AppServicesError;
use crate::progress_service::ProgressService;
use crate::quiz_run::QuizRunService;

/// Which identity backend the app is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityBackend {
    Hosted,
    Development,
}

/// Assembles app-facing services over one `Storage`.
#[derive(Clone)]
pub struct AppServices {
    identity_backend: IdentityBackend,
    catalog: Arc<CatalogService>,
    quiz_runs: Arc<QuizRunService>,
    progress: Arc<ProgressService>,
    auth: Arc<AuthSessionManager>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and the bundled catalog.
    ///
    /// The identity provider is hosted when `HostedIdentityConfig::from_env`
    /// finds a configuration, otherwise the development provider.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the catalog or storage cannot be initialized.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url, StaticCatalog::sample()?).await?;
        Ok(Self::from_storage(
            storage,
            clock,
            HostedIdentityConfig::from_env(),
        ))
    }

    /// In-memory storage with the development identity provider.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Catalog` if the bundled catalog is invalid.
    pub fn in_memory(clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::in_memory(StaticCatalog::sample()?);
        Ok(Self::from_storage(storage, clock, None))
    }

    #[must_use]
    pub fn from_storage(
        storage: Storage,
        clock: Clock,
        hosted: Option<HostedIdentityConfig>,
    ) -> Self {
        let (identity_backend, provider): (IdentityBackend, Arc<dyn IdentityProvider>) =
            match hosted {
                Some(config) => {
                    tracing::info!(base_url = %config.base_url, "using hosted identity provider");
                    (
                        IdentityBackend::Hosted,
                        Arc::new(HostedIdentityProvider::new(config, clock)),
                    )
                }
                None => {
                    tracing::info!("using development identity provider");
                    (
                        IdentityBackend::Development,
                        Arc::new(InMemoryIdentityProvider::new(clock)),
                    )
                }
            };

        let catalog = Arc::new(CatalogService::new(Arc::clone(&storage.catalog)));
        let quiz_runs = Arc::new(QuizRunService::new(
            clock,
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.attempts),
        ));
        let progress = Arc::new(ProgressService::new(
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.attempts),
        ));
        let auth = Arc::new(AuthSessionManager::new(
            clock,
            provider,
            Arc::clone(&storage.profiles),
        ));

        Self {
            identity_backend,
            catalog,
            quiz_runs,
            progress,
            auth,
        }
    }

    #[must_use]
    pub fn identity_backend(&self) -> IdentityBackend {
        self.identity_backend
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<CatalogService> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn quiz_runs(&self) -> Arc<QuizRunService> {
        Arc::clone(&self.quiz_runs)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn auth(&self) -> Arc<AuthSessionManager> {
        Arc::clone(&self.auth)
    }
}
