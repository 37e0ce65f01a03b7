use std::sync::Arc;

use quiz_core::model::{Category, CategoryId, QuizId, QuizSummary};
use storage::repository::{QuizCatalog, StorageError};

use crate::error::CatalogError;

/// Read-side access to categories and quiz listings.
#[derive(Clone)]
pub struct CatalogService {
    catalog: Arc<dyn QuizCatalog>,
}

impl CatalogService {
    #[must_use]
    pub fn new(catalog: Arc<dyn QuizCatalog>) -> Self {
        Self { catalog }
    }

    /// List every category.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if the content source fails.
    pub async fn list_categories(&self) -> Result<Vec<Category>, CatalogError> {
        Ok(self.catalog.list_categories().await?)
    }

    /// List the quizzes of a category.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::UnknownCategory` if the category does not exist.
    /// Returns `CatalogError::Storage` for other content source failures.
    pub async fn list_quizzes(
        &self,
        category: &CategoryId,
    ) -> Result<Vec<QuizSummary>, CatalogError> {
        match self.catalog.list_quizzes(category).await {
            Ok(quizzes) => Ok(quizzes),
            Err(StorageError::NotFound) => {
                tracing::warn!(%category, "unknown category requested");
                Err(CatalogError::UnknownCategory(category.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Find one quiz listing within a category.
    ///
    /// Returns `Ok(None)` when the category exists but does not list the quiz.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`CatalogService::list_quizzes`].
    pub async fn quiz_summary(
        &self,
        category: &CategoryId,
        quiz: &QuizId,
    ) -> Result<Option<QuizSummary>, CatalogError> {
        let quizzes = self.list_quizzes(category).await?;
        Ok(quizzes.into_iter().find(|summary| &summary.id == quiz))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::catalog::StaticCatalog;

    fn service() -> CatalogService {
        CatalogService::new(Arc::new(StaticCatalog::sample().unwrap()))
    }

    #[tokio::test]
    async fn lists_quizzes_for_known_category() {
        let service = service();
        let science = CategoryId::new("science").unwrap();
        let quizzes = service.list_quizzes(&science).await.unwrap();
        assert_eq!(quizzes.len(), 2);
        assert!(quizzes.iter().all(|q| q.category == science));

        let summary = service
            .quiz_summary(&science, &QuizId::new("science-1").unwrap())
            .await
            .unwrap()
            .expect("listed");
        assert_eq!(summary.question_count, 3);
    }

    #[tokio::test]
    async fn quiz_summary_is_scoped_to_its_category() {
        let service = service();
        let science = CategoryId::new("science").unwrap();
        let geo = QuizId::new("geo-1").unwrap();
        assert!(service.quiz_summary(&science, &geo).await.unwrap().is_none());
        assert!(matches!(
            service
                .quiz_summary(&CategoryId::new("astrology").unwrap(), &geo)
                .await,
            Err(CatalogError::UnknownCategory(_))
        ));
    }

    #[tokio::test]
    async fn unknown_category_is_reported() {
        let service = service();
        let missing = CategoryId::new("astrology").unwrap();
        let err = service.list_quizzes(&missing).await.unwrap_err();
        assert!(matches!(err, CatalogError::UnknownCategory(id) if id == missing));
    }
}
