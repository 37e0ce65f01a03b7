use std::sync::Arc;

use chrono::{DateTime, Utc};
use quiz_core::model::{CategoryId, QuizAttempt, QuizId, ScoreReport, UserId};
use quiz_core::{Clock, QuizSession};
use storage::repository::{AttemptRepository, QuizCatalog, StorageError};

use crate::error::QuizRunError;

/// One attempt at a quiz: the engine session plus when it began.
#[derive(Debug, Clone)]
pub struct QuizRun {
    category: CategoryId,
    quiz_id: QuizId,
    started_at: DateTime<Utc>,
    session: QuizSession,
}

impl QuizRun {
    #[must_use]
    pub fn category(&self) -> &CategoryId {
        &self.category
    }

    #[must_use]
    pub fn quiz_id(&self) -> &QuizId {
        &self.quiz_id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    /// Mutable access for driving the engine (answers, navigation, ticks).
    pub fn session_mut(&mut self) -> &mut QuizSession {
        &mut self.session
    }
}

/// Outcome of finishing a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinishedRun {
    pub report: ScoreReport,
    /// Storage id of the persisted attempt; `None` for anonymous runs.
    pub attempt_id: Option<i64>,
}

/// Starts quiz runs from the catalog and records finished ones.
#[derive(Clone)]
pub struct QuizRunService {
    clock: Clock,
    catalog: Arc<dyn QuizCatalog>,
    attempts: Arc<dyn AttemptRepository>,
}

impl QuizRunService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn QuizCatalog>,
        attempts: Arc<dyn AttemptRepository>,
    ) -> Self {
        Self {
            clock,
            catalog,
            attempts,
        }
    }

    /// Load a quiz and start a fresh session on it.
    ///
    /// # Errors
    ///
    /// Returns `QuizRunError::NotFound` if the category or quiz is unknown or
    /// has no question set.
    /// Returns `QuizRunError::Storage` for other content source failures.
    pub async fn start(
        &self,
        category: &CategoryId,
        quiz_id: &QuizId,
    ) -> Result<QuizRun, QuizRunError> {
        let quiz = match self.catalog.get_quiz(category, quiz_id).await {
            Ok(quiz) => quiz,
            Err(StorageError::NotFound) => {
                tracing::warn!(%category, quiz = %quiz_id, "quiz not found");
                return Err(QuizRunError::NotFound {
                    category: category.clone(),
                    quiz: quiz_id.clone(),
                });
            }
            Err(err) => return Err(err.into()),
        };

        let session = QuizSession::started(quiz)?;
        tracing::debug!(%category, quiz = %quiz_id, "quiz run started");

        Ok(QuizRun {
            category: category.clone(),
            quiz_id: quiz_id.clone(),
            started_at: self.clock.now(),
            session,
        })
    }

    /// Start a completed run over on the same quiz with a fresh `started_at`.
    ///
    /// # Errors
    ///
    /// Returns `QuizRunError::Session` if the run is not completed.
    pub fn restart(&self, run: &mut QuizRun) -> Result<(), QuizRunError> {
        run.session.reset()?;
        run.started_at = self.clock.now();
        Ok(())
    }

    /// Score a completed run and persist it for a signed-in user.
    ///
    /// Anonymous runs (`user == None`) are scored but not stored.
    ///
    /// # Errors
    ///
    /// Returns `QuizRunError::Session` if the run is not completed.
    /// Returns `QuizRunError::Attempt` or `QuizRunError::Storage` if the
    /// attempt cannot be recorded.
    pub async fn finish(
        &self,
        run: &QuizRun,
        user: Option<UserId>,
    ) -> Result<FinishedRun, QuizRunError> {
        let report = run.session.score()?;

        let Some(user_id) = user else {
            return Ok(FinishedRun {
                report,
                attempt_id: None,
            });
        };

        let completed_at = self.clock.now().max(run.started_at);
        let attempt = QuizAttempt::from_report(
            user_id,
            run.quiz_id.clone(),
            run.category.clone(),
            &report,
            run.started_at,
            completed_at,
        )?;
        let attempt_id = self.attempts.append_attempt(&attempt).await?;
        tracing::info!(
            user = %user_id,
            quiz = %run.quiz_id,
            correct = report.correct(),
            total = report.total(),
            attempt_id,
            "quiz attempt recorded"
        );

        Ok(FinishedRun {
            report,
            attempt_id: Some(attempt_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::SessionError;
    use quiz_core::model::Feedback;
    use quiz_core::time::fixed_now;
    use storage::catalog::StaticCatalog;
    use storage::repository::InMemoryRepository;

    fn service(repo: &InMemoryRepository) -> QuizRunService {
        QuizRunService::new(
            Clock::Fixed(fixed_now()),
            Arc::new(StaticCatalog::sample().unwrap()),
            Arc::new(repo.clone()),
        )
    }

    fn ids(category: &str, quiz: &str) -> (CategoryId, QuizId) {
        (CategoryId::new(category).unwrap(), QuizId::new(quiz).unwrap())
    }

    fn answer_all(run: &mut QuizRun, answers: &[usize]) {
        let session = run.session_mut();
        for (i, answer) in answers.iter().enumerate() {
            session.select_answer(*answer).unwrap();
            if i + 1 < answers.len() {
                session.advance().unwrap();
            }
        }
        session.advance().unwrap();
    }

    #[tokio::test]
    async fn start_loads_quiz_with_full_budget() {
        let repo = InMemoryRepository::new();
        let (category, quiz) = ids("science", "science-1");
        let run = service(&repo).start(&category, &quiz).await.unwrap();
        assert_eq!(run.session().remaining_secs(), 900);
        assert_eq!(run.session().position(), 0);
        assert_eq!(run.started_at(), fixed_now());
    }

    #[tokio::test]
    async fn start_reports_missing_quiz() {
        let repo = InMemoryRepository::new();
        let (category, quiz) = ids("science", "science-2");
        let err = service(&repo).start(&category, &quiz).await.unwrap_err();
        assert!(matches!(err, QuizRunError::NotFound { .. }));
    }

    #[tokio::test]
    async fn finish_persists_for_signed_in_user() {
        let repo = InMemoryRepository::new();
        let service = service(&repo);
        let (category, quiz) = ids("science", "science-1");
        let mut run = service.start(&category, &quiz).await.unwrap();
        answer_all(&mut run, &[1, 2, 1]);

        let user = UserId::random();
        let finished = service.finish(&run, Some(user)).await.unwrap();
        assert_eq!(finished.report.correct(), 2);
        assert_eq!(finished.report.percentage(), 67);
        assert_eq!(finished.report.feedback(), Feedback::Good);

        let id = finished.attempt_id.expect("persisted");
        let stored = repo.get_attempt(id).await.unwrap();
        assert_eq!(stored.user_id(), user);
        assert_eq!(stored.correct(), 2);
        assert_eq!(stored.total(), 3);
    }

    #[tokio::test]
    async fn finish_skips_persistence_for_anonymous_runs() {
        let repo = InMemoryRepository::new();
        let service = service(&repo);
        let (category, quiz) = ids("science", "science-1");
        let mut run = service.start(&category, &quiz).await.unwrap();
        answer_all(&mut run, &[1, 2, 0]);

        let finished = service.finish(&run, None).await.unwrap();
        assert_eq!(finished.report.percentage(), 100);
        assert!(finished.attempt_id.is_none());
        assert!(repo.user_totals(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn restart_resets_completed_run() {
        let repo = InMemoryRepository::new();
        let service = service(&repo);
        let (category, quiz) = ids("geography", "geo-1");
        let mut run = service.start(&category, &quiz).await.unwrap();
        let fresh = run.session().state().clone();

        assert!(service.restart(&mut run).is_err());
        answer_all(&mut run, &[2, 3, 2]);
        service.restart(&mut run).unwrap();
        assert_eq!(run.session().state(), &fresh);
    }

    #[tokio::test]
    async fn finish_rejects_unfinished_run() {
        let repo = InMemoryRepository::new();
        let service = service(&repo);
        let (category, quiz) = ids("science", "science-1");
        let run = service.start(&category, &quiz).await.unwrap();
        let err = service.finish(&run, Some(UserId::random())).await.unwrap_err();
        assert!(matches!(
            err,
            QuizRunError::Session(SessionError::InvalidState { .. })
        ));
    }
}
