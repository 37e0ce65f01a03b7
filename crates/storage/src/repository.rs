use async_trait::async_trait;
use quiz_core::model::{
    Category, CategoryId, Profile, QuizAttempt, QuizDefinition, QuizId, QuizSummary, UserId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::catalog::StaticCatalog;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted attempt plus its storage id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRow {
    pub id: i64,
    pub attempt: QuizAttempt,
}

impl AttemptRow {
    #[must_use]
    pub fn new(id: i64, attempt: QuizAttempt) -> Self {
        Self { id, attempt }
    }
}

/// Aggregated attempt counts for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserTotals {
    pub user_id: UserId,
    pub attempts: u32,
    pub correct: u64,
    pub total: u64,
}

/// Read-only source of quiz content, keyed by category and quiz id.
#[async_trait]
pub trait QuizCatalog: Send + Sync {
    /// List every category in display order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing source is unavailable.
    async fn list_categories(&self) -> Result<Vec<Category>, StorageError>;

    /// List the quizzes of one category.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown category.
    async fn list_quizzes(&self, category: &CategoryId) -> Result<Vec<QuizSummary>, StorageError>;

    /// Fetch the full question set of a quiz.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the category or quiz is unknown, or
    /// the quiz has no question set.
    async fn get_quiz(
        &self,
        category: &CategoryId,
        quiz: &QuizId,
    ) -> Result<Arc<QuizDefinition>, StorageError>;
}

/// Repository contract for user profiles.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Insert a new profile.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id or username is taken.
    async fn insert_profile(&self, profile: &Profile) -> Result<(), StorageError>;

    /// Fetch a profile by user id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for storage failures.
    async fn get_profile(&self, id: UserId) -> Result<Option<Profile>, StorageError>;

    /// Fetch the profiles that exist among `ids`; missing ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for storage failures.
    async fn get_profiles(&self, ids: &[UserId]) -> Result<Vec<Profile>, StorageError>;
}

/// Repository contract for finished quiz attempts.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Append an attempt and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be stored.
    async fn append_attempt(&self, attempt: &QuizAttempt) -> Result<i64, StorageError>;

    /// Fetch an attempt by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn get_attempt(&self, id: i64) -> Result<QuizAttempt, StorageError>;

    /// List a user's attempts, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for storage failures.
    async fn list_attempts_for_user(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<AttemptRow>, StorageError>;

    /// Per-user totals ordered by correct answers descending, then user id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for storage failures.
    async fn user_totals(&self, limit: u32) -> Result<Vec<UserTotals>, StorageError>;
}

#[derive(Default)]
struct InMemoryState {
    profiles: HashMap<UserId, Profile>,
    attempts: Vec<(i64, QuizAttempt)>,
    next_attempt_id: i64,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, InMemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl ProfileRepository for InMemoryRepository {
    async fn insert_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let taken = guard.profiles.contains_key(&profile.id())
            || guard
                .profiles
                .values()
                .any(|p| p.username().eq_ignore_ascii_case(profile.username()));
        if taken {
            return Err(StorageError::Conflict);
        }
        guard.profiles.insert(profile.id(), profile.clone());
        Ok(())
    }

    async fn get_profile(&self, id: UserId) -> Result<Option<Profile>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.profiles.get(&id).cloned())
    }

    async fn get_profiles(&self, ids: &[UserId]) -> Result<Vec<Profile>, StorageError> {
        let guard = self.lock()?;
        Ok(ids
            .iter()
            .filter_map(|id| guard.profiles.get(id).cloned())
            .collect())
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn append_attempt(&self, attempt: &QuizAttempt) -> Result<i64, StorageError> {
        let mut guard = self.lock()?;
        guard.next_attempt_id += 1;
        let id = guard.next_attempt_id;
        guard.attempts.push((id, attempt.clone()));
        Ok(id)
    }

    async fn get_attempt(&self, id: i64) -> Result<QuizAttempt, StorageError> {
        let guard = self.lock()?;
        guard
            .attempts
            .iter()
            .find(|(row_id, _)| *row_id == id)
            .map(|(_, attempt)| attempt.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn list_attempts_for_user(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<AttemptRow>, StorageError> {
        let guard = self.lock()?;
        let mut rows: Vec<AttemptRow> = guard
            .attempts
            .iter()
            .filter(|(_, attempt)| attempt.user_id() == user)
            .map(|(id, attempt)| AttemptRow::new(*id, attempt.clone()))
            .collect();
        rows.sort_by(|a, b| {
            b.attempt
                .completed_at()
                .cmp(&a.attempt.completed_at())
                .then(b.id.cmp(&a.id))
        });
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(rows)
    }

    async fn user_totals(&self, limit: u32) -> Result<Vec<UserTotals>, StorageError> {
        let guard = self.lock()?;
        let mut by_user: HashMap<UserId, UserTotals> = HashMap::new();
        for (_, attempt) in &guard.attempts {
            let entry = by_user.entry(attempt.user_id()).or_insert(UserTotals {
                user_id: attempt.user_id(),
                attempts: 0,
                correct: 0,
                total: 0,
            });
            entry.attempts = entry.attempts.saturating_add(1);
            entry.correct += u64::from(attempt.correct());
            entry.total += u64::from(attempt.total());
        }
        let mut totals: Vec<UserTotals> = by_user.into_values().collect();
        totals.sort_by(|a, b| b.correct.cmp(&a.correct).then(a.user_id.cmp(&b.user_id)));
        totals.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(totals)
    }
}

/// Aggregates the content source and repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub catalog: Arc<dyn QuizCatalog>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
}

impl Storage {
    /// In-memory repositories over the given catalog.
    #[must_use]
    pub fn in_memory(catalog: StaticCatalog) -> Self {
        let repo = InMemoryRepository::new();
        let profiles: Arc<dyn ProfileRepository> = Arc::new(repo.clone());
        let attempts: Arc<dyn AttemptRepository> = Arc::new(repo);
        Self {
            catalog: Arc::new(catalog),
            profiles,
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quiz_core::time::fixed_now;

    fn attempt(user: UserId, correct: u32, minutes_later: i64) -> QuizAttempt {
        let now = fixed_now();
        QuizAttempt::from_persisted(
            user,
            QuizId::new("geo-1").unwrap(),
            CategoryId::new("geography").unwrap(),
            correct,
            3,
            now,
            now + Duration::minutes(minutes_later),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn profiles_reject_duplicate_usernames() {
        let repo = InMemoryRepository::new();
        let first = Profile::new(UserId::random(), "QuizMaster", fixed_now()).unwrap();
        let second = Profile::new(UserId::random(), "quizmaster", fixed_now()).unwrap();

        repo.insert_profile(&first).await.unwrap();
        assert!(matches!(
            repo.insert_profile(&second).await,
            Err(StorageError::Conflict)
        ));
        assert_eq!(
            repo.get_profile(first.id()).await.unwrap().unwrap().username(),
            "QuizMaster"
        );
        assert!(repo.get_profile(second.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn attempts_list_newest_first_with_limit() {
        let repo = InMemoryRepository::new();
        let user = UserId::random();
        let other = UserId::random();
        let a = repo.append_attempt(&attempt(user, 1, 1)).await.unwrap();
        let b = repo.append_attempt(&attempt(user, 2, 5)).await.unwrap();
        repo.append_attempt(&attempt(other, 3, 9)).await.unwrap();

        let rows = repo.list_attempts_for_user(user, 10).await.unwrap();
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![b, a]);

        let rows = repo.list_attempts_for_user(user, 1).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].attempt.correct(), 2);

        assert_eq!(repo.get_attempt(a).await.unwrap().correct(), 1);
        assert!(matches!(
            repo.get_attempt(999).await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn user_totals_rank_by_correct_answers() {
        let repo = InMemoryRepository::new();
        let low = UserId::random();
        let high = UserId::random();
        repo.append_attempt(&attempt(low, 1, 1)).await.unwrap();
        repo.append_attempt(&attempt(high, 3, 1)).await.unwrap();
        repo.append_attempt(&attempt(high, 2, 2)).await.unwrap();

        let totals = repo.user_totals(10).await.unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].user_id, high);
        assert_eq!(totals[0].correct, 5);
        assert_eq!(totals[0].attempts, 2);
        assert_eq!(totals[0].total, 6);
        assert_eq!(totals[1].user_id, low);
    }
}
