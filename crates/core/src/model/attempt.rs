use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{CategoryId, QuizId, UserId};
use crate::model::score::ScoreReport;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("attempt must have at least one question")]
    EmptyAttempt,

    #[error("correct answers ({correct}) exceed total questions ({total})")]
    CountMismatch { correct: u32, total: u32 },

    #[error("too many questions for a single attempt: {len}")]
    TooManyQuestions { len: usize },
}

/// Persisted result of one finished quiz attempt by a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizAttempt {
    user_id: UserId,
    quiz_id: QuizId,
    category: CategoryId,
    correct: u32,
    total: u32,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
}

impl QuizAttempt {
    /// Rehydrate an attempt from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` if the counts or timestamps are inconsistent.
    pub fn from_persisted(
        user_id: UserId,
        quiz_id: QuizId,
        category: CategoryId,
        correct: u32,
        total: u32,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, AttemptError> {
        if completed_at < started_at {
            return Err(AttemptError::InvalidTimeRange);
        }
        if total == 0 {
            return Err(AttemptError::EmptyAttempt);
        }
        if correct > total {
            return Err(AttemptError::CountMismatch { correct, total });
        }

        Ok(Self {
            user_id,
            quiz_id,
            category,
            correct,
            total,
            started_at,
            completed_at,
        })
    }

    /// Build an attempt from a score report.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::InvalidTimeRange` if `completed_at` is before `started_at`.
    /// Returns `AttemptError::TooManyQuestions` if the counts cannot fit in `u32`.
    pub fn from_report(
        user_id: UserId,
        quiz_id: QuizId,
        category: CategoryId,
        report: &ScoreReport,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, AttemptError> {
        let total = u32::try_from(report.total())
            .map_err(|_| AttemptError::TooManyQuestions { len: report.total() })?;
        let correct = u32::try_from(report.correct())
            .map_err(|_| AttemptError::TooManyQuestions { len: report.total() })?;

        Self::from_persisted(
            user_id,
            quiz_id,
            category,
            correct,
            total,
            started_at,
            completed_at,
        )
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn quiz_id(&self) -> &QuizId {
        &self.quiz_id
    }

    #[must_use]
    pub fn category(&self) -> &CategoryId {
        &self.category
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    /// Percentage score, recomputed with the same rounding as `ScoreReport`.
    #[must_use]
    pub fn percentage(&self) -> u8 {
        ScoreReport::new(self.correct as usize, self.total as usize)
            .map_or(0, |report| report.percentage())
    }
}
