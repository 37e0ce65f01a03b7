use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{QuestionId, QuizId};
use crate::model::question::{Question, QuestionDraft, QuestionError};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// A quiz definition violates its invariants.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz title cannot be empty")]
    EmptyTitle,

    #[error("quiz must contain at least one question")]
    NoQuestions,

    #[error("duplicate question id: {0}")]
    DuplicateQuestionId(QuestionId),

    #[error("time limit must be at least one minute")]
    ZeroTimeLimit,

    #[error("invalid question at position {position}: {source}")]
    Question {
        position: usize,
        #[source]
        source: QuestionError,
    },
}

//
// ─── QUIZ DEFINITION ───────────────────────────────────────────────────────────
//

/// Unvalidated quiz definition as supplied by a content source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizDraft {
    pub id: QuizId,
    pub title: String,
    pub questions: Vec<QuestionDraft>,
    pub time_limit_minutes: u32,
}

impl QuizDraft {
    /// Validate the draft and every question it contains.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` on a blank title, zero questions, a zero time limit,
    /// duplicate question ids, or the first invalid question.
    pub fn validate(self) -> Result<QuizDefinition, QuizError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(QuizError::EmptyTitle);
        }
        if self.questions.is_empty() {
            return Err(QuizError::NoQuestions);
        }
        if self.time_limit_minutes == 0 {
            return Err(QuizError::ZeroTimeLimit);
        }

        let mut seen = HashSet::with_capacity(self.questions.len());
        let mut questions = Vec::with_capacity(self.questions.len());
        for (position, draft) in self.questions.into_iter().enumerate() {
            if !seen.insert(draft.id.clone()) {
                return Err(QuizError::DuplicateQuestionId(draft.id));
            }
            let question = draft
                .validate()
                .map_err(|source| QuizError::Question { position, source })?;
            questions.push(question);
        }

        Ok(QuizDefinition {
            id: self.id,
            title: title.to_owned(),
            questions,
            time_limit_minutes: self.time_limit_minutes,
        })
    }
}

/// Immutable ordered set of questions plus metadata.
///
/// Sessions hold it behind an `Arc`, so one definition can back any number of
/// concurrent attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuizDraft", into = "QuizDraft")]
pub struct QuizDefinition {
    id: QuizId,
    title: String,
    questions: Vec<Question>,
    time_limit_minutes: u32,
}

impl QuizDefinition {
    /// Creates a validated definition from already validated questions.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` on a blank title, zero questions, a zero time limit
    /// or duplicate question ids.
    pub fn new(
        id: QuizId,
        title: impl Into<String>,
        questions: Vec<Question>,
        time_limit_minutes: u32,
    ) -> Result<Self, QuizError> {
        QuizDraft {
            id,
            title: title.into(),
            questions: questions.into_iter().map(QuestionDraft::from).collect(),
            time_limit_minutes,
        }
        .validate()
    }

    #[must_use]
    pub fn id(&self) -> &QuizId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, position: usize) -> Option<&Question> {
        self.questions.get(position)
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn time_limit_minutes(&self) -> u32 {
        self.time_limit_minutes
    }

    /// Full time budget of one attempt in seconds.
    #[must_use]
    pub fn time_budget_secs(&self) -> u32 {
        self.time_limit_minutes.saturating_mul(60)
    }
}

impl TryFrom<QuizDraft> for QuizDefinition {
    type Error = QuizError;

    fn try_from(draft: QuizDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

impl From<QuizDefinition> for QuizDraft {
    fn from(quiz: QuizDefinition) -> Self {
        Self {
            id: quiz.id,
            title: quiz.title,
            questions: quiz.questions.into_iter().map(QuestionDraft::from).collect(),
            time_limit_minutes: quiz.time_limit_minutes,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
