//! Quiz-taking state machine.
//!
//! A [`QuizSession`] moves through `Loading -> Active -> Completed`. It owns no
//! clock: the host calls [`QuizSession::tick`] from its own loop, which keeps
//! every transition deterministic. One session is meant to be driven from a
//! single control flow; share the [`QuizDefinition`] instead of the session.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Question, QuizDefinition, QuizError, ScoreReport};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    /// No quiz definition has been supplied yet.
    Loading,
    /// Questions are being answered.
    Active,
    /// Terminal until `reset`.
    Completed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionStatus::Loading => "loading",
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        })
    }
}

/// Operation names used in `SessionError::InvalidState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    SelectAnswer,
    Advance,
    Retreat,
    Tick,
    Score,
    Reset,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::SelectAnswer => "select an answer",
            Operation::Advance => "advance",
            Operation::Retreat => "retreat",
            Operation::Tick => "tick",
            Operation::Score => "score",
            Operation::Reset => "reset",
        })
    }
}

/// Why a navigation step was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockedTransition {
    /// The current question has no recorded answer yet.
    Unanswered { position: usize },
    /// Already at the first question.
    AtFirstQuestion,
}

impl fmt::Display for BlockedTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockedTransition::Unanswered { position } => {
                write!(f, "question {} has not been answered", position + 1)
            }
            BlockedTransition::AtFirstQuestion => f.write_str("already at the first question"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("answer {index} is out of range for {options} options")]
    InvalidInput { index: usize, options: usize },

    #[error("invalid transition: {0}")]
    InvalidTransition(BlockedTransition),

    #[error("cannot {operation} while session is {status}")]
    InvalidState {
        operation: Operation,
        status: SessionStatus,
    },

    #[error(transparent)]
    Definition(#[from] QuizError),
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// Selected option per question position. Re-selecting overwrites.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord(BTreeMap<usize, usize>);

impl AnswerRecord {
    #[must_use]
    pub fn get(&self, position: usize) -> Option<usize> {
        self.0.get(&position).copied()
    }

    #[must_use]
    pub fn contains(&self, position: usize) -> bool {
        self.0.contains_key(&position)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `(position, option)` pairs in position order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.0.iter().map(|(p, o)| (*p, *o))
    }

    fn record(&mut self, position: usize, option: usize) {
        self.0.insert(position, option);
    }
}

/// Mutable state of one attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    position: usize,
    answers: AnswerRecord,
    remaining_secs: u32,
    completed: bool,
}

impl SessionState {
    fn fresh(quiz: &QuizDefinition) -> Self {
        Self {
            position: 0,
            answers: AnswerRecord::default(),
            remaining_secs: quiz.time_budget_secs(),
            completed: false,
        }
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerRecord {
        &self.answers
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

/// Read-only snapshot for rendering a progress bar and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProgress {
    pub position: usize,
    pub total: usize,
    pub answered: usize,
    pub remaining_secs: u32,
    pub is_complete: bool,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One attempt at a quiz.
#[derive(Debug, Clone, Default)]
pub struct QuizSession {
    quiz: Option<Arc<QuizDefinition>>,
    state: SessionState,
}

impl QuizSession {
    /// A session waiting for its quiz definition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for `new` followed by `start`.
    ///
    /// # Errors
    ///
    /// See [`QuizSession::start`].
    pub fn started(quiz: Arc<QuizDefinition>) -> Result<Self, SessionError> {
        let mut session = Self::new();
        session.start(quiz)?;
        Ok(session)
    }

    /// Begin a fresh attempt, replacing any attempt in progress.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Definition` if the quiz has no questions or no time budget.
    pub fn start(&mut self, quiz: Arc<QuizDefinition>) -> Result<(), SessionError> {
        if quiz.question_count() == 0 {
            return Err(QuizError::NoQuestions.into());
        }
        if quiz.time_budget_secs() == 0 {
            return Err(QuizError::ZeroTimeLimit.into());
        }
        self.state = SessionState::fresh(&quiz);
        self.quiz = Some(quiz);
        Ok(())
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        match (&self.quiz, self.state.completed) {
            (None, _) => SessionStatus::Loading,
            (Some(_), false) => SessionStatus::Active,
            (Some(_), true) => SessionStatus::Completed,
        }
    }

    #[must_use]
    pub fn quiz(&self) -> Option<&Arc<QuizDefinition>> {
        self.quiz.as_ref()
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.state.position
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.state.remaining_secs
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status() == SessionStatus::Completed
    }

    #[must_use]
    pub fn selected_answer(&self, position: usize) -> Option<usize> {
        self.state.answers.get(position)
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.quiz
            .as_ref()
            .and_then(|quiz| quiz.question(self.state.position))
    }

    #[must_use]
    pub fn is_last_question(&self) -> bool {
        self.quiz
            .as_ref()
            .is_some_and(|quiz| self.state.position + 1 == quiz.question_count())
    }

    #[must_use]
    pub fn progress(&self) -> Option<SessionProgress> {
        let quiz = self.quiz.as_ref()?;
        Some(SessionProgress {
            position: self.state.position,
            total: quiz.question_count(),
            answered: self.state.answers.len(),
            remaining_secs: self.state.remaining_secs,
            is_complete: self.state.completed,
        })
    }

    /// Record (or overwrite) the answer for the current question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless active and
    /// `SessionError::InvalidInput` if `option` is not a valid index.
    pub fn select_answer(&mut self, option: usize) -> Result<(), SessionError> {
        let quiz = self.active_quiz(Operation::SelectAnswer)?;
        let options = quiz
            .question(self.state.position)
            .map_or(0, Question::option_count);
        if option >= options {
            return Err(SessionError::InvalidInput {
                index: option,
                options,
            });
        }
        self.state.answers.record(self.state.position, option);
        Ok(())
    }

    /// Move to the next question, or complete the attempt from the last one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless active and
    /// `SessionError::InvalidTransition` if the current question is unanswered.
    pub fn advance(&mut self) -> Result<(), SessionError> {
        let count = self.active_quiz(Operation::Advance)?.question_count();
        let position = self.state.position;
        if !self.state.answers.contains(position) {
            return Err(SessionError::InvalidTransition(
                BlockedTransition::Unanswered { position },
            ));
        }
        if position + 1 < count {
            self.state.position += 1;
        } else {
            self.state.completed = true;
        }
        Ok(())
    }

    /// Move back one question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless active and
    /// `SessionError::InvalidTransition` at the first question.
    pub fn retreat(&mut self) -> Result<(), SessionError> {
        self.active_quiz(Operation::Retreat)?;
        if self.state.position == 0 {
            return Err(SessionError::InvalidTransition(
                BlockedTransition::AtFirstQuestion,
            ));
        }
        self.state.position -= 1;
        Ok(())
    }

    /// Consume `elapsed_secs` of the time budget. Running out completes the attempt.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless active.
    pub fn tick(&mut self, elapsed_secs: u32) -> Result<(), SessionError> {
        self.active_quiz(Operation::Tick)?;
        self.state.remaining_secs = self.state.remaining_secs.saturating_sub(elapsed_secs);
        if self.state.remaining_secs == 0 {
            self.state.completed = true;
        }
        Ok(())
    }

    /// Score a completed attempt. Unanswered questions count as incorrect.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless completed and
    /// `SessionError::Definition` if the quiz has no questions.
    pub fn score(&self) -> Result<ScoreReport, SessionError> {
        let quiz = self.require(Operation::Score, SessionStatus::Completed)?;
        let correct = quiz
            .questions()
            .iter()
            .enumerate()
            .filter(|(position, question)| {
                self.state
                    .answers
                    .get(*position)
                    .is_some_and(|option| question.is_correct(option))
            })
            .count();
        // `correct` is bounded by the question count, so only an empty quiz fails.
        ScoreReport::new(correct, quiz.question_count())
            .map_err(|_| SessionError::Definition(QuizError::NoQuestions))
    }

    /// Start the same quiz over: first question, no answers, full time budget.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless completed.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        let fresh = SessionState::fresh(self.require(Operation::Reset, SessionStatus::Completed)?);
        self.state = fresh;
        Ok(())
    }

    fn active_quiz(&self, operation: Operation) -> Result<&QuizDefinition, SessionError> {
        self.require(operation, SessionStatus::Active)
    }

    fn require(
        &self,
        operation: Operation,
        expected: SessionStatus,
    ) -> Result<&QuizDefinition, SessionError> {
        let status = self.status();
        match &self.quiz {
            Some(quiz) if status == expected => Ok(quiz),
            _ => Err(SessionError::InvalidState { operation, status }),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
