use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question prompt cannot be empty")]
    EmptyPrompt,

    #[error("question needs at least 2 options, got {count}")]
    TooFewOptions { count: usize },

    #[error("option {index} is empty")]
    EmptyOption { index: usize },

    #[error("correct option {correct} is out of range for {options} options")]
    CorrectOutOfRange { correct: usize, options: usize },
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Unvalidated question as supplied by a content source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub id: QuestionId,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
}

impl QuestionDraft {
    /// Validate the draft into an immutable `Question`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when the prompt or an option is blank, fewer than
    /// two options are given, or the correct index does not point at an option.
    pub fn validate(self) -> Result<Question, QuestionError> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if self.options.len() < 2 {
            return Err(QuestionError::TooFewOptions {
                count: self.options.len(),
            });
        }
        if let Some(index) = self.options.iter().position(|o| o.trim().is_empty()) {
            return Err(QuestionError::EmptyOption { index });
        }
        if self.correct_answer >= self.options.len() {
            return Err(QuestionError::CorrectOutOfRange {
                correct: self.correct_answer,
                options: self.options.len(),
            });
        }

        Ok(Question {
            id: self.id,
            text: text.to_owned(),
            options: self.options,
            correct_answer: self.correct_answer,
        })
    }
}

/// A multiple-choice question. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuestionDraft", into = "QuestionDraft")]
pub struct Question {
    id: QuestionId,
    text: String,
    options: Vec<String>,
    correct_answer: usize,
}

impl Question {
    /// Creates a validated question.
    ///
    /// # Errors
    ///
    /// See [`QuestionDraft::validate`].
    pub fn new(
        id: QuestionId,
        text: impl Into<String>,
        options: Vec<String>,
        correct_answer: usize,
    ) -> Result<Self, QuestionError> {
        QuestionDraft {
            id,
            text: text.into(),
            options,
            correct_answer,
        }
        .validate()
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    #[must_use]
    pub fn correct_answer(&self) -> usize {
        self.correct_answer
    }

    #[must_use]
    pub fn is_correct(&self, option: usize) -> bool {
        option == self.correct_answer
    }
}

impl TryFrom<QuestionDraft> for Question {
    type Error = QuestionError;

    fn try_from(draft: QuestionDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

impl From<Question> for QuestionDraft {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            text: q.text,
            options: q.options,
            correct_answer: q.correct_answer,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn qid(raw: &str) -> QuestionId {
        QuestionId::new(raw).unwrap()
    }

    fn opts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn question_new_happy_path() {
        let q = Question::new(
            qid("q1"),
            "  What is the SI unit of force? ",
            opts(&["Watt", "Newton", "Joule", "Pascal"]),
            1,
        )
        .unwrap();
        assert_eq!(q.text(), "What is the SI unit of force?");
        assert_eq!(q.option_count(), 4);
        assert!(q.is_correct(1));
        assert!(!q.is_correct(0));
    }

    #[test]
    fn question_rejects_single_option() {
        let err = Question::new(qid("q1"), "Only one?", opts(&["yes"]), 0).unwrap_err();
        assert_eq!(err, QuestionError::TooFewOptions { count: 1 });
    }

    #[test]
    fn question_rejects_correct_out_of_range() {
        let err = Question::new(qid("q1"), "Pick", opts(&["a", "b"]), 2).unwrap_err();
        assert_eq!(
            err,
            QuestionError::CorrectOutOfRange {
                correct: 2,
                options: 2
            }
        );
    }

    #[test]
    fn question_rejects_blank_prompt_and_options() {
        assert_eq!(
            Question::new(qid("q1"), "  ", opts(&["a", "b"]), 0).unwrap_err(),
            QuestionError::EmptyPrompt
        );
        assert_eq!(
            Question::new(qid("q1"), "Pick", opts(&["a", " "]), 0).unwrap_err(),
            QuestionError::EmptyOption { index: 1 }
        );
    }

    #[test]
    fn question_deserialize_runs_validation() {
        let json = r#"{"id":"q2","text":"Capital of Canada?","options":["Toronto","Ottawa"],"correct_answer":1}"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert_eq!(q.correct_answer(), 1);

        let bad = r#"{"id":"q2","text":"Capital of Canada?","options":["Toronto","Ottawa"],"correct_answer":5}"#;
        assert!(serde_json::from_str::<Question>(bad).is_err());
    }
}
