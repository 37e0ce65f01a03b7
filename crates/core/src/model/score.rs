use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScoreError {
    #[error("cannot score a quiz without questions")]
    EmptyQuiz,

    #[error("correct count ({correct}) exceeds total ({total})")]
    CorrectExceedsTotal { correct: usize, total: usize },
}

/// Coarse verdict shown with a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Feedback {
    /// 80% and above.
    Excellent,
    /// 60% up to 79%.
    Good,
    /// Below 60%.
    KeepPracticing,
}

impl Feedback {
    #[must_use]
    pub fn for_percentage(percentage: u8) -> Self {
        match percentage {
            80.. => Feedback::Excellent,
            60..=79 => Feedback::Good,
            _ => Feedback::KeepPracticing,
        }
    }

    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Feedback::Excellent => "Excellent! You've mastered this topic.",
            Feedback::Good => "Good job! You have a solid understanding.",
            Feedback::KeepPracticing => "Keep practicing to improve your knowledge.",
        }
    }
}

/// Correctness summary of a completed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreReport {
    correct: usize,
    total: usize,
    percentage: u8,
}

impl ScoreReport {
    /// Builds a report, rounding the percentage half-up.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError::EmptyQuiz` when `total` is zero and
    /// `ScoreError::CorrectExceedsTotal` when `correct > total`.
    pub fn new(correct: usize, total: usize) -> Result<Self, ScoreError> {
        if total == 0 {
            return Err(ScoreError::EmptyQuiz);
        }
        if correct > total {
            return Err(ScoreError::CorrectExceedsTotal { correct, total });
        }

        Ok(Self {
            correct,
            total,
            percentage: round_half_up_percent(correct, total),
        })
    }

    #[must_use]
    pub fn correct(&self) -> usize {
        self.correct
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    #[must_use]
    pub fn percentage(&self) -> u8 {
        self.percentage
    }

    #[must_use]
    pub fn feedback(&self) -> Feedback {
        Feedback::for_percentage(self.percentage)
    }
}

// floor((correct * 100 / total) + 1/2) in integer arithmetic.
fn round_half_up_percent(correct: usize, total: usize) -> u8 {
    let correct = correct as u128;
    let total = total as u128;
    let pct = (correct * 200 + total) / (total * 2);
    u8::try_from(pct).unwrap_or(100)
}
