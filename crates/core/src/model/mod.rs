mod attempt;
mod catalog;
mod ids;
mod profile;
mod question;
mod quiz;
mod score;

pub use ids::{CategoryId, IdError, QuestionId, QuizId, UserId};

pub use attempt::{AttemptError, QuizAttempt};
pub use catalog::{CatalogError, Category, Difficulty, QuizSummary};
pub use profile::{Profile, ProfileError, validate_username};
pub use question::{Question, QuestionDraft, QuestionError};
pub use quiz::{QuizDefinition, QuizDraft, QuizError};
pub use score::{Feedback, ScoreError, ScoreReport};
