use thiserror::Error;

use crate::model::{
    AttemptError, CatalogError, IdError, ProfileError, QuestionError, QuizError, ScoreError,
};
use crate::session::SessionError;

/// Umbrella error for callers that do not care which domain rule failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Id(#[from] IdError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error(transparent)]
    Session(#[from] SessionError),
}
