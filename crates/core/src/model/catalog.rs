use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{CategoryId, QuizId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("category name cannot be empty")]
    EmptyCategoryName,

    #[error("quiz title cannot be empty")]
    EmptyTitle,

    #[error("unknown difficulty: {0}")]
    UnknownDifficulty(String),
}

/// Difficulty label shown next to a quiz in a category listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(CatalogError::UnknownDifficulty(other.to_owned())),
        }
    }
}

/// A browsable group of quizzes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    id: CategoryId,
    name: String,
    quiz_count: u32,
}

impl Category {
    /// Creates a category entry.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyCategoryName` if the name is blank.
    pub fn new(
        id: CategoryId,
        name: impl Into<String>,
        quiz_count: u32,
    ) -> Result<Self, CatalogError> {
        let name = name.into();
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::EmptyCategoryName);
        }
        Ok(Self {
            id,
            name: name.to_owned(),
            quiz_count,
        })
    }

    #[must_use]
    pub fn id(&self) -> &CategoryId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn quiz_count(&self) -> u32 {
        self.quiz_count
    }
}

/// Listing entry for a quiz inside a category.
///
/// Carries only metadata; the question set is fetched separately when an
/// attempt starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizSummary {
    pub id: QuizId,
    pub category: CategoryId,
    pub title: String,
    pub description: Option<String>,
    pub question_count: u32,
    pub time_limit_minutes: u32,
    pub difficulty: Difficulty,
}

impl QuizSummary {
    /// Creates a listing entry, trimming the title and dropping a blank description.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyTitle` if the title is blank.
    pub fn new(
        id: QuizId,
        category: CategoryId,
        title: impl Into<String>,
        description: Option<String>,
        question_count: u32,
        time_limit_minutes: u32,
        difficulty: Difficulty,
    ) -> Result<Self, CatalogError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(CatalogError::EmptyTitle);
        }
        let description = description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty());

        Ok(Self {
            id,
            category,
            title: title.trim().to_owned(),
            description,
            question_count,
            time_limit_minutes,
            difficulty,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_parses_case_insensitively() {
        assert_eq!("Hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert_eq!(" easy ".parse::<Difficulty>().unwrap(), Difficulty::Easy);
        assert!(matches!(
            "extreme".parse::<Difficulty>(),
            Err(CatalogError::UnknownDifficulty(_))
        ));
    }

    #[test]
    fn difficulty_serializes_lowercase() {
        let json = serde_json::to_string(&Difficulty::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
    }

    #[test]
    fn category_rejects_blank_name() {
        let id = CategoryId::new("science").unwrap();
        assert_eq!(
            Category::new(id, "  ", 3).unwrap_err(),
            CatalogError::EmptyCategoryName
        );
    }

    #[test]
    fn summary_filters_empty_description() {
        let summary = QuizSummary::new(
            QuizId::new("geo-2").unwrap(),
            CategoryId::new("geography").unwrap(),
            " Natural Wonders ",
            Some("   ".into()),
            8,
            12,
            Difficulty::Easy,
        )
        .unwrap();
        assert_eq!(summary.title, "Natural Wonders");
        assert!(summary.description.is_none());
    }
}
