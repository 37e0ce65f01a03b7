//! Static quiz content bundled with the application.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use quiz_core::model::{
    Category, CategoryId, Difficulty, Question, QuestionId, QuizDefinition, QuizId, QuizSummary,
};
use thiserror::Error;

use crate::repository::{QuizCatalog, StorageError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogBuildError {
    #[error(transparent)]
    Domain(#[from] quiz_core::Error),

    #[error("unknown category: {0}")]
    UnknownCategory(CategoryId),

    #[error("definition {definition} does not match listed quiz {listed}")]
    MismatchedDefinition { listed: QuizId, definition: QuizId },
}

/// In-memory content source.
///
/// A quiz may be listed without a question set; `get_quiz` reports those as
/// not found, the same way a remote content service would for an unpublished quiz.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    categories: Vec<Category>,
    quizzes: HashMap<CategoryId, Vec<QuizSummary>>,
    definitions: HashMap<(CategoryId, QuizId), Arc<QuizDefinition>>,
}

impl StaticCatalog {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add (or rename) a category. Its quiz count follows the listed quizzes.
    ///
    /// # Errors
    ///
    /// Returns `CatalogBuildError::Domain` if the name is blank.
    pub fn with_category(mut self, id: CategoryId, name: &str) -> Result<Self, CatalogBuildError> {
        let listed = self.quizzes.entry(id.clone()).or_default().len();
        let count = u32::try_from(listed).unwrap_or(u32::MAX);
        let category = Category::new(id.clone(), name, count).map_err(quiz_core::Error::from)?;
        match self.categories.iter_mut().find(|c| c.id() == &id) {
            Some(existing) => *existing = category,
            None => self.categories.push(category),
        }
        Ok(self)
    }

    /// List a quiz under its category, optionally with its question set.
    ///
    /// # Errors
    ///
    /// Returns `CatalogBuildError::UnknownCategory` if the category was never
    /// added and `CatalogBuildError::MismatchedDefinition` if the definition id
    /// differs from the summary id.
    pub fn with_quiz(
        mut self,
        summary: QuizSummary,
        definition: Option<QuizDefinition>,
    ) -> Result<Self, CatalogBuildError> {
        if let Some(def) = &definition {
            if def.id() != &summary.id {
                return Err(CatalogBuildError::MismatchedDefinition {
                    listed: summary.id,
                    definition: def.id().clone(),
                });
            }
        }
        let category_id = summary.category.clone();
        let quiz_id = summary.id.clone();
        let listed = self
            .quizzes
            .get_mut(&category_id)
            .ok_or_else(|| CatalogBuildError::UnknownCategory(category_id.clone()))?;
        listed.retain(|q| q.id != quiz_id);
        listed.push(summary);
        let count = u32::try_from(listed.len()).unwrap_or(u32::MAX);

        if let Some(category) = self.categories.iter_mut().find(|c| c.id() == &category_id) {
            *category = Category::new(category_id.clone(), category.name(), count)
                .map_err(quiz_core::Error::from)?;
        }

        let key = (category_id, quiz_id);
        match definition {
            Some(def) => {
                self.definitions.insert(key, Arc::new(def));
            }
            None => {
                self.definitions.remove(&key);
            }
        }
        Ok(self)
    }

    /// The sample content shipped with the app.
    ///
    /// # Errors
    ///
    /// Returns `CatalogBuildError` if any bundled entry fails validation.
    pub fn sample() -> Result<Self, CatalogBuildError> {
        let mut catalog = Self::empty();
        for (id, name) in SAMPLE_CATEGORIES {
            let id = CategoryId::new(*id).map_err(quiz_core::Error::from)?;
            catalog = catalog.with_category(id, name)?;
        }
        for entry in SAMPLE_QUIZZES {
            let (summary, definition) = sample_entry(entry)?;
            catalog = catalog.with_quiz(summary, definition)?;
        }
        Ok(catalog)
    }
}

#[async_trait]
impl QuizCatalog for StaticCatalog {
    async fn list_categories(&self) -> Result<Vec<Category>, StorageError> {
        Ok(self.categories.clone())
    }

    async fn list_quizzes(&self, category: &CategoryId) -> Result<Vec<QuizSummary>, StorageError> {
        self.quizzes
            .get(category)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn get_quiz(
        &self,
        category: &CategoryId,
        quiz: &QuizId,
    ) -> Result<Arc<QuizDefinition>, StorageError> {
        self.definitions
            .get(&(category.clone(), quiz.clone()))
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

//
// ─── SAMPLE DATA ───────────────────────────────────────────────────────────────
//

const SAMPLE_CATEGORIES: &[(&str, &str)] = &[
    ("science", "Science"),
    ("geography", "Geography"),
    ("sports", "Sports"),
    ("biology", "Biology"),
    ("literature", "Literature"),
    ("programming", "Programming"),
    ("music", "Music"),
    ("movies", "Movies"),
];

struct SampleQuiz {
    id: &'static str,
    category: &'static str,
    title: &'static str,
    description: &'static str,
    question_count: u32,
    time_limit_minutes: u32,
    difficulty: Difficulty,
    questions: &'static [SampleQuestion],
}

struct SampleQuestion {
    id: &'static str,
    text: &'static str,
    options: &'static [&'static str],
    correct: usize,
}

fn sample_entry(
    entry: &SampleQuiz,
) -> Result<(QuizSummary, Option<QuizDefinition>), quiz_core::Error> {
    let summary = QuizSummary::new(
        QuizId::new(entry.id)?,
        CategoryId::new(entry.category)?,
        entry.title,
        Some(entry.description.to_owned()),
        entry.question_count,
        entry.time_limit_minutes,
        entry.difficulty,
    )?;
    if entry.questions.is_empty() {
        return Ok((summary, None));
    }

    let mut questions = Vec::with_capacity(entry.questions.len());
    for q in entry.questions {
        questions.push(Question::new(
            QuestionId::new(q.id)?,
            q.text,
            q.options.iter().map(|o| (*o).to_owned()).collect(),
            q.correct,
        )?);
    }
    let definition = QuizDefinition::new(
        QuizId::new(entry.id)?,
        entry.title,
        questions,
        entry.time_limit_minutes,
    )?;
    Ok((summary, Some(definition)))
}

const SAMPLE_QUIZZES: &[SampleQuiz] = &[
    SampleQuiz {
        id: "science-1",
        category: "science",
        title: "Basic Physics",
        description: "Test your knowledge of fundamental physics concepts",
        question_count: 3,
        time_limit_minutes: 15,
        difficulty: Difficulty::Medium,
        questions: &[
            SampleQuestion {
                id: "q1",
                text: "What is the SI unit of force?",
                options: &["Watt", "Newton", "Joule", "Pascal"],
                correct: 1,
            },
            SampleQuestion {
                id: "q2",
                text: "Which of these is NOT a state of matter?",
                options: &["Plasma", "Gas", "Energy", "Solid"],
                correct: 2,
            },
            SampleQuestion {
                id: "q3",
                text: "What is the speed of light in vacuum?",
                options: &["300,000 km/s", "150,000 km/s", "3,000 km/s", "30,000 km/s"],
                correct: 0,
            },
        ],
    },
    SampleQuiz {
        id: "science-2",
        category: "science",
        title: "Chemistry Fundamentals",
        description: "Explore the world of atoms and molecules",
        question_count: 12,
        time_limit_minutes: 20,
        difficulty: Difficulty::Hard,
        questions: &[],
    },
    SampleQuiz {
        id: "geo-1",
        category: "geography",
        title: "World Capitals",
        description: "How well do you know the capitals of the world?",
        question_count: 3,
        time_limit_minutes: 10,
        difficulty: Difficulty::Medium,
        questions: &[
            SampleQuestion {
                id: "q1",
                text: "What is the capital of Australia?",
                options: &["Sydney", "Melbourne", "Canberra", "Perth"],
                correct: 2,
            },
            SampleQuestion {
                id: "q2",
                text: "Which city is the capital of Canada?",
                options: &["Toronto", "Vancouver", "Montreal", "Ottawa"],
                correct: 3,
            },
            SampleQuestion {
                id: "q3",
                text: "What is the capital of Brazil?",
                options: &["Rio de Janeiro", "São Paulo", "Brasília", "Salvador"],
                correct: 2,
            },
        ],
    },
    SampleQuiz {
        id: "geo-2",
        category: "geography",
        title: "Natural Wonders",
        description: "Test your knowledge of Earth's most amazing natural features",
        question_count: 8,
        time_limit_minutes: 12,
        difficulty: Difficulty::Easy,
        questions: &[],
    },
    SampleQuiz {
        id: "sports-1",
        category: "sports",
        title: "Olympic History",
        description: "Test your knowledge of Olympic Games history",
        question_count: 10,
        time_limit_minutes: 15,
        difficulty: Difficulty::Medium,
        questions: &[],
    },
    SampleQuiz {
        id: "sports-2",
        category: "sports",
        title: "Football Legends",
        description: "How well do you know the greatest football players?",
        question_count: 12,
        time_limit_minutes: 18,
        difficulty: Difficulty::Hard,
        questions: &[],
    },
    SampleQuiz {
        id: "bio-1",
        category: "biology",
        title: "Human Anatomy",
        description: "Test your knowledge of the human body",
        question_count: 15,
        time_limit_minutes: 20,
        difficulty: Difficulty::Hard,
        questions: &[],
    },
    SampleQuiz {
        id: "bio-2",
        category: "biology",
        title: "Animal Kingdom",
        description: "Explore the diversity of animal life",
        question_count: 10,
        time_limit_minutes: 15,
        difficulty: Difficulty::Medium,
        questions: &[],
    },
    SampleQuiz {
        id: "lit-1",
        category: "literature",
        title: "Classic Novels",
        description: "Test your knowledge of classic literature",
        question_count: 12,
        time_limit_minutes: 18,
        difficulty: Difficulty::Hard,
        questions: &[],
    },
    SampleQuiz {
        id: "lit-2",
        category: "literature",
        title: "Famous Authors",
        description: "How well do you know the world's most famous writers?",
        question_count: 10,
        time_limit_minutes: 15,
        difficulty: Difficulty::Medium,
        questions: &[],
    },
    SampleQuiz {
        id: "prog-1",
        category: "programming",
        title: "JavaScript Basics",
        description: "Test your knowledge of JavaScript fundamentals",
        question_count: 3,
        time_limit_minutes: 20,
        difficulty: Difficulty::Medium,
        questions: &[
            SampleQuestion {
                id: "q1",
                text: "Which of the following is NOT a JavaScript data type?",
                options: &["String", "Boolean", "Float", "Symbol"],
                correct: 2,
            },
            SampleQuestion {
                id: "q2",
                text: "What will console.log(typeof []) output?",
                options: &["'array'", "'object'", "'list'", "'undefined'"],
                correct: 1,
            },
            SampleQuestion {
                id: "q3",
                text: "Which method adds an element to the end of an array?",
                options: &["push()", "pop()", "shift()", "unshift()"],
                correct: 0,
            },
        ],
    },
    SampleQuiz {
        id: "prog-2",
        category: "programming",
        title: "Python Challenge",
        description: "Advanced Python programming concepts",
        question_count: 12,
        time_limit_minutes: 25,
        difficulty: Difficulty::Hard,
        questions: &[],
    },
    SampleQuiz {
        id: "music-1",
        category: "music",
        title: "Music Theory",
        description: "Test your knowledge of music theory basics",
        question_count: 10,
        time_limit_minutes: 15,
        difficulty: Difficulty::Medium,
        questions: &[],
    },
    SampleQuiz {
        id: "music-2",
        category: "music",
        title: "Music History",
        description: "Explore the evolution of music through the ages",
        question_count: 12,
        time_limit_minutes: 18,
        difficulty: Difficulty::Hard,
        questions: &[],
    },
    SampleQuiz {
        id: "movies-1",
        category: "movies",
        title: "Oscar Winners",
        description: "Test your knowledge of Academy Award winning films",
        question_count: 15,
        time_limit_minutes: 20,
        difficulty: Difficulty::Medium,
        questions: &[],
    },
    SampleQuiz {
        id: "movies-2",
        category: "movies",
        title: "Film Directors",
        description: "How well do you know famous film directors?",
        question_count: 10,
        time_limit_minutes: 15,
        difficulty: Difficulty::Hard,
        questions: &[],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    fn cat(id: &str) -> CategoryId {
        CategoryId::new(id).unwrap()
    }

    fn quiz(id: &str) -> QuizId {
        QuizId::new(id).unwrap()
    }

    #[tokio::test]
    async fn sample_lists_all_categories_with_counts() {
        let catalog = StaticCatalog::sample().unwrap();
        let categories = catalog.list_categories().await.unwrap();
        assert_eq!(categories.len(), 8);
        assert_eq!(categories[0].name(), "Science");
        assert!(categories.iter().all(|c| c.quiz_count() == 2));
    }

    #[tokio::test]
    async fn sample_serves_full_question_sets() {
        let catalog = StaticCatalog::sample().unwrap();
        let physics = catalog
            .get_quiz(&cat("science"), &quiz("science-1"))
            .await
            .unwrap();
        assert_eq!(physics.question_count(), 3);
        assert_eq!(physics.time_budget_secs(), 900);
        let correct: Vec<usize> = physics
            .questions()
            .iter()
            .map(Question::correct_answer)
            .collect();
        assert_eq!(correct, vec![1, 2, 0]);
    }

    #[tokio::test]
    async fn lookups_report_not_found() {
        let catalog = StaticCatalog::sample().unwrap();
        assert!(matches!(
            catalog.list_quizzes(&cat("cooking")).await,
            Err(StorageError::NotFound)
        ));
        // Listed, but no question set published.
        assert!(matches!(
            catalog.get_quiz(&cat("science"), &quiz("science-2")).await,
            Err(StorageError::NotFound)
        ));
        // Exists, but under another category.
        assert!(matches!(
            catalog.get_quiz(&cat("science"), &quiz("geo-1")).await,
            Err(StorageError::NotFound)
        ));
    }

    fn one_question_quiz(id: &str, title: &str) -> QuizDefinition {
        QuizDefinition::new(
            quiz(id),
            title,
            vec![
                Question::new(
                    QuestionId::new("q1").unwrap(),
                    "Q",
                    vec!["a".into(), "b".into()],
                    0,
                )
                .unwrap(),
            ],
            1,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn same_quiz_id_resolves_per_category() {
        let mut catalog = StaticCatalog::empty();
        for (category, title) in [("science", "Science Mix"), ("music", "Music Mix")] {
            let summary =
                QuizSummary::new(quiz("mixed"), cat(category), title, None, 1, 1, Difficulty::Easy)
                    .unwrap();
            catalog = catalog
                .with_category(cat(category), title)
                .unwrap()
                .with_quiz(summary, Some(one_question_quiz("mixed", title)))
                .unwrap();
        }

        let science = catalog.get_quiz(&cat("science"), &quiz("mixed")).await.unwrap();
        let music = catalog.get_quiz(&cat("music"), &quiz("mixed")).await.unwrap();
        assert_eq!(science.title(), "Science Mix");
        assert_eq!(music.title(), "Music Mix");

        // Relisting without questions only unpublishes that category's copy.
        let summary =
            QuizSummary::new(quiz("mixed"), cat("music"), "Music Mix", None, 1, 1, Difficulty::Easy)
                .unwrap();
        let catalog = catalog.with_quiz(summary, None).unwrap();
        assert!(matches!(
            catalog.get_quiz(&cat("music"), &quiz("mixed")).await,
            Err(StorageError::NotFound)
        ));
        assert!(catalog.get_quiz(&cat("science"), &quiz("mixed")).await.is_ok());
    }

    #[test]
    fn with_quiz_rejects_unknown_category_and_mismatched_definition() {
        let summary = QuizSummary::new(
            quiz("x-1"),
            cat("nowhere"),
            "X",
            None,
            1,
            1,
            Difficulty::Easy,
        )
        .unwrap();
        assert!(matches!(
            StaticCatalog::empty().with_quiz(summary, None),
            Err(CatalogBuildError::UnknownCategory(_))
        ));

        let summary =
            QuizSummary::new(quiz("x-1"), cat("misc"), "X", None, 1, 1, Difficulty::Easy).unwrap();
        let definition = one_question_quiz("y-1", "Y");
        let catalog = StaticCatalog::empty()
            .with_category(cat("misc"), "Misc")
            .unwrap();
        assert!(matches!(
            catalog.with_quiz(summary, Some(definition)),
            Err(CatalogBuildError::MismatchedDefinition { .. })
        ));
    }
}
