use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Error type for parsing or validating an identifier.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {raw:?}")]
pub struct IdError {
    kind: &'static str,
    raw: String,
}

impl IdError {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

fn validate_slug(kind: &'static str, raw: String) -> Result<String, IdError> {
    let valid = !raw.is_empty()
        && raw.len() <= 64
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(raw)
    } else {
        Err(IdError { kind, raw })
    }
}

/// Identifier of a quiz category (e.g. `science`).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CategoryId(String);

impl CategoryId {
    /// Creates a new `CategoryId`.
    ///
    /// # Errors
    ///
    /// Returns `IdError` unless the value is 1-64 ASCII letters, digits, `-` or `_`.
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        validate_slug("CategoryId", id.into()).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier of a quiz (e.g. `science-1`).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QuizId(String);

impl QuizId {
    /// Creates a new `QuizId`.
    ///
    /// # Errors
    ///
    /// Returns `IdError` unless the value is 1-64 ASCII letters, digits, `-` or `_`.
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        validate_slug("QuizId", id.into()).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier of a question, unique within one quiz.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QuestionId(String);

impl QuestionId {
    /// Creates a new `QuestionId`.
    ///
    /// # Errors
    ///
    /// Returns `IdError` unless the value is 1-64 ASCII letters, digits, `-` or `_`.
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        validate_slug("QuestionId", id.into()).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier of an authenticated user, issued by the identity provider.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Generates a fresh random id.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID value
    #[must_use]
    pub fn value(&self) -> Uuid {
        self.0
    }
}

macro_rules! string_id_conversions {
    ($($ty:ident),*) => {$(
        impl TryFrom<String> for $ty {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$ty> for String {
            fn from(id: $ty) -> Self {
                id.0
            }
        }

        impl FromStr for $ty {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($ty), self.0)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    )*};
}

string_id_conversions!(CategoryId, QuizId, QuestionId);

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(UserId::new).map_err(|_| IdError {
            kind: "UserId",
            raw: s.to_owned(),
        })
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiz_id_display() {
        let id = QuizId::new("science-1").unwrap();
        assert_eq!(id.to_string(), "science-1");
    }

    #[test]
    fn test_category_id_from_str() {
        let id: CategoryId = "geography".parse().unwrap();
        assert_eq!(id.as_str(), "geography");
    }

    #[test]
    fn test_slug_ids_reject_garbage() {
        assert!(QuizId::new("").is_err());
        assert!(QuizId::new("has space").is_err());
        assert!(CategoryId::new("x".repeat(65)).is_err());
        let err = QuestionId::new("q/1").unwrap_err();
        assert_eq!(err.kind(), "QuestionId");
    }

    #[test]
    fn test_user_id_roundtrip() {
        let original = UserId::random();
        let parsed: UserId = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_user_id_from_str_invalid() {
        assert!("not-a-uuid".parse::<UserId>().is_err());
    }

    #[test]
    fn test_quiz_id_deserialize_validates() {
        let ok: QuizId = serde_json::from_str("\"geo-1\"").unwrap();
        assert_eq!(ok.as_str(), "geo-1");
        assert!(serde_json::from_str::<QuizId>("\"geo 1\"").is_err());
    }
}
