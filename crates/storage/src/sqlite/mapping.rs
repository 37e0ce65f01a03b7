use quiz_core::model::{CategoryId, QuizId, UserId};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn user_id_from_str(v: &str) -> Result<UserId, StorageError> {
    v.parse().map_err(ser)
}

pub(crate) fn quiz_id_from_str(v: String) -> Result<QuizId, StorageError> {
    QuizId::new(v).map_err(ser)
}

pub(crate) fn category_id_from_str(v: String) -> Result<CategoryId, StorageError> {
    CategoryId::new(v).map_err(ser)
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn u64_from_i64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

/// `true` when the error is a UNIQUE / PRIMARY KEY violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
