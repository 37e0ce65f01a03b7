use chrono::{DateTime, Utc};
use quiz_core::model::{QuizAttempt, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{
    category_id_from_str, conn, quiz_id_from_str, ser, u32_from_i64, u64_from_i64,
    user_id_from_str,
};
use crate::repository::{AttemptRepository, AttemptRow, StorageError, UserTotals};

fn map_attempt_row(row: &SqliteRow) -> Result<QuizAttempt, StorageError> {
    let user_id: String = row.try_get("user_id").map_err(ser)?;
    let quiz_id: String = row.try_get("quiz_id").map_err(ser)?;
    let category_id: String = row.try_get("category_id").map_err(ser)?;
    let correct: i64 = row.try_get("correct").map_err(ser)?;
    let total: i64 = row.try_get("total").map_err(ser)?;
    let started_at: DateTime<Utc> = row.try_get("started_at").map_err(ser)?;
    let completed_at: DateTime<Utc> = row.try_get("completed_at").map_err(ser)?;

    QuizAttempt::from_persisted(
        user_id_from_str(&user_id)?,
        quiz_id_from_str(quiz_id)?,
        category_id_from_str(category_id)?,
        u32_from_i64("correct", correct)?,
        u32_from_i64("total", total)?,
        started_at,
        completed_at,
    )
    .map_err(ser)
}

fn map_totals_row(row: &SqliteRow) -> Result<UserTotals, StorageError> {
    let user_id: String = row.try_get("user_id").map_err(ser)?;
    let attempts: i64 = row.try_get("attempts").map_err(ser)?;
    let correct: i64 = row.try_get("correct_sum").map_err(ser)?;
    let total: i64 = row.try_get("total_sum").map_err(ser)?;

    Ok(UserTotals {
        user_id: user_id_from_str(&user_id)?,
        attempts: u32_from_i64("attempts", attempts)?,
        correct: u64_from_i64("correct", correct)?,
        total: u64_from_i64("total", total)?,
    })
}

#[async_trait::async_trait]
impl AttemptRepository for SqliteRepository {
    async fn append_attempt(&self, attempt: &QuizAttempt) -> Result<i64, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO quiz_attempts (user_id, quiz_id, category_id, correct, total, started_at, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(attempt.user_id().to_string())
        .bind(attempt.quiz_id().as_str())
        .bind(attempt.category().as_str())
        .bind(i64::from(attempt.correct()))
        .bind(i64::from(attempt.total()))
        .bind(attempt.started_at())
        .bind(attempt.completed_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn get_attempt(&self, id: i64) -> Result<QuizAttempt, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, quiz_id, category_id, correct, total, started_at, completed_at
            FROM quiz_attempts
            WHERE id = ?1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_attempt_row(&row)
    }

    async fn list_attempts_for_user(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<AttemptRow>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, quiz_id, category_id, correct, total, started_at, completed_at
            FROM quiz_attempts
            WHERE user_id = ?1
            ORDER BY completed_at DESC, id DESC
            LIMIT ?2
            ",
        )
        .bind(user.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter()
            .map(|row| {
                let id: i64 = row.try_get("id").map_err(ser)?;
                Ok(AttemptRow::new(id, map_attempt_row(row)?))
            })
            .collect()
    }

    async fn user_totals(&self, limit: u32) -> Result<Vec<UserTotals>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id,
                   COUNT(*) AS attempts,
                   SUM(correct) AS correct_sum,
                   SUM(total) AS total_sum
            FROM quiz_attempts
            GROUP BY user_id
            ORDER BY correct_sum DESC, user_id ASC
            LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_totals_row).collect()
    }
}
