use chrono::{DateTime, Utc};
use quiz_core::model::{Profile, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{conn, is_unique_violation, ser, user_id_from_str};
use crate::repository::{ProfileRepository, StorageError};

fn map_profile_row(row: &SqliteRow) -> Result<Profile, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let username: String = row.try_get("username").map_err(ser)?;
    let full_name: Option<String> = row.try_get("full_name").map_err(ser)?;
    let avatar_url: Option<String> = row.try_get("avatar_url").map_err(ser)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(ser)?;

    Profile::from_persisted(
        user_id_from_str(&id)?,
        username,
        full_name,
        avatar_url,
        created_at,
    )
    .map_err(ser)
}

#[async_trait::async_trait]
impl ProfileRepository for SqliteRepository {
    async fn insert_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        let result = sqlx::query(
            r"
            INSERT INTO profiles (id, username, full_name, avatar_url, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(profile.id().to_string())
        .bind(profile.username())
        .bind(profile.full_name())
        .bind(profile.avatar_url())
        .bind(profile.created_at())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(StorageError::Conflict),
            Err(err) => Err(conn(err)),
        }
    }

    async fn get_profile(&self, id: UserId) -> Result<Option<Profile>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, username, full_name, avatar_url, created_at
            FROM profiles
            WHERE id = ?1
            ",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_profile_row).transpose()
    }

    async fn get_profiles(&self, ids: &[UserId]) -> Result<Vec<Profile>, StorageError> {
        let mut profiles = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(profile) = self.get_profile(*id).await? {
                profiles.push(profile);
            }
        }
        Ok(profiles)
    }
}
