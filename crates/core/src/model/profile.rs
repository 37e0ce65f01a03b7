use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::UserId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProfileError {
    #[error("username must be between 3 and 32 characters")]
    InvalidUsernameLength,

    #[error("username may only contain letters, digits, '_' and '-'")]
    InvalidUsernameChars,

    #[error("avatar url is not a valid http(s) url")]
    InvalidAvatarUrl,
}

/// Public profile of a registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    id: UserId,
    username: String,
    full_name: Option<String>,
    avatar_url: Option<String>,
    created_at: DateTime<Utc>,
}

/// Validates a username on its own, e.g. before a sign-up request is sent.
///
/// # Errors
///
/// Returns `ProfileError` for a bad length or characters outside the allowed set.
pub fn validate_username(raw: &str) -> Result<String, ProfileError> {
    let username = raw.trim();
    let len = username.chars().count();
    if !(3..=32).contains(&len) {
        return Err(ProfileError::InvalidUsernameLength);
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ProfileError::InvalidUsernameChars);
    }
    Ok(username.to_owned())
}

impl Profile {
    /// Creates a profile for a freshly registered user.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError` if the username is invalid.
    pub fn new(
        id: UserId,
        username: impl AsRef<str>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ProfileError> {
        Ok(Self {
            id,
            username: validate_username(username.as_ref())?,
            full_name: None,
            avatar_url: None,
            created_at,
        })
    }

    /// Rehydrate a profile from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError` if any persisted field fails validation.
    pub fn from_persisted(
        id: UserId,
        username: impl AsRef<str>,
        full_name: Option<String>,
        avatar_url: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ProfileError> {
        Self::new(id, username, created_at)?
            .with_full_name(full_name)
            .with_avatar_url(avatar_url)
    }

    #[must_use]
    pub fn with_full_name(mut self, full_name: Option<String>) -> Self {
        self.full_name = full_name
            .map(|n| n.trim().to_owned())
            .filter(|n| !n.is_empty());
        self
    }

    /// Set or clear the avatar url.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::InvalidAvatarUrl` unless the url is `http` or `https`.
    pub fn with_avatar_url(mut self, avatar_url: Option<String>) -> Result<Self, ProfileError> {
        let avatar_url = avatar_url
            .map(|u| u.trim().to_owned())
            .filter(|u| !u.is_empty());
        if let Some(url) = &avatar_url {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(ProfileError::InvalidAvatarUrl);
            }
        }
        self.avatar_url = avatar_url;
        Ok(self)
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn full_name(&self) -> Option<&str> {
        self.full_name.as_deref()
    }

    #[must_use]
    pub fn avatar_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn profile_trims_username() {
        let profile = Profile::new(UserId::random(), "  QuizMaster ", fixed_now()).unwrap();
        assert_eq!(profile.username(), "QuizMaster");
        assert!(profile.full_name().is_none());
    }

    #[test]
    fn profile_rejects_bad_usernames() {
        assert_eq!(
            validate_username("ab").unwrap_err(),
            ProfileError::InvalidUsernameLength
        );
        assert_eq!(
            validate_username("quiz master").unwrap_err(),
            ProfileError::InvalidUsernameChars
        );
    }

    #[test]
    fn profile_validates_avatar_url() {
        let profile = Profile::new(UserId::random(), "TriviaKing", fixed_now()).unwrap();
        assert_eq!(
            profile.clone().with_avatar_url(Some("ftp://x".into())).unwrap_err(),
            ProfileError::InvalidAvatarUrl
        );
        let profile = profile
            .with_avatar_url(Some("https://example.com/a.svg".into()))
            .unwrap();
        assert_eq!(profile.avatar_url(), Some("https://example.com/a.svg"));
    }

    #[test]
    fn profile_serializes_with_timestamp() {
        let profile = Profile::new(UserId::random(), "QuizMaster", fixed_now())
            .unwrap()
            .with_full_name(Some("Quiz Master".into()));
        let json = serde_json::to_string(&profile).unwrap();
        assert!(json.contains("2023-11-14T22:13:20Z"));
        let back: Profile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, profile);
    }
}
