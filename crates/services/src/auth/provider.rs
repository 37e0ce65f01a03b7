use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Duration;
use quiz_core::Clock;
use quiz_core::model::UserId;
use rand::Rng;
use rand::distr::Alphanumeric;
use uuid::Uuid;

use super::{AuthSession, AuthUser, normalize_email};
use crate::error::AuthError;

pub const MIN_PASSWORD_LEN: usize = 6;

const TOKEN_LEN: usize = 32;
const SESSION_TTL_SECS: i64 = 3600;

/// Account operations against an identity backend.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authenticate with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for an unknown email or wrong password.
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    /// Register a new account and sign it in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::EmailTaken` if the email is registered and
    /// `AuthError::WeakPassword` / `AuthError::InvalidEmail` for bad input.
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    /// End the given session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if the backend rejects the request.
    async fn sign_out(&self, session: &AuthSession) -> Result<(), AuthError>;

    /// The session the backend currently considers active, if any.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if the backend cannot be reached.
    async fn current_session(&self) -> Result<Option<AuthSession>, AuthError>;

    /// Exchange the session's refresh token for fresh tokens.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotSignedIn` if the refresh token is no longer valid.
    async fn refresh(&self, session: &AuthSession) -> Result<AuthSession, AuthError>;
}

struct Account {
    user: AuthUser,
    password: String,
}

#[derive(Default)]
struct ProviderState {
    accounts: HashMap<String, Account>,
    refresh_tokens: HashMap<String, String>,
    current: Option<AuthSession>,
}

/// Process-local provider for development and tests.
///
/// User ids are derived from the normalized email, so the same email maps to
/// the same `UserId` across restarts.
#[derive(Clone, Default)]
pub struct InMemoryIdentityProvider {
    clock: Clock,
    state: Arc<Mutex<ProviderState>>,
}

impl InMemoryIdentityProvider {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            state: Arc::default(),
        }
    }

    /// Stable id for a normalized email.
    #[must_use]
    pub fn user_id_for(email: &str) -> UserId {
        UserId::new(Uuid::new_v5(&Uuid::NAMESPACE_OID, email.as_bytes()))
    }

    fn lock(&self) -> MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn issue(&self, state: &mut ProviderState, user: AuthUser) -> AuthSession {
        let session = AuthSession {
            access_token: random_token(),
            refresh_token: random_token(),
            expires_at: Some(self.clock.now() + Duration::seconds(SESSION_TTL_SECS)),
            user,
        };
        state
            .refresh_tokens
            .insert(session.refresh_token.clone(), session.user.email.clone());
        state.current = Some(session.clone());
        session
    }
}

fn random_token() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = normalize_email(email).ok_or(AuthError::InvalidCredentials)?;
        let mut state = self.lock();
        let user = match state.accounts.get(&email) {
            Some(account) if account.password == password => account.user.clone(),
            _ => return Err(AuthError::InvalidCredentials),
        };
        Ok(self.issue(&mut state, user))
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = normalize_email(email).ok_or(AuthError::InvalidEmail)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword {
                min: MIN_PASSWORD_LEN,
            });
        }
        let mut state = self.lock();
        if state.accounts.contains_key(&email) {
            return Err(AuthError::EmailTaken);
        }
        let user = AuthUser {
            id: Self::user_id_for(&email),
            email: email.clone(),
        };
        state.accounts.insert(
            email,
            Account {
                user: user.clone(),
                password: password.to_owned(),
            },
        );
        Ok(self.issue(&mut state, user))
    }

    async fn sign_out(&self, session: &AuthSession) -> Result<(), AuthError> {
        let mut state = self.lock();
        state.refresh_tokens.remove(&session.refresh_token);
        if state
            .current
            .as_ref()
            .is_some_and(|current| current.access_token == session.access_token)
        {
            state.current = None;
        }
        Ok(())
    }

    async fn current_session(&self) -> Result<Option<AuthSession>, AuthError> {
        Ok(self.lock().current.clone())
    }

    async fn refresh(&self, session: &AuthSession) -> Result<AuthSession, AuthError> {
        let mut state = self.lock();
        let email = state
            .refresh_tokens
            .remove(&session.refresh_token)
            .ok_or(AuthError::NotSignedIn)?;
        let user = state
            .accounts
            .get(&email)
            .map(|account| account.user.clone())
            .ok_or(AuthError::NotSignedIn)?;
        Ok(self.issue(&mut state, user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::time::fixed_now;

    fn provider() -> InMemoryIdentityProvider {
        InMemoryIdentityProvider::new(Clock::Fixed(fixed_now()))
    }

    #[tokio::test]
    async fn sign_up_then_sign_in_with_normalized_email() {
        let provider = provider();
        let created = provider
            .sign_up("Player@Example.com", "secret1")
            .await
            .unwrap();
        assert_eq!(created.user.email, "player@example.com");
        assert_eq!(
            created.expires_at,
            Some(fixed_now() + Duration::seconds(SESSION_TTL_SECS))
        );

        let session = provider
            .sign_in("player@example.com", "secret1")
            .await
            .unwrap();
        assert_eq!(session.user, created.user);
        assert_ne!(session.access_token, created.access_token);
        assert_eq!(
            provider.current_session().await.unwrap(),
            Some(session.clone())
        );
    }

    #[tokio::test]
    async fn rejects_duplicates_weak_passwords_and_bad_credentials() {
        let provider = provider();
        provider.sign_up("a@example.com", "secret1").await.unwrap();

        assert!(matches!(
            provider.sign_up("A@example.com", "secret2").await,
            Err(AuthError::EmailTaken)
        ));
        assert!(matches!(
            provider.sign_up("b@example.com", "short").await,
            Err(AuthError::WeakPassword { min: 6 })
        ));
        assert!(matches!(
            provider.sign_up("not-an-email", "secret1").await,
            Err(AuthError::InvalidEmail)
        ));
        assert!(matches!(
            provider.sign_in("a@example.com", "wrong-pass").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            provider.sign_in("nobody@example.com", "secret1").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn refresh_rotates_tokens_and_sign_out_clears() {
        let provider = provider();
        let session = provider.sign_up("a@example.com", "secret1").await.unwrap();

        let refreshed = provider.refresh(&session).await.unwrap();
        assert_eq!(refreshed.user, session.user);
        assert_ne!(refreshed.refresh_token, session.refresh_token);
        assert!(matches!(
            provider.refresh(&session).await,
            Err(AuthError::NotSignedIn)
        ));

        provider.sign_out(&refreshed).await.unwrap();
        assert_eq!(provider.current_session().await.unwrap(), None);
        assert!(matches!(
            provider.refresh(&refreshed).await,
            Err(AuthError::NotSignedIn)
        ));
    }

    #[test]
    fn user_ids_are_stable_per_email() {
        assert_eq!(
            InMemoryIdentityProvider::user_id_for("a@example.com"),
            InMemoryIdentityProvider::user_id_for("a@example.com")
        );
        assert_ne!(
            InMemoryIdentityProvider::user_id_for("a@example.com"),
            InMemoryIdentityProvider::user_id_for("b@example.com")
        );
    }
}
