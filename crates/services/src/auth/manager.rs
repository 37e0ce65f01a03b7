use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use quiz_core::Clock;
use quiz_core::model::Profile;
use storage::repository::ProfileRepository;

use super::{AuthEvent, AuthEventKind, AuthSession, AuthState, AuthUser, IdentityProvider};
use crate::error::{AuthError, ProfileSetupError};

type Listener = Arc<dyn Fn(&AuthEvent) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: BTreeMap<u64, Listener>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle returned by [`AuthSessionManager::subscribe`].
///
/// The listener stays attached until this guard is dropped or
/// [`Subscription::unsubscribe`] is called.
#[must_use = "dropping a Subscription detaches the listener immediately"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            lock(&listeners).entries.remove(&self.id);
        }
    }
}

/// Result of a sign-up.
///
/// The account exists and is signed in even when `profile_error` is set.
#[derive(Debug)]
pub struct SignUpOutcome {
    pub session: AuthSession,
    pub profile_error: Option<ProfileSetupError>,
}

/// Owns the current auth state and notifies subscribers on every transition.
pub struct AuthSessionManager {
    clock: Clock,
    provider: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileRepository>,
    state: Mutex<AuthState>,
    listeners: Arc<Mutex<Listeners>>,
}

impl AuthSessionManager {
    /// A manager in the loading state; call [`AuthSessionManager::init`] next.
    #[must_use]
    pub fn new(
        clock: Clock,
        provider: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileRepository>,
    ) -> Self {
        Self {
            clock,
            provider,
            profiles,
            state: Mutex::new(AuthState::loading()),
            listeners: Arc::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> AuthState {
        lock(&self.state).clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        lock(&self.state).is_authenticated()
    }

    #[must_use]
    pub fn current_user(&self) -> Option<AuthUser> {
        lock(&self.state).user.clone()
    }

    /// Attach a listener for auth events.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&AuthEvent) + Send + Sync + 'static,
    {
        let mut listeners = lock(&self.listeners);
        listeners.next_id += 1;
        let id = listeners.next_id;
        listeners.entries.insert(id, Arc::new(listener));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.listeners).entries.len()
    }

    /// Detach every listener. Outstanding `Subscription` guards become no-ops.
    pub fn shutdown(&self) {
        lock(&self.listeners).entries.clear();
    }

    /// Resolve the provider's current session and leave the loading state.
    ///
    /// # Errors
    ///
    /// Returns the provider error; the state still leaves loading, signed out.
    pub async fn init(&self) -> Result<Option<AuthSession>, AuthError> {
        let result = self.provider.current_session().await;
        let (session, error) = match &result {
            Ok(session) => (session.clone(), None),
            Err(err) => {
                tracing::warn!(error = %err, "could not resolve current auth session");
                (None, Some(err.to_string()))
            }
        };
        self.transition(AuthEventKind::Initialized, |state| {
            state.user = session.as_ref().map(|s| s.user.clone());
            state.session = session;
            state.is_loading = false;
            state.error = error;
        });
        result
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns the provider error, which is also recorded in the state.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        match self.provider.sign_in(email, password).await {
            Ok(session) => {
                tracing::info!(user = %session.user.id, "signed in");
                self.set_session(AuthEventKind::SignedIn, session.clone());
                Ok(session)
            }
            Err(err) => Err(self.record_failure("sign in", err)),
        }
    }

    /// Register an account, sign it in and create its profile.
    ///
    /// A profile failure does not undo the sign-up; it is reported in
    /// [`SignUpOutcome::profile_error`].
    ///
    /// # Errors
    ///
    /// Returns the provider error, which is also recorded in the state.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<SignUpOutcome, AuthError> {
        let session = match self.provider.sign_up(email, password).await {
            Ok(session) => session,
            Err(err) => return Err(self.record_failure("sign up", err)),
        };
        tracing::info!(user = %session.user.id, "signed up");

        let profile_error = self.create_profile(&session.user, username).await.err();
        if let Some(err) = &profile_error {
            tracing::warn!(user = %session.user.id, error = %err, "profile creation failed");
        }

        self.set_session(AuthEventKind::SignedIn, session.clone());
        Ok(SignUpOutcome {
            session,
            profile_error,
        })
    }

    /// Sign out. The local session is cleared even if the provider call fails.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotSignedIn` without a session, or the provider error.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let session = lock(&self.state)
            .session
            .clone()
            .ok_or(AuthError::NotSignedIn)?;
        let result = self.provider.sign_out(&session).await;
        let error = result.as_ref().err().map(ToString::to_string);
        if let Some(message) = &error {
            tracing::warn!(error = %message, "provider sign out failed");
        }
        tracing::info!(user = %session.user.id, "signed out");
        self.transition(AuthEventKind::SignedOut, |state| {
            state.session = None;
            state.user = None;
            state.error = error;
        });
        result
    }

    /// Exchange the refresh token for a new session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotSignedIn` without a session, or the provider error.
    pub async fn refresh(&self) -> Result<AuthSession, AuthError> {
        let current = lock(&self.state)
            .session
            .clone()
            .ok_or(AuthError::NotSignedIn)?;
        match self.provider.refresh(&current).await {
            Ok(session) => {
                tracing::debug!(user = %session.user.id, "session refreshed");
                self.set_session(AuthEventKind::Refreshed, session.clone());
                Ok(session)
            }
            Err(err) => Err(self.record_failure("refresh", err)),
        }
    }

    async fn create_profile(&self, user: &AuthUser, username: &str) -> Result<(), ProfileSetupError> {
        // Development ids are stable per email, so the account may already have one.
        if self.profiles.get_profile(user.id).await?.is_some() {
            tracing::debug!(user = %user.id, "profile already exists");
            return Ok(());
        }
        let profile = Profile::new(user.id, username, self.clock.now())?;
        self.profiles.insert_profile(&profile).await?;
        Ok(())
    }

    fn set_session(&self, kind: AuthEventKind, session: AuthSession) {
        self.transition(kind, |state| {
            state.user = Some(session.user.clone());
            state.session = Some(session);
            state.is_loading = false;
            state.error = None;
        });
    }

    fn record_failure(&self, action: &'static str, err: AuthError) -> AuthError {
        tracing::warn!(action, error = %err, "identity provider call failed");
        lock(&self.state).error = Some(err.to_string());
        err
    }

    fn transition(&self, kind: AuthEventKind, apply: impl FnOnce(&mut AuthState)) {
        let snapshot = {
            let mut state = lock(&self.state);
            apply(&mut *state);
            state.clone()
        };
        let listeners: Vec<Listener> = lock(&self.listeners).entries.values().cloned().collect();
        let event = AuthEvent {
            kind,
            state: snapshot,
        };
        for listener in listeners {
            listener(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::InMemoryIdentityProvider;
    use quiz_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn manager() -> (AuthSessionManager, InMemoryRepository) {
        let repo = InMemoryRepository::new();
        let clock = Clock::Fixed(fixed_now());
        let manager = AuthSessionManager::new(
            clock,
            Arc::new(InMemoryIdentityProvider::new(clock)),
            Arc::new(repo.clone()),
        );
        (manager, repo)
    }

    fn recorder(manager: &AuthSessionManager) -> (Subscription, Arc<Mutex<Vec<AuthEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let subscription = manager.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
        (subscription, events)
    }

    #[tokio::test]
    async fn starts_loading_and_init_resolves_signed_out() {
        let (manager, _) = manager();
        assert!(manager.state().is_loading);

        let (_sub, events) = recorder(&manager);
        assert_eq!(manager.init().await.unwrap(), None);

        let state = manager.state();
        assert!(!state.is_loading);
        assert!(!manager.is_authenticated());
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AuthEventKind::Initialized);
    }

    #[tokio::test]
    async fn sign_up_creates_profile_and_notifies() {
        let (manager, repo) = manager();
        let (_sub, events) = recorder(&manager);

        let outcome = manager
            .sign_up("player@example.com", "secret1", "QuizMaster")
            .await
            .unwrap();
        assert!(outcome.profile_error.is_none());
        assert!(manager.is_authenticated());
        assert_eq!(
            manager.current_user().map(|u| u.id),
            Some(outcome.session.user.id)
        );

        let profile = repo
            .get_profile(outcome.session.user.id)
            .await
            .unwrap()
            .expect("profile");
        assert_eq!(profile.username(), "QuizMaster");

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AuthEventKind::SignedIn);
        assert!(events[0].state.is_authenticated());
    }

    #[tokio::test]
    async fn sign_up_reuses_existing_profile() {
        let repo = InMemoryRepository::new();
        let clock = Clock::Fixed(fixed_now());
        let mut ids = Vec::new();
        for _ in 0..2 {
            let manager = AuthSessionManager::new(
                clock,
                Arc::new(InMemoryIdentityProvider::new(clock)),
                Arc::new(repo.clone()),
            );
            assert!(manager.sign_in("player@example.com", "secret1").await.is_err());
            let outcome = manager
                .sign_up("player@example.com", "secret1", "QuizMaster")
                .await
                .unwrap();
            assert!(outcome.profile_error.is_none());
            ids.push(outcome.session.user.id);
        }
        assert_eq!(ids[0], ids[1]);
        let profile = repo.get_profile(ids[0]).await.unwrap().expect("profile");
        assert_eq!(profile.username(), "QuizMaster");
    }

    #[tokio::test]
    async fn sign_up_keeps_session_when_profile_fails() {
        let (manager, _) = manager();
        let outcome = manager
            .sign_up("player@example.com", "secret1", "x")
            .await
            .unwrap();
        assert!(matches!(
            outcome.profile_error,
            Some(ProfileSetupError::Profile(_))
        ));
        assert!(manager.is_authenticated());
    }

    #[tokio::test]
    async fn failed_sign_in_records_error_without_event() {
        let (manager, _) = manager();
        let (_sub, events) = recorder(&manager);

        let err = manager
            .sign_in("nobody@example.com", "secret1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(
            manager.state().error.as_deref(),
            Some("invalid email or password")
        );
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sign_out_and_refresh_transitions() {
        let (manager, _) = manager();
        manager
            .sign_up("player@example.com", "secret1", "QuizMaster")
            .await
            .unwrap();
        let (_sub, events) = recorder(&manager);

        let before = manager.state().session.unwrap();
        let refreshed = manager.refresh().await.unwrap();
        assert_ne!(refreshed.access_token, before.access_token);

        manager.sign_out().await.unwrap();
        assert!(!manager.is_authenticated());
        assert!(manager.current_user().is_none());
        assert!(matches!(
            manager.sign_out().await,
            Err(AuthError::NotSignedIn)
        ));
        assert!(matches!(manager.refresh().await, Err(AuthError::NotSignedIn)));

        let kinds: Vec<_> = events.lock().unwrap().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![AuthEventKind::Refreshed, AuthEventKind::SignedOut]);
    }

    #[tokio::test]
    async fn dropped_or_unsubscribed_listeners_stop_receiving() {
        let (manager, _) = manager();
        let (kept, kept_events) = recorder(&manager);
        let (dropped, dropped_events) = recorder(&manager);
        let (released, released_events) = recorder(&manager);
        assert_eq!(manager.subscriber_count(), 3);

        drop(dropped);
        released.unsubscribe();
        assert_eq!(manager.subscriber_count(), 1);

        manager.init().await.unwrap();
        assert_eq!(kept_events.lock().unwrap().len(), 1);
        assert!(dropped_events.lock().unwrap().is_empty());
        assert!(released_events.lock().unwrap().is_empty());

        manager.shutdown();
        assert_eq!(manager.subscriber_count(), 0);
        drop(kept);
    }
}
