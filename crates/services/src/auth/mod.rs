//! Authentication: identity providers and the session manager that tracks
//! who is signed in.

mod hosted;
mod manager;
mod provider;

use chrono::{DateTime, Utc};
use quiz_core::model::UserId;

pub use hosted::{HostedIdentityConfig, HostedIdentityProvider};
pub use manager::{AuthSessionManager, SignUpOutcome, Subscription};
pub use provider::{IdentityProvider, InMemoryIdentityProvider, MIN_PASSWORD_LEN};

/// The signed-in account as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: UserId,
    pub email: String,
}

/// Tokens for one signed-in account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub user: AuthUser,
}

/// Snapshot of the auth manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub session: Option<AuthSession>,
    pub user: Option<AuthUser>,
    /// `true` until the first `init` resolves.
    pub is_loading: bool,
    /// Message of the last failed provider call, cleared on the next success.
    pub error: Option<String>,
}

impl AuthState {
    #[must_use]
    pub fn loading() -> Self {
        Self {
            session: None,
            user: None,
            is_loading: true,
            error: None,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEventKind {
    Initialized,
    SignedIn,
    SignedOut,
    Refreshed,
}

/// Delivered to every subscriber after a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub state: AuthState,
}

/// Trimmed, lower-cased email with a minimal shape check.
pub(crate) fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() || !domain.contains('.') || domain.contains('@') {
        return None;
    }
    if email.chars().any(char::is_whitespace) {
        return None;
    }
    Some(email)
}
