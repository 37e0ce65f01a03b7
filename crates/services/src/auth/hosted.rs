use std::env;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Duration;
use quiz_core::Clock;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::{AuthSession, AuthUser, IdentityProvider, MIN_PASSWORD_LEN, normalize_email};
use crate::error::AuthError;

#[derive(Clone, Debug)]
pub struct HostedIdentityConfig {
    pub base_url: String,
    pub api_key: String,
}

impl HostedIdentityConfig {
    /// Read `QUIZ_AUTH_URL` and `QUIZ_AUTH_KEY`; `None` if either is missing or blank.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("QUIZ_AUTH_KEY").ok()?;
        let base_url = env::var("QUIZ_AUTH_URL").ok()?;
        Self::new(base_url, api_key)
    }

    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Option<Self> {
        let base_url = base_url.into();
        let api_key = api_key.into();
        if api_key.trim().is_empty() || base_url.trim().is_empty() {
            return None;
        }
        Some(Self { base_url, api_key })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }
}

/// Identity provider backed by a hosted auth REST API.
#[derive(Clone)]
pub struct HostedIdentityProvider {
    client: Client,
    clock: Clock,
    config: HostedIdentityConfig,
    current: Arc<Mutex<Option<AuthSession>>>,
}

impl HostedIdentityProvider {
    #[must_use]
    pub fn new(config: HostedIdentityConfig, clock: Clock) -> Self {
        Self {
            client: Client::new(),
            clock,
            config,
            current: Arc::default(),
        }
    }

    fn current(&self) -> MutexGuard<'_, Option<AuthSession>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn post_token<T: Serialize + Sync>(
        &self,
        grant_type: &str,
        payload: &T,
    ) -> Result<Response, AuthError> {
        let url = self
            .config
            .endpoint(&format!("/auth/v1/token?grant_type={grant_type}"));
        Ok(self
            .client
            .post(url)
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .json(payload)
            .send()
            .await?)
    }

    fn remember(&self, body: TokenResponse) -> Result<AuthSession, AuthError> {
        let session = session_from_response(body, &self.clock)?;
        *self.current() = Some(session.clone());
        Ok(session)
    }
}

#[async_trait]
impl IdentityProvider for HostedIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = normalize_email(email).ok_or(AuthError::InvalidCredentials)?;
        let response = self
            .post_token(
                "password",
                &Credentials {
                    email: &email,
                    password,
                },
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status {
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => AuthError::InvalidCredentials,
                _ => rejection(response).await,
            });
        }
        self.remember(response.json().await?)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = normalize_email(email).ok_or(AuthError::InvalidEmail)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword {
                min: MIN_PASSWORD_LEN,
            });
        }

        let response = self
            .client
            .post(self.config.endpoint("/auth/v1/signup"))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .json(&Credentials {
                email: &email,
                password,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(match rejection(response).await {
                AuthError::Rejected(message) if message.contains("already") => {
                    AuthError::EmailTaken
                }
                other => other,
            });
        }
        self.remember(response.json().await?)
    }

    async fn sign_out(&self, session: &AuthSession) -> Result<(), AuthError> {
        let response = self
            .client
            .post(self.config.endpoint("/auth/v1/logout"))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        {
            let mut current = self.current();
            if current
                .as_ref()
                .is_some_and(|c| c.access_token == session.access_token)
            {
                *current = None;
            }
        }

        if !response.status().is_success() {
            return Err(AuthError::HttpStatus(response.status()));
        }
        Ok(())
    }

    async fn current_session(&self) -> Result<Option<AuthSession>, AuthError> {
        Ok(self.current().clone())
    }

    async fn refresh(&self, session: &AuthSession) -> Result<AuthSession, AuthError> {
        let response = self
            .post_token(
                "refresh_token",
                &RefreshRequest {
                    refresh_token: &session.refresh_token,
                },
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status {
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => AuthError::NotSignedIn,
                _ => AuthError::HttpStatus(status),
            });
        }
        self.remember(response.json().await?)
    }
}

async fn rejection(response: Response) -> AuthError {
    let status = response.status();
    match response.json::<ErrorResponse>().await {
        Ok(body) => body
            .message()
            .map_or(AuthError::HttpStatus(status), |message| {
                AuthError::Rejected(message.to_lowercase())
            }),
        Err(_) => AuthError::HttpStatus(status),
    }
}

fn session_from_response(body: TokenResponse, clock: &Clock) -> Result<AuthSession, AuthError> {
    let (Some(access_token), Some(refresh_token)) = (body.access_token, body.refresh_token) else {
        return Err(AuthError::ConfirmationRequired);
    };
    let user = body
        .user
        .ok_or_else(|| AuthError::MalformedResponse("missing user".into()))?;
    let id = user
        .id
        .parse()
        .map_err(|e| AuthError::MalformedResponse(format!("user id: {e}")))?;
    let email = user
        .email
        .ok_or_else(|| AuthError::MalformedResponse("missing email".into()))?;

    Ok(AuthSession {
        access_token,
        refresh_token,
        expires_at: body
            .expires_in
            .map(|secs| clock.now() + Duration::seconds(secs)),
        user: AuthUser {
            id,
            email: email.to_lowercase(),
        },
    })
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    user: Option<UserResponse>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
}

impl ErrorResponse {
    fn message(self) -> Option<String> {
        self.msg.or(self.message).or(self.error_description)
    }
}
