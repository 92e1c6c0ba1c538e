use crate::config::ApiSettings;
use crate::models::TokenResponse;
use crate::services::error::AuthError;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::json;
use service_core::observability::TracedClientExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const GENERIC_LOGIN_ERROR: &str = "Falha na autenticação. Verifique suas credenciais.";

/// The backend's authentication endpoints.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /auth/login`
    async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, AuthError>;
    /// `POST /auth/refresh`
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError>;
    /// `POST /auth/logout`; best effort, callers ignore the outcome.
    async fn logout(&self, access_token: &str, refresh_token: &str) -> Result<(), AuthError>;
}

pub struct HttpAuthApi {
    client: Client,
    base_url: String,
}

impl HttpAuthApi {
    pub fn new(settings: &ApiSettings) -> Result<Self, anyhow::Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = settings.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<Response, AuthError> {
        let url = format!("{}{}", self.base_url, path);

        self.client
            .traced_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send POST request to {}: {}", url, e);
                AuthError::NetworkUnavailable(e.to_string())
            })
    }
}

/// Pull the human readable message out of an error body, accepting both
/// `{message}` and the `{detail}` shape the backend framework emits.
pub async fn error_message(response: Response) -> Option<String> {
    let body: serde_json::Value = response.json().await.ok()?;
    ["message", "detail", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, AuthError> {
        let response = self
            .post(
                "/auth/login",
                json!({
                    "email": email,
                    "password": password,
                }),
            )
            .await?;

        let status = response.status();
        if status.is_success() {
            return response.json::<TokenResponse>().await.map_err(|e| {
                tracing::error!("Malformed login response: {}", e);
                AuthError::NetworkUnavailable(format!("malformed login response: {}", e))
            });
        }

        if status.is_server_error() {
            tracing::warn!(status = %status, "Auth backend failed during login");
            return Err(AuthError::NetworkUnavailable(format!(
                "auth backend returned {}",
                status
            )));
        }

        let message = error_message(response)
            .await
            .unwrap_or_else(|| GENERIC_LOGIN_ERROR.to_string());
        Err(AuthError::InvalidCredentials(message))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        let response = self
            .post("/auth/refresh", json!({ "refreshToken": refresh_token }))
            .await?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<TokenResponse>()
                .await
                .map_err(|e| AuthError::RefreshFailed(format!("malformed refresh response: {}", e)));
        }

        let reason = match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::BAD_REQUEST => {
                error_message(response)
                    .await
                    .unwrap_or_else(|| "refresh token rejected".to_string())
            }
            other => format!("auth backend returned {}", other),
        };
        Err(AuthError::RefreshFailed(reason))
    }

    async fn logout(&self, access_token: &str, refresh_token: &str) -> Result<(), AuthError> {
        let url = format!("{}/auth/logout", self.base_url);
        let response = self
            .client
            .traced_post(&url)
            .bearer_auth(access_token)
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AuthError::Backend {
                status: response.status().as_u16(),
                message: "logout not acknowledged".to_string(),
            })
        }
    }
}

/// Scripted `AuthApi` for tests and local development. Responses are
/// consumed in order; an empty script fails the call.
#[derive(Default)]
pub struct MockAuthApi {
    pub login_results: Mutex<VecDeque<Result<TokenResponse, AuthError>>>,
    pub refresh_results: Mutex<VecDeque<Result<TokenResponse, AuthError>>>,
    pub login_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    refresh_delay: Option<Duration>,
}

impl MockAuthApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every refresh suspend for `delay` before answering.
    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = Some(delay);
        self
    }

    pub fn push_login(&self, result: Result<TokenResponse, AuthError>) {
        self.login_results
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(result);
    }

    pub fn push_refresh(&self, result: Result<TokenResponse, AuthError>) {
        self.refresh_results
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(result);
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn login_count(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn logout_count(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthApi for MockAuthApi {
    async fn login(&self, _email: &str, _password: &str) -> Result<TokenResponse, AuthError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.login_results
            .lock()
            .map_err(|e| AuthError::NetworkUnavailable(format!("mock poisoned: {}", e)))?
            .pop_front()
            .unwrap_or_else(|| Err(AuthError::InvalidCredentials(GENERIC_LOGIN_ERROR.into())))
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenResponse, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.refresh_delay {
            tokio::time::sleep(delay).await;
        }
        self.refresh_results
            .lock()
            .map_err(|e| AuthError::NetworkUnavailable(format!("mock poisoned: {}", e)))?
            .pop_front()
            .unwrap_or_else(|| Err(AuthError::RefreshFailed("no scripted refresh".into())))
    }

    async fn logout(&self, _access_token: &str, _refresh_token: &str) -> Result<(), AuthError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
