use crate::config::ApiSettings;
use crate::services::auth_client::error_message;
use crate::services::error::AuthError;
use crate::services::session::{AuthRejected, SessionManager};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use service_core::observability::{TracedClientExt, TracedRequest};
use tokio::sync::mpsc;

/// Client for the backend's resource endpoints (famílias, membros, turmas,
/// presenças, cestas, relatórios).
///
/// Every request carries the current access token. A 401 is reported to the
/// session as an [`AuthRejected`] signal and surfaced as
/// [`AuthError::Rejected`]; the request is never retried with the same
/// credential.
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: SessionManager,
    rejections: mpsc::UnboundedSender<AuthRejected>,
}

impl ApiClient {
    pub fn new(
        settings: &ApiSettings,
        session: SessionManager,
        rejections: mpsc::UnboundedSender<AuthRejected>,
    ) -> Result<Self, anyhow::Error> {
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
            session,
            rejections,
        })
    }

    pub async fn get_json(
        &self,
        path: &str,
        query: &[(String, String)],
        request_id: Option<&str>,
    ) -> Result<Value, AuthError> {
        let url = self.url(path);
        let request = self.client.traced_get(&url).query(query);
        self.send(request, &url, request_id).await
    }

    pub async fn post_json(
        &self,
        path: &str,
        body: &Value,
        request_id: Option<&str>,
    ) -> Result<Value, AuthError> {
        let url = self.url(path);
        let request = self.client.traced_post(&url).json(body);
        self.send(request, &url, request_id).await
    }

    pub async fn put_json(
        &self,
        path: &str,
        body: &Value,
        request_id: Option<&str>,
    ) -> Result<Value, AuthError> {
        let url = self.url(path);
        let request = self.client.traced_put(&url).json(body);
        self.send(request, &url, request_id).await
    }

    pub async fn delete(&self, path: &str, request_id: Option<&str>) -> Result<Value, AuthError> {
        let url = self.url(path);
        let request = self.client.traced_delete(&url);
        self.send(request, &url, request_id).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        request: TracedRequest,
        url: &str,
        request_id: Option<&str>,
    ) -> Result<Value, AuthError> {
        let token = self.session.access_token();
        let request = match &token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send_with_request_id(request_id).await.map_err(|e| {
            tracing::error!("Request to {} failed: {}", url, e);
            AuthError::NetworkUnavailable(e.to_string())
        })?;

        self.read_response(response, token).await
    }

    async fn read_response(
        &self,
        response: Response,
        token: Option<String>,
    ) -> Result<Value, AuthError> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            if let Some(access_token) = token {
                if self.rejections.send(AuthRejected { access_token }).is_err() {
                    tracing::warn!("No session listener for 401 signals");
                }
            }
            return Err(AuthError::Rejected);
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }

        if status.is_success() {
            return response
                .json::<Value>()
                .await
                .map_err(|e| AuthError::Backend {
                    status: status.as_u16(),
                    message: format!("malformed response: {}", e),
                });
        }

        let message = error_message(response)
            .await
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
        Err(AuthError::Backend {
            status: status.as_u16(),
            message,
        })
    }
}
