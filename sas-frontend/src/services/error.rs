use service_core::error::AppError;
use thiserror::Error;

/// Everything the session core can report to view code. Transport and
/// storage failures are converted into these at the boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Login rejected; the message is shown inline on the login form.
    #[error("{0}")]
    InvalidCredentials(String),

    /// Refresh token missing, expired or rejected. The session is gone.
    #[error("Session refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Backend unavailable: {0}")]
    NetworkUnavailable(String),

    /// Authenticated, but the role is below what the operation needs.
    #[error("Insufficient role")]
    Unauthorized,

    /// The backend answered 401 to a request carrying our access token.
    #[error("Authentication rejected by backend")]
    Rejected,

    #[error("Backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("Session storage error: {0}")]
    Storage(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials(msg) => AppError::AuthError(anyhow::anyhow!(msg)),
            AuthError::RefreshFailed(msg) => {
                AppError::Unauthorized(anyhow::anyhow!("Session expired: {}", msg))
            }
            AuthError::NetworkUnavailable(_) => AppError::ServiceUnavailable(None),
            AuthError::Unauthorized => AppError::Forbidden(anyhow::anyhow!("Insufficient role")),
            AuthError::Rejected => {
                AppError::Unauthorized(anyhow::anyhow!("Authentication rejected"))
            }
            AuthError::Backend { status: 404, message } => {
                AppError::NotFound(anyhow::anyhow!(message))
            }
            AuthError::Backend { status, message } if (400..500).contains(&status) => {
                AppError::BadRequest(anyhow::anyhow!(message))
            }
            AuthError::Backend { status, message } => {
                AppError::BadGateway(format!("{} ({})", message, status))
            }
            AuthError::Storage(msg) => AppError::StorageError(anyhow::anyhow!(msg)),
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::NetworkUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn authorization_failure_is_forbidden_not_unauthorized() {
        let response = AppError::from(AuthError::Unauthorized).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn backend_statuses_map_through() {
        let not_found = AuthError::Backend {
            status: 404,
            message: "Família não encontrada".into(),
        };
        assert_eq!(
            AppError::from(not_found).into_response().status(),
            StatusCode::NOT_FOUND
        );

        let upstream = AuthError::Backend {
            status: 500,
            message: "boom".into(),
        };
        assert_eq!(
            AppError::from(upstream).into_response().status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
