use crate::models::LoginForm;
use crate::services::AuthError;
use crate::utils::redirect_to;
use crate::AppState;
use askama::Template;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Form,
};
use secrecy::ExposeSecret;
use validator::{Validate, ValidationErrors};

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub email: String,
    pub error: Option<String>,
}

impl LoginTemplate {
    fn failed(email: String, message: impl Into<String>) -> Self {
        Self {
            email,
            error: Some(message.into()),
        }
    }
}

pub async fn login_page() -> impl IntoResponse {
    LoginTemplate {
        email: String::new(),
        error: None,
    }
}

fn first_message(errors: &ValidationErrors) -> String {
    let fields = errors.field_errors();
    ["email", "password"]
        .iter()
        .filter_map(|field| fields.get(field))
        .flat_map(|errs| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Dados de acesso inválidos".to_string())
}

/// Errors are rendered inline on the login form; the browser only moves
/// on success.
pub async fn login_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    if let Err(errors) = form.validate() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            LoginTemplate::failed(form.email, first_message(&errors)),
        )
            .into_response();
    }

    let (email, password) = form.into_credentials();

    match state.session.login(&email, password.expose_secret()).await {
        Ok(()) => {
            let to = state
                .navigator
                .take_redirect()
                .unwrap_or_else(|| state.session.settings().landing_route.clone());
            redirect_to(&headers, &to)
        }
        Err(AuthError::InvalidCredentials(message)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            LoginTemplate::failed(email, message),
        )
            .into_response(),
        Err(AuthError::NetworkUnavailable(reason)) => {
            tracing::warn!(reason = %reason, "Login could not reach the backend");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                LoginTemplate::failed(email, "Servidor indisponível. Tente novamente."),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Login failed unexpectedly: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                LoginTemplate::failed(email, "Erro inesperado ao entrar."),
            )
                .into_response()
        }
    }
}

pub async fn logout_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    state.session.logout().await;

    let to = state
        .navigator
        .take_redirect()
        .unwrap_or_else(|| state.session.settings().login_route.clone());
    redirect_to(&headers, &to)
}
