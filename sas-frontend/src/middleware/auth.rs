use crate::models::{GuardDecision, Role};
use crate::services::{RedirectNavigator, SessionManager};
use crate::utils::redirect_to;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use std::sync::Arc;

const LOADING_PAGE: &str = "<!doctype html><html><head><meta http-equiv=\"refresh\" content=\"1\"></head>\
<body><p class=\"loading\">Carregando…</p></body></html>";

/// Minimum role a group of routes requires.
#[derive(Clone)]
pub struct RouteGuard {
    pub session: SessionManager,
    pub navigator: Arc<RedirectNavigator>,
    pub required: Role,
}

impl RouteGuard {
    pub fn new(session: SessionManager, navigator: Arc<RedirectNavigator>, required: Role) -> Self {
        Self {
            session,
            navigator,
            required,
        }
    }
}

/// Gate a protected view on the session: loading page while bootstrap runs,
/// login redirect (remembering the request) when anonymous, unauthorized
/// redirect when the role is too low.
pub async fn require_role(
    State(guard): State<RouteGuard>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let requested = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    match guard.session.guard(Some(guard.required), &requested) {
        GuardDecision::Pending => {
            let mut response = (StatusCode::SERVICE_UNAVAILABLE, Html(LOADING_PAGE)).into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
            response
        }
        GuardDecision::RedirectToLogin => {
            tracing::debug!(requested = %requested, "Anonymous request to protected route");
            redirect_to(request.headers(), &guard.session.settings().login_route)
        }
        GuardDecision::Forbidden => {
            tracing::info!(
                requested = %requested,
                required = %guard.required,
                "Insufficient role for route"
            );
            redirect_to(request.headers(), &guard.session.settings().unauthorized_route)
        }
        GuardDecision::Allow => {
            guard.navigator.record_location(&requested);
            next.run(request).await
        }
    }
}
