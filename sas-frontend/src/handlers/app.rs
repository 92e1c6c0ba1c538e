use crate::models::{Role, SessionSnapshot};
use crate::AppState;
use askama::Template;
use axum::{extract::State, response::IntoResponse, Json};

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub user_label: String,
    pub role: Role,
    pub can_edit: bool,
    pub can_report: bool,
}

#[derive(Template)]
#[template(path = "unauthorized.html")]
pub struct UnauthorizedTemplate {
    pub home: String,
}

pub async fn health_check() -> &'static str {
    "OK"
}

/// Landing page. Sits behind the viewer guard, so a user is present.
pub async fn dashboard(State(state): State<AppState>) -> impl IntoResponse {
    let session = &state.session;
    let (user_label, role) = session
        .user()
        .map(|u| (u.label().to_string(), u.role))
        .unwrap_or_else(|| ("usuário".to_string(), Role::Viewer));

    DashboardTemplate {
        user_label,
        role,
        can_edit: session.has_permission(Some(Role::Attendant)),
        can_report: session.has_permission(Some(Role::Admin)),
    }
}

pub async fn unauthorized_page(State(state): State<AppState>) -> impl IntoResponse {
    UnauthorizedTemplate {
        home: state.session.settings().landing_route.clone(),
    }
}

/// Read-only session view for scripts in the page.
pub async fn session_status(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot())
}
