//! Pass-through views over the backend's CRUD resources. Shapes are the
//! backend's business; these handlers only add the session's credential and
//! turn failures into responses.

use crate::services::AuthError;
use crate::utils::redirect_to;
use crate::AppState;
use axum::{
    extract::{MatchedPath, Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use service_core::error::AppError;
use service_core::middleware::REQUEST_ID_HEADER;

pub const RESOURCES: &[&str] = &["familias", "membros", "turmas", "presencas", "cestas"];

pub const REPORTS: &[&str] = &["frequencia", "cestas", "tamanhos", "programas-sociais"];

fn resource_of(matched: &MatchedPath) -> Result<&'static str, AppError> {
    let segment = matched
        .as_str()
        .trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or_default();

    RESOURCES
        .iter()
        .copied()
        .find(|r| *r == segment)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Unknown resource {}", segment)))
}

fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers.get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok())
}

/// A rejected credential sends the browser to login; the session has
/// already been ended by the rejection listener.
fn respond(state: &AppState, headers: &HeaderMap, result: Result<Value, AuthError>) -> Response {
    match result {
        Ok(body) => Json(body).into_response(),
        Err(AuthError::Rejected) => redirect_to(headers, &state.session.settings().login_route),
        Err(e) => AppError::from(e).into_response(),
    }
}

pub async fn list_resource(
    State(state): State<AppState>,
    matched: MatchedPath,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let resource = match resource_of(&matched) {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };
    let result = state
        .api
        .get_json(&format!("/{}/", resource), &params, request_id(&headers))
        .await;
    respond(&state, &headers, result)
}

pub async fn get_resource(
    State(state): State<AppState>,
    matched: MatchedPath,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let resource = match resource_of(&matched) {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };
    let result = state
        .api
        .get_json(&format!("/{}/{}/", resource, id), &[], request_id(&headers))
        .await;
    respond(&state, &headers, result)
}

pub async fn create_resource(
    State(state): State<AppState>,
    matched: MatchedPath,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let resource = match resource_of(&matched) {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };
    let result = state
        .api
        .post_json(&format!("/{}/", resource), &body, request_id(&headers))
        .await;
    respond(&state, &headers, result)
}

pub async fn update_resource(
    State(state): State<AppState>,
    matched: MatchedPath,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let resource = match resource_of(&matched) {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };
    let result = state
        .api
        .put_json(&format!("/{}/{}/", resource, id), &body, request_id(&headers))
        .await;
    respond(&state, &headers, result)
}

pub async fn delete_resource(
    State(state): State<AppState>,
    matched: MatchedPath,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let resource = match resource_of(&matched) {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };
    let result = state
        .api
        .delete(&format!("/{}/{}/", resource, id), request_id(&headers))
        .await;
    respond(&state, &headers, result)
}

pub async fn report(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(kind): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    if !REPORTS.contains(&kind.as_str()) {
        return AppError::NotFound(anyhow::anyhow!("Unknown report {}", kind)).into_response();
    }
    let result = state
        .api
        .get_json(&format!("/relatorios/{}/", kind), &params, request_id(&headers))
        .await;
    respond(&state, &headers, result)
}
