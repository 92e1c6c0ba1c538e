use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use service_core::middleware::request_id_middleware;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    app::{dashboard, health_check, session_status, unauthorized_page},
    auth::{login_handler, login_page, logout_handler},
    metrics::metrics,
    resources::{
        create_resource, delete_resource, get_resource, list_resource, report, update_resource,
        RESOURCES,
    },
};
use crate::middleware::{metrics_middleware, require_role, RouteGuard};
use crate::models::Role;
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    let guard = |required: Role| {
        from_fn_with_state(
            RouteGuard::new(state.session.clone(), state.navigator.clone(), required),
            require_role,
        )
    };
    let viewer = guard(Role::Viewer);
    let attendant = guard(Role::Attendant);
    let admin = guard(Role::Admin);

    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/login", get(login_page).post(login_handler))
        .route("/logout", post(logout_handler))
        .route("/unauthorized", get(unauthorized_page))
        .route("/session", get(session_status))
        .route("/", get(dashboard).layer(viewer.clone()))
        .route("/relatorios/:kind", get(report).layer(admin));

    // Reading is open to every role; writing needs at least an attendant.
    for resource in RESOURCES {
        let collection = format!("/{}", resource);
        let item = format!("/{}/:id", resource);
        router = router
            .route(&collection, get(list_resource).layer(viewer.clone()))
            .route(&collection, post(create_resource).layer(attendant.clone()))
            .route(&item, get(get_resource).layer(viewer.clone()))
            .route(
                &item,
                put(update_resource)
                    .delete(delete_resource)
                    .layer(attendant.clone()),
            );
    }

    router
        .route_layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
