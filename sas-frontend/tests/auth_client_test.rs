mod common;

use axum::{http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use common::spawn_backend;
use sas_frontend::config::ApiSettings;
use sas_frontend::models::Role;
use sas_frontend::services::auth_client::GENERIC_LOGIN_ERROR;
use sas_frontend::services::{AuthApi, AuthError, HttpAuthApi};
use serde_json::{json, Value};

fn client(url: &str) -> HttpAuthApi {
    HttpAuthApi::new(&ApiSettings {
        url: format!("{}/", url),
        request_timeout_secs: Some(5),
    })
    .unwrap()
}

async fn login(Json(body): Json<Value>) -> impl IntoResponse {
    match body["password"].as_str() {
        Some("segredo") => (
            StatusCode::OK,
            Json(json!({
                "user": {"id": 7, "email": body["email"], "nome": "Ana", "tipo": "atendente"},
                "access": "a",
                "refresh": "r",
                "expiresIn": 900
            })),
        )
            .into_response(),
        Some("vazio") => StatusCode::UNAUTHORIZED.into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Credenciais inválidas"})),
        )
            .into_response(),
    }
}

async fn refresh(Json(body): Json<Value>) -> impl IntoResponse {
    if body["refreshToken"] == "r" {
        Json(json!({"token": "a2", "expiresIn": 900})).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Refresh expirado"})),
        )
            .into_response()
    }
}

fn backend() -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(|| async { StatusCode::NO_CONTENT }))
}

#[tokio::test]
async fn login_reads_portuguese_backend_shape() {
    let api = client(&spawn_backend(backend()).await);

    let tokens = api.login("ana@sas.org", "segredo").await.unwrap();

    let user = tokens.user.unwrap();
    assert_eq!(user.id, "7");
    assert_eq!(user.display_name, "Ana");
    assert_eq!(user.role, Role::Attendant);
    assert_eq!(tokens.token, "a");
    assert_eq!(tokens.refresh_token.as_deref(), Some("r"));
    assert_eq!(tokens.expires_in, Some(900));
}

#[tokio::test]
async fn login_failure_carries_server_message() {
    let api = client(&spawn_backend(backend()).await);

    let err = api.login("ana@sas.org", "errada").await.unwrap_err();
    assert_eq!(
        err,
        AuthError::InvalidCredentials("Credenciais inválidas".to_string())
    );

    let err = api.login("ana@sas.org", "vazio").await.unwrap_err();
    assert_eq!(
        err,
        AuthError::InvalidCredentials(GENERIC_LOGIN_ERROR.to_string())
    );
}

#[tokio::test]
async fn unreachable_backend_is_network_unavailable() {
    let api = client("http://127.0.0.1:9");

    let err = api.login("ana@sas.org", "segredo").await.unwrap_err();
    assert!(matches!(err, AuthError::NetworkUnavailable(_)));
}

#[tokio::test]
async fn refresh_maps_rejection() {
    let api = client(&spawn_backend(backend()).await);

    let tokens = api.refresh("r").await.unwrap();
    assert_eq!(tokens.token, "a2");
    assert!(tokens.user.is_none());

    let err = api.refresh("velho").await.unwrap_err();
    assert_eq!(err, AuthError::RefreshFailed("Refresh expirado".to_string()));
}

#[tokio::test]
async fn logout_is_acknowledged() {
    let api = client(&spawn_backend(backend()).await);

    assert_eq!(api.logout("a", "r").await, Ok(()));
}
