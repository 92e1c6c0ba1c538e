#![allow(dead_code)]

use sas_frontend::config::SessionSettings;
use sas_frontend::models::{Role, SessionRecord, TokenResponse, User};
use sas_frontend::services::{
    ManualClock, MemorySessionStore, MockAuthApi, Navigator, RedirectNavigator, SessionManager,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 2024-01-01T00:00:00Z
pub const T0: i64 = 1_704_067_200_000;

pub fn user(role: Role) -> User {
    User {
        id: "42".to_string(),
        email: format!("{}@sas.org", role),
        display_name: format!("Operador {}", role),
        role,
    }
}

pub fn tokens(role: Role, access: &str, refresh: &str, expires_in: i64) -> TokenResponse {
    TokenResponse {
        user: Some(user(role)),
        token: access.to_string(),
        refresh_token: Some(refresh.to_string()),
        expires_in: Some(expires_in),
    }
}

pub fn record(role: Role, access: &str, refresh: &str, expires_at: i64) -> SessionRecord {
    SessionRecord {
        user: user(role),
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        expires_at,
    }
}

/// Navigator that keeps every target it was sent to.
#[derive(Default)]
pub struct CountingNavigator {
    pub targets: Mutex<Vec<String>>,
    pub location: Mutex<Option<String>>,
}

impl CountingNavigator {
    pub fn navigations_to(&self, to: &str) -> usize {
        self.targets
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.as_str() == to)
            .count()
    }
}

impl Navigator for CountingNavigator {
    fn navigate(&self, to: &str) {
        self.targets.lock().unwrap().push(to.to_string());
    }

    fn current_location(&self) -> Option<String> {
        self.location.lock().unwrap().clone()
    }
}

pub struct Harness {
    pub api: Arc<MockAuthApi>,
    pub store: Arc<MemorySessionStore>,
    pub navigator: Arc<RedirectNavigator>,
    pub clock: Arc<ManualClock>,
    pub session: SessionManager,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(MockAuthApi::new(), MemorySessionStore::new())
    }

    pub fn with_store(store: MemorySessionStore) -> Self {
        Self::build(MockAuthApi::new(), store)
    }

    pub fn with_refresh_delay(delay: Duration) -> Self {
        Self::build(
            MockAuthApi::new().with_refresh_delay(delay),
            MemorySessionStore::new(),
        )
    }

    fn build(api: MockAuthApi, store: MemorySessionStore) -> Self {
        let api = Arc::new(api);
        let store = Arc::new(store);
        let navigator = Arc::new(RedirectNavigator::new());
        let clock = Arc::new(ManualClock::new(T0));
        let session = SessionManager::new(
            api.clone(),
            store.clone(),
            navigator.clone(),
            clock.clone(),
            SessionSettings::default(),
        );

        Self {
            api,
            store,
            navigator,
            clock,
            session,
        }
    }

    /// Bootstrap, then log in as `role` with tokens valid for an hour and
    /// drop the landing redirect.
    pub async fn login_as(&self, role: Role) {
        self.session.check_auth().await;
        self.api
            .push_login(Ok(tokens(role, "access-1", "refresh-1", 3600)));
        self.session
            .login("operador@sas.org", "segredo")
            .await
            .unwrap();
        self.navigator.take_redirect();
    }

    pub async fn logged_in(role: Role) -> Self {
        let harness = Self::new();
        harness.login_as(role).await;
        harness
    }
}

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn spawn_backend(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}
