pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

use services::{ApiClient, RedirectNavigator, SessionManager};
use std::sync::Arc;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub session: SessionManager,
    pub navigator: Arc<RedirectNavigator>,
    pub api: Arc<ApiClient>,
}

impl AppState {
    pub fn new(
        session: SessionManager,
        navigator: Arc<RedirectNavigator>,
        api: Arc<ApiClient>,
    ) -> Self {
        Self {
            session,
            navigator,
            api,
        }
    }
}
