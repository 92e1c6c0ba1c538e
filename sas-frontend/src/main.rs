use dotenvy::dotenv;
use sas_frontend::config::get_configuration;
use sas_frontend::services::{
    metrics::init_metrics, ApiClient, FileSessionStore, HttpAuthApi, RedirectNavigator,
    SessionManager, SystemClock,
};
use sas_frontend::startup::build_router;
use sas_frontend::AppState;
use service_core::observability::init_tracing;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "sas-frontend",
        &configuration.observability.log_level,
        configuration.observability.otlp_endpoint.as_deref(),
    )?;

    init_metrics().map_err(|e| anyhow::anyhow!("Failed to register metrics: {}", e))?;

    let navigator = Arc::new(RedirectNavigator::new());
    let auth_api = Arc::new(HttpAuthApi::new(&configuration.api)?);
    let store = Arc::new(FileSessionStore::new(
        configuration.session.storage_path.clone(),
    ));

    let session = SessionManager::new(
        auth_api,
        store,
        navigator.clone(),
        Arc::new(SystemClock),
        configuration.session.clone(),
    );

    let (rejections_tx, rejections_rx) = mpsc::unbounded_channel();
    session.listen_for_rejections(rejections_rx);

    let api = Arc::new(ApiClient::new(
        &configuration.api,
        session.clone(),
        rejections_tx,
    )?);

    // Guarded routes answer with a loading page until this finishes.
    let bootstrap = session.clone();
    tokio::spawn(async move { bootstrap.check_auth().await });

    let app = build_router(AppState::new(session, navigator, api));

    let address = format!(
        "{}:{}",
        configuration.server.host, configuration.server.port
    );
    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    info!("Starting sas-frontend on {}", address);
    axum::serve(listener, app).await.map_err(|e| {
        tracing::error!("Server error: {}", e);
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}
