use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub server: ServerSettings,
    pub api: ApiSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub observability: ObservabilitySettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ApiSettings {
    /// Base URL of the REST backend, e.g. `http://localhost:8000/api`.
    pub url: String,
    /// No client-side timeout is applied when unset.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl ApiSettings {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct SessionSettings {
    /// File holding the persisted session record.
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,
    /// Lead time before `expires_at` at which the access token is refreshed.
    #[serde(default = "default_refresh_threshold_secs")]
    pub refresh_threshold_secs: u64,
    #[serde(default = "default_watch_interval_secs")]
    pub watch_interval_secs: u64,
    #[serde(default = "default_login_route")]
    pub login_route: String,
    #[serde(default = "default_landing_route")]
    pub landing_route: String,
    #[serde(default = "default_unauthorized_route")]
    pub unauthorized_route: String,
}

impl SessionSettings {
    pub fn refresh_threshold(&self) -> Duration {
        Duration::from_secs(self.refresh_threshold_secs)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_secs(self.watch_interval_secs.max(1))
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            refresh_threshold_secs: default_refresh_threshold_secs(),
            watch_interval_secs: default_watch_interval_secs(),
            login_route: default_login_route(),
            landing_route: default_landing_route(),
            unauthorized_route: default_unauthorized_route(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from(".sas/session.json")
}

fn default_refresh_threshold_secs() -> u64 {
    5 * 60
}

fn default_watch_interval_secs() -> u64 {
    60
}

fn default_login_route() -> String {
    "/login".to_string()
}

fn default_landing_route() -> String {
    "/".to_string()
}

fn default_unauthorized_route() -> String {
    "/unauthorized".to_string()
}

#[derive(Deserialize, Clone, Debug)]
pub struct ObservabilitySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// OTLP collector endpoint; spans are only exported when set.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("No working directory: {}", e)))?;

    // Running from the workspace root or from inside the crate both work.
    let configuration_directory = if base_path.ends_with("sas-frontend") {
        base_path.join("config")
    } else {
        base_path.join("sas-frontend").join("config")
    };

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")).required(true))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
