// Service configuration loaded from config/service.toml
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub device: DeviceSettings,
    pub collector: CollectorSettings,
    pub persistence: PersistenceSettings,
    pub server: ServerSettings,
    #[serde(default)]
    pub poller: PollerSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeviceSettings {
    pub base_url: String,
    pub password_file: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectorSettings {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PersistenceSettings {
    pub file: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub listen: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollerSettings {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    #[serde(default = "default_prune_every")]
    pub prune_every: u64,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            retention_secs: default_retention_secs(),
            prune_every: default_prune_every(),
        }
    }
}

fn default_interval_secs() -> u64 {
    3
}

fn default_retention_secs() -> u64 {
    3600
}

fn default_prune_every() -> u64 {
    100
}

pub fn load_service_config() -> anyhow::Result<ServiceConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/service"))
        .build()?;

    Ok(settings.try_deserialize()?)
}
