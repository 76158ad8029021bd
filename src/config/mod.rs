use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.toml";
const APP_DIR: &str = "storefront-live";
const ENV_PREFIX: &str = "STOREFRONT_";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub channel: ChannelConfig,
    pub notifications: NotificationsConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ChannelConfig {
    pub url: String,
    pub reconnect_interval_ms: u64,
    pub max_reconnect_attempts: u32,
    pub user_id: Option<String>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: crate::channel::DEFAULT_ENDPOINT.to_string(),
            reconnect_interval_ms: 5000,
            max_reconnect_attempts: 5,
            user_id: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NotificationsConfig {
    pub low_priority_ttl_ms: u64,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            low_priority_ttl_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: crate::api::DEFAULT_BASE_URL.to_string(),
            timeout_secs: 15,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = Self::default();
        let config_path = active_config_path();

        if let Ok(raw) = fs::read_to_string(&config_path) {
            match toml::from_str::<Config>(&raw) {
                Ok(file_config) => config = file_config,
                Err(err) => tracing::warn!(
                    path = %config_path.display(),
                    error = %err,
                    "ignoring unreadable config file"
                ),
            }
        }

        config.apply_env_overrides(|key| env::var(format!("{ENV_PREFIX}{key}")).ok());
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("WS_URL") {
            self.channel.url = val;
        }
        if let Some(interval) = lookup("RECONNECT_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.channel.reconnect_interval_ms = interval;
        }
        if let Some(attempts) = lookup("MAX_RECONNECT_ATTEMPTS").and_then(|v| v.parse().ok()) {
            self.channel.max_reconnect_attempts = attempts;
        }
        if let Some(val) = lookup("USER_ID") {
            self.channel.user_id = Some(val);
        }

        if let Some(ttl) = lookup("NOTIFICATION_TTL_MS").and_then(|v| v.parse().ok()) {
            self.notifications.low_priority_ttl_ms = ttl;
        }

        if let Some(val) = lookup("API_URL") {
            self.api.base_url = val;
        }
        if let Some(secs) = lookup("API_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.api.timeout_secs = secs;
        }
    }

    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.channel.url.trim().is_empty() {
            return Err("channel.url must be set".into());
        }
        if self.channel.reconnect_interval_ms == 0 {
            return Err("channel.reconnect_interval_ms must be non-zero".into());
        }
        if self.notifications.low_priority_ttl_ms == 0 {
            return Err("notifications.low_priority_ttl_ms must be non-zero".into());
        }
        if self.api.base_url.trim().is_empty() {
            return Err("api.base_url must be set".into());
        }
        if self.api.timeout_secs == 0 {
            return Err("api.timeout_secs must be non-zero".into());
        }
        Ok(())
    }

    pub fn write_default<P: AsRef<Path>>(path: P) -> Result<(), Box<dyn std::error::Error>> {
        if path.as_ref().exists() {
            return Err(format!("{} already exists", path.as_ref().display()).into());
        }
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let data = toml::to_string_pretty(&Config::default())?;
        fs::write(path, data)?;
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        managed_config_path()
    }
}

fn managed_config_path() -> PathBuf {
    if let Ok(path) = env::var(format!("{ENV_PREFIX}CONFIG_PATH")) {
        return PathBuf::from(path);
    }
    let base = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| env::var("HOME").map(|home| Path::new(&home).join(".config")))
        .unwrap_or_else(|_| PathBuf::from("."));
    base.join(APP_DIR).join(CONFIG_FILE)
}

fn active_config_path() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE);
    if local.exists() {
        local
    } else {
        managed_config_path()
    }
}
