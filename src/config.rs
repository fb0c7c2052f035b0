use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::Credentials;
use crate::domain::Timings;
use crate::error::CuratorError;

pub const CONFIG_FILE_NAME: &str = "girder-curator.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub default_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileEntry>,
    #[serde(default)]
    pub timings: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub context: Option<Value>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ProfileEntry {
    pub api_url: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ProfileConfig {
    pub name: String,
    pub api_url: String,
    pub credentials: Option<Credentials>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub profile: ProfileConfig,
    pub timings: Timings,
    pub context: Value,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from `path`, else `./girder-curator.json`, else the user config
    /// directory.
    pub fn resolve(path: Option<&str>, profile: Option<&str>) -> Result<ResolvedConfig, CuratorError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => Self::discover().ok_or(CuratorError::MissingConfig)?,
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| CuratorError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| CuratorError::ConfigParse(err.to_string()))?;
        tracing::debug!(path = %config_path.display(), "loaded config");

        Self::resolve_config(config, profile)
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("girder-curator").join("config.json"))
            .filter(|path| path.exists())
    }

    pub fn resolve_config(
        mut config: Config,
        profile: Option<&str>,
    ) -> Result<ResolvedConfig, CuratorError> {
        let name = match profile.map(str::to_string).or(config.default_profile.clone()) {
            Some(name) => name,
            None if config.profiles.len() == 1 => config
                .profiles
                .keys()
                .next()
                .cloned()
                .ok_or(CuratorError::MissingConfig)?,
            None => return Err(CuratorError::UnknownProfile("<unspecified>".to_string())),
        };
        let entry = config
            .profiles
            .remove(&name)
            .ok_or_else(|| CuratorError::UnknownProfile(name.clone()))?;

        let credentials = match (entry.api_key, entry.user, entry.password) {
            (Some(key), _, _) => Some(Credentials::ApiKey { key }),
            (None, Some(user), Some(password)) => Some(Credentials::Password { user, password }),
            _ => None,
        };

        Ok(ResolvedConfig {
            profile: ProfileConfig {
                name,
                api_url: entry.api_url,
                credentials,
                timeout: Duration::from_secs(entry.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            },
            timings: config.timings.map(Timings::new).unwrap_or_default(),
            context: config.context.unwrap_or_else(|| Value::Object(Map::new())),
        })
    }
}
