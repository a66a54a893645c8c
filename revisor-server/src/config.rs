use anyhow::{anyhow, bail, Context, Result};
use revisor_core::{to_cookie_string, CookieMap, SessionState, DEFAULT_MODEL};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
pub const CONFIG_PATH_ENV: &str = "REVISOR_CONFIG";

/// Key under which the cookie string is stored in the config file.
const COOKIES_KEY: &str = "cookies";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub project_id: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// Appended verbatim to every comment before it becomes a prompt.
    #[serde(default)]
    pub additional_note: String,
    /// Only act on comments from users who liked the project.
    #[serde(default)]
    pub require_like_project: bool,
    /// Prepended to every automated reply; doubles as the marker that
    /// identifies a comment as already handled.
    pub auto_response_prefix: String,
    pub auto_response_create_revision: String,
    pub auto_response_require_likes: String,
    /// Seconds to wait between the end of one cycle and the next.
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default, with = "cookie_string")]
    pub cookies: CookieMap,
    #[serde(default)]
    pub recording_enabled: bool,
    #[serde(default = "default_recording_log_path")]
    pub recording_log_path: String,
}

fn default_base_url() -> String {
    "http://localhost".to_string()
}

fn default_model_id() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_interval() -> u64 {
    10
}

fn default_recording_log_path() -> String {
    "recordings.jsonl".to_string()
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            bail!("project_id must not be empty");
        }
        if self.auto_response_prefix.is_empty() {
            bail!("auto_response_prefix must not be empty, it is used to detect earlier replies");
        }
        url::Url::parse(&self.base_url)
            .with_context(|| format!("base_url is not a valid URL: {}", self.base_url))?;
        if self.interval == 0 {
            bail!("interval must be at least one second");
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn session(&self) -> SessionState {
        SessionState::new(self.cookies.clone())
    }
}

/// The YAML file that holds the config and the persisted session cookies.
///
/// Only one process may write to a given file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path from `REVISOR_CONFIG`, falling back to `config.yaml`.
    pub fn from_env() -> Self {
        let path = env::var(CONFIG_PATH_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Config> {
        if !self.path.exists() {
            return Err(anyhow!(
                "Configuration file not found: {}",
                self.path.display()
            ));
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        config.validate()?;

        Ok(config)
    }

    /// Replace the stored cookie string, leaving every other key untouched.
    /// The file must already exist.
    pub fn save_cookies(&self, cookies: &CookieMap) -> Result<()> {
        if !self.path.exists() {
            return Err(anyhow!(
                "Configuration file not found when saving cookies: {}",
                self.path.display()
            ));
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let mut document: serde_yaml::Value = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;

        let mapping = document
            .as_mapping_mut()
            .ok_or_else(|| anyhow!("{} is not a YAML mapping", self.path.display()))?;
        mapping.insert(
            serde_yaml::Value::String(COOKIES_KEY.to_string()),
            serde_yaml::Value::String(to_cookie_string(cookies)),
        );

        let updated = serde_yaml::to_string(&document).context("Failed to serialize config")?;
        fs::write(&self.path, updated)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        Ok(())
    }
}

/// Cookies are stored as one `name=value; name2=value2` string. A plain
/// mapping is accepted on load too.
mod cookie_string {
    use revisor_core::{parse_cookie_string, to_cookie_string, CookieMap};
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Stored {
        Text(String),
        Map(CookieMap),
    }

    pub fn serialize<S: Serializer>(cookies: &CookieMap, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&to_cookie_string(cookies))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<CookieMap, D::Error> {
        Ok(match Option::<Stored>::deserialize(deserializer)? {
            Some(Stored::Text(text)) => parse_cookie_string(&text),
            Some(Stored::Map(map)) => map,
            None => CookieMap::new(),
        })
    }
}
