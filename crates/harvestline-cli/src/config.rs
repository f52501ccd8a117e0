//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use harvestline_core::{HttpConfig, RetryPolicy};
use serde::Deserialize;

/// Global configuration for harvestline
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub sru: SruConfig,
    pub hub: HubConfig,
    pub http: HttpSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SruConfig {
    pub base_url: String,
    pub query: String,
    /// `1.2` or `2.0`
    pub version: String,
    pub connection: String,
    pub output_dir: PathBuf,
    pub batch_size: u32,
    /// Seconds between page requests
    pub sleep: f64,
    pub progress_file: PathBuf,
}

impl Default for SruConfig {
    fn default() -> Self {
        let defaults = harvestline_sru::Config::default();
        Self {
            base_url: defaults.base_url,
            query: defaults.query,
            version: defaults.version.to_string(),
            connection: defaults.connection,
            output_dir: defaults.output_dir,
            batch_size: defaults.page_size,
            sleep: defaults.polite_delay.as_secs_f64(),
            progress_file: defaults.progress_path,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub repo_id: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub token: Option<String>,
    pub data_dir: PathBuf,
    pub shard_size: usize,
    pub progress_file: PathBuf,
    pub source_label: String,
    pub endpoint: String,
    pub revision: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        let defaults = harvestline_hub::Config::default();
        Self {
            repo_id: None,
            token: None,
            data_dir: defaults.data_dir,
            shard_size: defaults.shard_size.get(),
            progress_file: defaults.progress_path,
            source_label: defaults.source_label,
            endpoint: defaults.endpoint,
            revision: defaults.revision,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub max_retries: u32,
    pub retry_base_secs: f64,
    pub retry_jitter_secs: f64,
    pub connect_timeout: u64,
    pub request_timeout: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        let http = HttpConfig::default();
        Self {
            max_retries: retry.max_attempts,
            retry_base_secs: retry.base_delay.as_secs_f64(),
            retry_jitter_secs: retry.max_jitter.as_secs_f64(),
            connect_timeout: http.connect_timeout.as_secs(),
            request_timeout: http.request_timeout.as_secs(),
        }
    }
}

impl HttpSettings {
    /// Retry schedule, with optional CLI overrides
    pub fn retry_policy(&self, max_retries: Option<u32>, base_secs: Option<f64>) -> RetryPolicy {
        RetryPolicy {
            max_attempts: max_retries.unwrap_or(self.max_retries).max(1),
            base_delay: secs(base_secs.unwrap_or(self.retry_base_secs)),
            max_jitter: secs(self.retry_jitter_secs),
        }
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout),
            request_timeout: Duration::from_secs(self.request_timeout),
            ..Default::default()
        }
    }
}

/// Seconds to duration, treating negative and non-finite values as zero
pub fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// Deserialize a string that may be an environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// `${VAR}` becomes the variable's value (None if unset); anything else is kept literally
fn expand_env_var(s: &str) -> Option<String> {
    match s.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
        Some(name) => std::env::var(name).ok(),
        None => Some(s.to_string()),
    }
}

/// First `.env` in the working directory or one of its parents
pub fn find_env_file() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    cwd.ancestors()
        .map(|dir| dir.join(".env"))
        .find(|path| path.is_file())
}

/// Export the `KEY=value` lines of `path` into the process environment.
/// Variables that are already set keep their value.
pub fn load_env_file(path: &Path) -> Result<()> {
    dotenvy::from_path(path)
        .with_context(|| format!("Failed to read env file: {}", path.display()))
}

impl Config {
    /// Candidate config files, most specific first:
    /// `./harvestline.toml`, then `~/.config/harvestline/config.toml`.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("harvestline.toml")];
        if let Some(dirs) = directories::ProjectDirs::from("", "", "harvestline") {
            paths.push(dirs.config_dir().join("config.toml"));
        }
        paths
    }

    /// First existing file from [`Config::search_paths`], or defaults.
    pub fn load() -> Result<Self> {
        match Self::search_paths().into_iter().find(|p| p.is_file()) {
            Some(path) => Self::from_file(&path),
            None => {
                log::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = toml::from_str::<Config>(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.sru.version, "1.2");
        assert_eq!(config.sru.connection, "BWB");
        assert_eq!(config.sru.batch_size, 100);
        assert_eq!(config.sru.sleep, 3.0);
        assert_eq!(config.sru.progress_file, PathBuf::from("sru_progress.json"));
        assert_eq!(config.hub.shard_size, 500);
        assert_eq!(config.hub.progress_file, PathBuf::from("upload_progress.json"));
        assert_eq!(config.http.max_retries, 5);
    }

    #[test]
    fn expand_env_var_simple() {
        std::env::set_var("HARVESTLINE_TEST_TOKEN", "hf_xyz");
        assert_eq!(
            expand_env_var("${HARVESTLINE_TEST_TOKEN}"),
            Some("hf_xyz".to_string())
        );
        std::env::remove_var("HARVESTLINE_TEST_TOKEN");
    }

    #[test]
    fn expand_env_var_literal() {
        assert_eq!(expand_env_var("hf_literal"), Some("hf_literal".to_string()));
    }

    #[test]
    fn expand_env_var_missing() {
        assert_eq!(expand_env_var("${NONEXISTENT_VAR_12345}"), None);
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[sru]
query = "modified>=2024-01-01"
version = "2.0"
batch_size = 50
sleep = 0.5

[hub]
repo_id = "org/wetten"
shard_size = 250

[http]
max_retries = 3
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.sru.query, "modified>=2024-01-01");
        assert_eq!(config.sru.version, "2.0");
        assert_eq!(config.sru.batch_size, 50);
        assert_eq!(config.sru.connection, "BWB");
        assert_eq!(config.hub.repo_id.as_deref(), Some("org/wetten"));
        assert_eq!(config.hub.shard_size, 250);
        assert_eq!(config.http.max_retries, 3);
        assert_eq!(config.http.retry_base_secs, 2.0);
    }

    #[test]
    fn local_file_searched_first() {
        let paths = Config::search_paths();
        assert_eq!(paths[0], PathBuf::from("harvestline.toml"));
    }

    #[test]
    fn invalid_value_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[sru]\nbatch_size = \"many\"\n").unwrap();
        let err = Config::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn env_file_fills_unset_variables() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "HARVESTLINE_ENV_FILE_NEW=from_file\nHARVESTLINE_ENV_FILE_SET=from_file\n",
        )
        .unwrap();
        std::env::set_var("HARVESTLINE_ENV_FILE_SET", "from_shell");

        load_env_file(&path).unwrap();

        assert_eq!(std::env::var("HARVESTLINE_ENV_FILE_NEW").unwrap(), "from_file");
        assert_eq!(std::env::var("HARVESTLINE_ENV_FILE_SET").unwrap(), "from_shell");
        std::env::remove_var("HARVESTLINE_ENV_FILE_NEW");
        std::env::remove_var("HARVESTLINE_ENV_FILE_SET");
    }

    #[test]
    fn missing_env_file_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = load_env_file(&dir.path().join(".env")).unwrap_err();
        assert!(err.to_string().contains(".env"));
    }

    #[test]
    fn retry_policy_overrides() {
        let http = HttpSettings::default();
        let policy = http.retry_policy(Some(2), Some(0.5));
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert_eq!(http.retry_policy(Some(0), None).max_attempts, 1);
        assert_eq!(http.retry_policy(None, None), RetryPolicy::default());
    }

    #[test]
    fn negative_seconds_are_zero() {
        assert_eq!(secs(-1.0), Duration::ZERO);
        assert_eq!(secs(f64::NAN), Duration::ZERO);
        assert_eq!(secs(1.5), Duration::from_millis(1500));
    }
}
