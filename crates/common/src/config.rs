//! Runner configuration (`pagecheck.toml`)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::viewport::Viewport;

pub const BASE_URL_ENV: &str = "PAGECHECK_BASE_URL";
pub const WEBDRIVER_URL_ENV: &str = "PAGECHECK_WEBDRIVER_URL";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL that relative suite entry points are resolved against
    pub base_url: String,

    /// Clear client storage before every test unless a suite says otherwise
    pub test_isolation: bool,

    /// How long an expectation keeps polling before it fails
    pub default_command_timeout_ms: u64,

    /// Delay between two polls of the same expectation
    pub poll_interval_ms: u64,

    /// Viewport applied when a session starts
    pub viewport: Viewport,

    /// Directory searched for YAML suite files
    pub specs_dir: PathBuf,

    /// Directory results are written to
    pub output_dir: PathBuf,

    pub webdriver: WebDriverConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            test_isolation: true,
            default_command_timeout_ms: 4000,
            poll_interval_ms: 50,
            viewport: Viewport::default(),
            specs_dir: PathBuf::from("specs"),
            output_dir: PathBuf::from("test-results"),
            webdriver: WebDriverConfig::default(),
        }
    }
}

/// WebDriver endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverConfig {
    pub url: String,
    pub browser: String,
    pub headless: bool,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:4444".to_string(),
            browser: "chrome".to_string(),
            headless: true,
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults when the file
    /// does not exist. Environment overrides are applied afterwards.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// [`Config::load`] with a custom environment resolver
    pub fn load_with(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.apply_overrides(env);
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Environment beats the file, the file beats defaults
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(url) = env(BASE_URL_ENV) {
            self.base_url = url;
        }
        if let Some(url) = env(WEBDRIVER_URL_ENV) {
            self.webdriver.url = url;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::InvalidConfig(format!(
                "base_url must be an http(s) URL, got `{}`",
                self.base_url
            )));
        }
        if self.default_command_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "default_command_timeout_ms must be positive".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::InvalidConfig("poll_interval_ms must be positive".to_string()));
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.default_command_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Resolve a suite entry point: absolute URLs are kept as-is, anything
    /// else is appended to the base URL.
    pub fn resolve_url(&self, entry: &str) -> String {
        resolve_url(&self.base_url, entry)
    }
}

pub fn resolve_url(base: &str, entry: &str) -> String {
    if entry.starts_with("http://") || entry.starts_with("https://") {
        return entry.to_string();
    }
    let base = base.trim_end_matches('/');
    if entry.is_empty() {
        base.to_string()
    } else if entry.starts_with('/') {
        format!("{}{}", base, entry)
    } else {
        format!("{}/{}", base, entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pagecheck.toml");
        std::fs::write(
            &path,
            "base_url = \"https://ca-qa.seamless.md\"\ntest_isolation = false\n\n[viewport]\nwidth = 1280\nheight = 720\n",
        )
        .unwrap();

        let config: Config = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(config.base_url, "https://ca-qa.seamless.md");
        assert!(!config.test_isolation);
        assert_eq!(config.viewport, Viewport::new(1280, 720));
        assert_eq!(config.default_command_timeout_ms, 4000);
        assert_eq!(config.webdriver.browser, "chrome");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pagecheck.toml");
        let config = Config {
            poll_interval_ms: 25,
            ..Default::default()
        };
        config.save(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let loaded: Config = toml::from_str(&text).unwrap();
        assert_eq!(loaded.poll_interval_ms, 25);
    }

    fn env(vars: &[(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        let vars = vars.to_vec();
        move |key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_with(&dir.path().join("absent.toml"), env(&[])).unwrap();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.webdriver.url, "http://localhost:4444");
        assert!(config.test_isolation);
        assert_eq!(config.specs_dir, PathBuf::from("specs"));
    }

    #[test]
    fn test_load_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pagecheck.toml");
        std::fs::write(
            &path,
            "base_url = \"https://ca-qa.seamless.md\"\n\n[webdriver]\nurl = \"http://grid:4444\"\n",
        )
        .unwrap();

        let config = Config::load_with(&path, env(&[])).unwrap();
        assert_eq!(config.base_url, "https://ca-qa.seamless.md");
        assert_eq!(config.webdriver.url, "http://grid:4444");

        let config =
            Config::load_with(&path, env(&[(BASE_URL_ENV, "https://staging.test")])).unwrap();
        assert_eq!(config.base_url, "https://staging.test");
        assert_eq!(config.webdriver.url, "http://grid:4444");

        let config =
            Config::load_with(&path, env(&[(WEBDRIVER_URL_ENV, "http://localhost:9515")]))
                .unwrap();
        assert_eq!(config.base_url, "https://ca-qa.seamless.md");
        assert_eq!(config.webdriver.url, "http://localhost:9515");
    }

    #[test]
    fn test_load_validates_after_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pagecheck.toml");
        std::fs::write(&path, "base_url = \"https://ca-qa.seamless.md\"\n").unwrap();

        let err = Config::load_with(&path, env(&[(BASE_URL_ENV, "ca-qa.seamless.md")]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(msg) if msg.contains("ca-qa.seamless.md")));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config {
            base_url: "ftp://example.com".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(resolve_url("https://ca-qa.seamless.md", "/#/"), "https://ca-qa.seamless.md/#/");
        assert_eq!(resolve_url("https://a.test/", "login"), "https://a.test/login");
        assert_eq!(resolve_url("https://a.test", "https://b.test/#/"), "https://b.test/#/");
        assert_eq!(resolve_url("https://a.test/", ""), "https://a.test");
    }
}
