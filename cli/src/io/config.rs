//! CLI configuration stored under `.codecrafters/config.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default location of the config file, relative to the repository root.
pub const DEFAULT_CONFIG_PATH: &str = ".codecrafters/config.toml";
/// Environment variable that overrides `server_url`.
pub const SERVER_URL_ENV: &str = "CODECRAFTERS_SERVER_URL";

/// CLI configuration (TOML).
///
/// Missing fields fall back to the production defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CliConfig {
    /// Base URL of the grading backend.
    pub server_url: String,

    /// Per-request timeout for backend calls, in seconds.
    pub request_timeout_secs: u64,

    pub log_stream: LogStreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogStreamConfig {
    /// Longest silence tolerated on a log stream before giving up.
    pub block_timeout_secs: u64,
}

impl Default for LogStreamConfig {
    fn default() -> Self {
        Self {
            block_timeout_secs: 5 * 60,
        }
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            server_url: "https://backend.codecrafters.io".to_string(),
            request_timeout_secs: 30,
            log_stream: LogStreamConfig::default(),
        }
    }
}

impl CliConfig {
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.server_url)
            .with_context(|| format!("server_url is not a valid URL: {}", self.server_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!("server_url must use http or https"));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("request_timeout_secs must be > 0"));
        }
        if self.log_stream.block_timeout_secs == 0 {
            return Err(anyhow!("log_stream.block_timeout_secs must be > 0"));
        }
        Ok(())
    }

    /// Replace `server_url` when an override is present and non-empty.
    pub fn with_server_url_override(mut self, server_url: Option<String>) -> Self {
        if let Some(url) = server_url.filter(|url| !url.trim().is_empty()) {
            self.server_url = url.trim().to_string();
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl LogStreamConfig {
    pub fn block_timeout(&self) -> Duration {
        Duration::from_secs(self.block_timeout_secs)
    }
}

/// Load config from a TOML file, then apply [`SERVER_URL_ENV`].
///
/// If the file is missing, the defaults are used.
pub fn load_config(path: &Path) -> Result<CliConfig> {
    let cfg = read_config(path)?.with_server_url_override(std::env::var(SERVER_URL_ENV).ok());
    cfg.validate()?;
    Ok(cfg)
}

fn read_config(path: &Path) -> Result<CliConfig> {
    if !path.exists() {
        return Ok(CliConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &CliConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = read_config(&temp.path().join("missing.toml")).expect("read");
        assert_eq!(cfg, CliConfig::default());
    }

    #[test]
    fn write_then_read_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".codecrafters").join("config.toml");
        let cfg = CliConfig {
            server_url: "http://localhost:4000".to_string(),
            ..CliConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        assert_eq!(read_config(&path).expect("read"), cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[log_stream]\nblock_timeout_secs = 9\n").expect("write");
        let cfg = read_config(&path).expect("read");
        assert_eq!(cfg.log_stream.block_timeout(), Duration::from_secs(9));
        assert_eq!(cfg.server_url, CliConfig::default().server_url);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let bad_url = CliConfig {
            server_url: "ftp://example.com".to_string(),
            ..CliConfig::default()
        };
        assert!(bad_url.validate().is_err());
        let zero_timeout = CliConfig {
            request_timeout_secs: 0,
            ..CliConfig::default()
        };
        assert!(zero_timeout.validate().is_err());
    }

    #[test]
    fn server_url_override_ignores_blank_values() {
        let default_url = CliConfig::default().server_url;
        let cfg = CliConfig::default().with_server_url_override(Some("  ".to_string()));
        assert_eq!(cfg.server_url, default_url);
        let cfg = CliConfig::default().with_server_url_override(Some("http://x.test".to_string()));
        assert_eq!(cfg.server_url, "http://x.test");
    }
}
