//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use grobline_core::RetryPolicy;
use grobline_papers::Batch;

/// File-level configuration for grobline
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub grobid: GrobidConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    #[serde(deserialize_with = "deserialize_path")]
    pub manifest: PathBuf,
    #[serde(deserialize_with = "deserialize_path")]
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let defaults = grobline_papers::Config::default();
        Self {
            manifest: defaults.manifest,
            output_dir: defaults.output_dir,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GrobidConfig {
    #[serde(deserialize_with = "deserialize_string")]
    pub url: String,
    /// Pause after each extraction, in seconds
    pub sleep_secs: f64,
    /// Attempts per PDF, including the first
    pub retries: u32,
    /// Linear backoff step, in seconds
    pub backoff_secs: f64,
}

impl Default for GrobidConfig {
    fn default() -> Self {
        let defaults = grobline_papers::Config::default();
        Self {
            url: defaults.grobid_url,
            sleep_secs: defaults.sleep.as_secs_f64(),
            retries: defaults.retry.attempts,
            backoff_secs: defaults.retry.backoff_base.as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(default)]
pub struct BatchConfig {
    pub start: usize,
    pub size: Option<usize>,
}

fn deserialize_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    expand_env_vars(&raw).map_err(serde::de::Error::custom)
}

fn deserialize_path<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
where
    D: serde::Deserializer<'de>,
{
    deserialize_string(deserializer).map(PathBuf::from)
}

/// Replace every `${VAR}` in `s` with the variable's value.
fn expand_env_vars(s: &str) -> Result<String, String> {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(format!("unterminated variable reference in {s:?}"));
        };
        let name = &after[..end];
        let value =
            std::env::var(name).map_err(|_| format!("environment variable {name} is not set"))?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Seconds from a config value, rejecting negatives and NaN
pub fn secs(value: f64, what: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("Invalid {what}: {value}"))
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./grobline.toml (current directory)
    /// 2. ~/.config/grobline/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("grobline.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "grobline") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Pipeline configuration from file values alone
    pub fn pipeline(&self) -> Result<grobline_papers::Config> {
        Ok(grobline_papers::Config {
            manifest: self.paths.manifest.clone(),
            output_dir: self.paths.output_dir.clone(),
            grobid_url: self.grobid.url.clone(),
            sleep: secs(self.grobid.sleep_secs, "grobid.sleep_secs")?,
            batch: Batch {
                start: self.batch.start,
                size: self.batch.size,
            },
            retry: RetryPolicy {
                attempts: self.grobid.retries,
                backoff_base: secs(self.grobid.backoff_secs, "grobid.backoff_secs")?,
            },
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(
            config.paths.manifest,
            PathBuf::from("2025_iclr_pdfs_urls.csv")
        );
        assert_eq!(config.paths.output_dir, PathBuf::from("ICLR2025_papers"));
        assert_eq!(config.grobid.url, "http://localhost:8070");
        assert_eq!(config.grobid.sleep_secs, 0.2);
        assert_eq!(config.grobid.retries, 3);
        assert_eq!(config.batch.size, None);
    }

    #[test]
    fn expand_embedded_var() {
        std::env::set_var("GROBLINE_TEST_ROOT", "/data");
        assert_eq!(
            expand_env_vars("${GROBLINE_TEST_ROOT}/iclr.csv").unwrap(),
            "/data/iclr.csv"
        );
        std::env::remove_var("GROBLINE_TEST_ROOT");
    }

    #[test]
    fn expand_literal() {
        assert_eq!(expand_env_vars("literal").unwrap(), "literal");
    }

    #[test]
    fn expand_missing_var_fails() {
        assert!(expand_env_vars("${GROBLINE_NONEXISTENT_12345}").is_err());
        assert!(expand_env_vars("${OPEN").is_err());
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[paths]
manifest = "/tmp/iclr.csv"

[grobid]
url = "http://grobid:8070"
sleep_secs = 1.5
retries = 5

[batch]
start = 100
size = 50
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.paths.manifest, PathBuf::from("/tmp/iclr.csv"));
        assert_eq!(config.paths.output_dir, PathBuf::from("ICLR2025_papers"));
        assert_eq!(config.grobid.url, "http://grobid:8070");
        assert_eq!(config.grobid.backoff_secs, 5.0);

        let pipeline = config.pipeline().unwrap();
        assert_eq!(pipeline.sleep, Duration::from_millis(1500));
        assert_eq!(pipeline.retry.attempts, 5);
        assert_eq!(
            pipeline.batch,
            Batch {
                start: 100,
                size: Some(50)
            }
        );
    }

    #[test]
    fn negative_sleep_rejected() {
        let config: Config = toml::from_str("[grobid]\nsleep_secs = -1.0\n").unwrap();
        let err = config.pipeline().unwrap_err();
        assert!(err.to_string().contains("grobid.sleep_secs"));
    }

    #[test]
    fn from_file_reports_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("grobline.toml");
        std::fs::write(&path, "[grobid\n").unwrap();
        let err = Config::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
