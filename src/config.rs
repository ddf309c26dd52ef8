use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::oauth::Credentials;

/// Default location of the config file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "default.yml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token: String,
    pub token_secret: String,
    pub host: String,
    /// Directory under which album directories are created
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    /// Photos requested per listing page; also the download concurrency
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Upper bound on listing pages per album
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_out_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_page_size() -> u32 {
    1000
}

fn default_max_pages() -> u32 {
    10_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            consumer_key: "<consumer key>".to_string(),
            consumer_secret: "<consumer secret>".to_string(),
            token: "<token>".to_string(),
            token_secret: "<token secret>".to_string(),
            host: "https://example.trovebox.com".to_string(),
            out_dir: default_out_dir(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
        }
    }
}

impl Config {
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Reads and validates a config file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!(
                "Config file not found at {}. Run 'trovebox-archiver init' to create one.",
                path.display()
            );
        }

        let yaml = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&yaml)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config in {}", path.display()))?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("consumerKey", &self.consumer_key),
            ("consumerSecret", &self.consumer_secret),
            ("token", &self.token),
            ("tokenSecret", &self.token_secret),
            ("host", &self.host),
        ];

        for (key, value) in required {
            if value.trim().is_empty() {
                bail!("Missing required config value '{key}'");
            }
        }

        if self.page_size == 0 {
            bail!("'pageSize' must be greater than zero");
        }

        if self.max_pages == 0 {
            bail!("'maxPages' must be greater than zero");
        }

        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            consumer_key: self.consumer_key.clone(),
            consumer_secret: self.consumer_secret.clone(),
            token: self.token.clone(),
            token_secret: self.token_secret.clone(),
        }
    }

    pub fn get_config_path(config_arg: &Option<PathBuf>) -> PathBuf {
        config_arg
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }
}
