use anyhow::{Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::{product_by_id, Product};

pub const DEFAULT_KEY_PREFIX: &str = "roadmap-epics";
pub const DEFAULT_MODEL: &str = "google/gemini-3-flash-preview";

/// Settings for the chat-completions endpoint used for story generation and chat
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AiSettings {
    /// OpenAI-compatible `/chat/completions` URL; AI features are off without it
    pub endpoint: Option<String>,
    pub model: String,
    pub api_key: Option<String>,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
        }
    }
}

/// User configuration, stored as YAML
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Directory holding the per-product epic files
    pub data_dir: PathBuf,
    /// Prefix of every storage key
    pub key_prefix: String,
    /// Product selected when none is given on the command line
    pub default_product: Option<String>,
    /// Timeline year when none is given; the current year otherwise
    pub default_year: Option<i32>,
    pub ai: AiSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            default_product: None,
            default_year: None,
            ai: AiSettings::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("roadmap")
}

impl Config {
    /// Loads the config at `path`; a missing file yields the defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Loads the user's config and applies `ROADMAP_*` environment overrides
    pub fn load_default() -> Result<Self> {
        let mut config = Self::load(config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies overrides looked up by environment variable name
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = get("ROADMAP_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(endpoint) = get("ROADMAP_AI_ENDPOINT") {
            self.ai.endpoint = Some(endpoint);
        }
        if let Some(model) = get("ROADMAP_AI_MODEL") {
            self.ai.model = model;
        }
        if let Some(key) = get("ROADMAP_AI_KEY") {
            self.ai.api_key = Some(key);
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(&self)?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Sets the default product; the id must be in the catalog
    pub fn set_default_product(&mut self, id: &str) -> Result<()> {
        if product_by_id(id).is_none() {
            anyhow::bail!("Product '{}' not found in catalog", id);
        }
        self.default_product = Some(id.to_string());
        Ok(())
    }

    pub fn clear_default_product(&mut self) {
        self.default_product = None;
    }

    /// The default product, if it is set and still in the catalog
    pub fn default_product(&self) -> Option<&'static Product> {
        self.default_product.as_deref().and_then(product_by_id)
    }

    /// Year to lay the timeline out for: explicit, configured, or the current year
    pub fn resolve_year(&self, explicit: Option<i32>) -> i32 {
        self.resolve_year_on(explicit, Local::now().date_naive())
    }

    pub fn resolve_year_on(&self, explicit: Option<i32>, today: NaiveDate) -> i32 {
        explicit.or(self.default_year).unwrap_or_else(|| today.year())
    }
}

/// Gets the path to the config file
pub fn config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("ROADMAP_CONFIG") {
        return Ok(PathBuf::from(path));
    }

    // Default to ~/.roadmap.config
    let home_dir = dirs::home_dir().context("Failed to determine home directory")?;

    Ok(home_dir.join(".roadmap.config"))
}
