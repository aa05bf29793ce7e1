use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Runtime configuration, loaded from a TOML file. Every field has a
/// default so a missing file or a sparse one still yields a usable config;
/// credentials, handles, and spreadsheet ids are never baked into source.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub auth: AuthConfig,
    pub output: OutputConfig,
    pub pacing: PacingConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Browser cookie-export JSON (array form), input of `birdwatch cookies`.
    pub cookie_export: PathBuf,
    /// Converted flat cookie bundle consumed by the session bootstrap.
    pub cookie_file: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_export: PathBuf::from("twitter_json/cookie.json"),
            cookie_file: PathBuf::from("twitter_json/cookie_edit.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub search_dir: PathBuf,
    pub profile_dir: PathBuf,
    pub reply_dir: PathBuf,
    pub follower_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            search_dir: PathBuf::from("search_results"),
            profile_dir: PathBuf::from("profile_results"),
            reply_dir: PathBuf::from("reply_analysis_results"),
            follower_dir: PathBuf::from("follower_results"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Delay between consecutive page fetches of one paged query.
    pub page_delay_secs: u64,
    /// Delay between per-follower timeline fetches.
    pub follower_delay_secs: u64,
    /// Delay between posts in the semi-automatic pipeline.
    pub post_interval_secs: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            page_delay_secs: 2,
            follower_delay_secs: 15,
            post_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Chat-completions style endpoint used to draft posts.
    pub composer_endpoint: String,
    pub composer_model: String,
    /// Environment variable holding the composer API key.
    pub composer_key_env: String,
    /// Spreadsheet append endpoint (values:append style).
    pub sheet_endpoint: String,
    pub sheet_id: String,
    /// Environment variable holding the spreadsheet bearer token.
    pub sheet_key_env: String,
    /// How many of the highest-engagement tweets to draft posts for.
    pub top_n: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            composer_endpoint: "https://api.openai.com/v1/chat/completions".into(),
            composer_model: "gpt-3.5-turbo".into(),
            composer_key_env: "BIRDWATCH_COMPOSER_KEY".into(),
            sheet_endpoint: "https://sheets.googleapis.com/v4/spreadsheets".into(),
            sheet_id: String::new(),
            sheet_key_env: "BIRDWATCH_SHEET_TOKEN".into(),
            top_n: 3,
        }
    }
}

impl Config {
    /// Default location: `<user config dir>/birdwatch/birdwatch.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("birdwatch").join("birdwatch.toml"))
    }

    /// Load from an explicit path (must exist) or fall back to the default
    /// location, which may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => match Self::default_path() {
                Some(p) if p.exists() => Self::from_file(&p),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))
    }
}
