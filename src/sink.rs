use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// A configured output directory. Callers initialize the sink once and get
/// a handle; save calls never create directories on their own.
#[derive(Debug, Clone)]
pub struct ResultSink {
    dir: PathBuf,
}

impl ResultSink {
    pub fn init(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create result directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a timestamped JSON artifact named
    /// `<prefix>_<token>_<YYYYMMDD_HHMMSS>.json`. Non-ASCII text is written
    /// as-is, matching how the records were collected.
    pub fn save_json<T: Serialize>(&self, prefix: &str, token: &str, value: &T) -> Result<PathBuf> {
        let path = self.artifact_path(prefix, token, "json");
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Write a timestamped CSV table with the given header row.
    pub fn save_table(
        &self,
        prefix: &str,
        token: &str,
        headers: &[&str],
        rows: &[Vec<String>],
    ) -> Result<PathBuf> {
        let path = self.artifact_path(prefix, token, "csv");
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        writer.write_record(headers)?;
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(path)
    }

    fn artifact_path(&self, prefix: &str, token: &str, ext: &str) -> PathBuf {
        let token = sanitize_token(token);
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let name = if token.is_empty() {
            format!("{prefix}_{stamp}.{ext}")
        } else {
            format!("{prefix}_{token}_{stamp}.{ext}")
        };
        self.dir.join(name)
    }
}

/// Keep only filename-safe characters of a query/user token: alphanumerics,
/// space, dash, underscore.
pub fn sanitize_token(token: &str) -> String {
    token
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .trim_end()
        .to_string()
}
