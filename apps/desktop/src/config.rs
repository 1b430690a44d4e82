use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use client_core::SeedDataset;
use serde::Deserialize;
use shared::domain::CurrencyCategory;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_url: String,
    pub log_filter: String,
    pub seed_path: Option<PathBuf>,
    pub default_category: CurrencyCategory,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/currency.db".into(),
            log_filter: "info".into(),
            seed_path: None,
            default_category: CurrencyCategory::All,
        }
    }
}

/// Defaults, then `config_path` if it exists, then environment variables.
pub fn load_settings(config_path: &Path) -> anyhow::Result<Settings> {
    load_settings_with(config_path, |key| std::env::var(key).ok())
}

pub fn load_settings_with(
    config_path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let settings = match fs::read_to_string(config_path) {
        Ok(raw) => toml::from_str::<Settings>(&raw)
            .with_context(|| format!("invalid settings file '{}'", config_path.display()))?,
        Err(err) if err.kind() == ErrorKind::NotFound => Settings::default(),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read settings file '{}'", config_path.display()))
        }
    };

    apply_env_overrides(settings, lookup)
}

pub fn apply_env_overrides(
    mut settings: Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    if let Some(v) = lookup("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = lookup("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = lookup("APP__LOG_FILTER") {
        settings.log_filter = v;
    }

    if let Some(v) = lookup("APP__SEED_PATH") {
        settings.seed_path = (!v.trim().is_empty()).then(|| PathBuf::from(v));
    }

    if let Some(v) = lookup("APP__DEFAULT_CATEGORY") {
        settings.default_category = v
            .parse()
            .context("invalid APP__DEFAULT_CATEGORY")?;
    }

    Ok(settings)
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        return format!("sqlite://{}", path.replace('\\', "/"));
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

/// Reads a replacement seed dataset from `[[crypto]]` and `[[fiat]]` TOML tables.
pub fn load_seed_dataset(path: &Path) -> anyhow::Result<SeedDataset> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read seed file '{}'", path.display()))?;
    let seed: SeedDataset = toml::from_str(&raw)
        .with_context(|| format!("invalid seed file '{}'", path.display()))?;

    if let Some(entry) = seed.crypto.iter().find(|c| c.is_fiat()) {
        bail!("crypto seed entry '{}' must not carry a fiat code", entry.id);
    }
    if let Some(entry) = seed.fiat.iter().find(|c| !c.is_fiat()) {
        bail!("fiat seed entry '{}' is missing its code", entry.id);
    }
    if let Some(entry) = seed.all().iter().find(|c| c.id.trim().is_empty()) {
        bail!("seed entry '{}' has an empty id", entry.name);
    }

    Ok(seed)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
