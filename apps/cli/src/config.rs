use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use client_core::view::{DEFAULT_FORM_FIELDS, DEFAULT_TOP_K};
use serde::Deserialize;
use tracing::warn;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "docqa.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server_url: String,
    pub request_timeout_secs: Option<u64>,
    pub default_top_k: i64,
    pub default_form_fields: String,
    pub export_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".into(),
            request_timeout_secs: Some(120),
            default_top_k: DEFAULT_TOP_K.0,
            default_form_fields: DEFAULT_FORM_FIELDS.into(),
            export_dir: PathBuf::from("."),
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Defaults, then the TOML file, then environment overrides.
///
/// An explicit `config_path` must exist; the default `docqa.toml` is optional.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = match config_path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file '{}'", path.display()))?;
            parse_settings(&raw)
                .with_context(|| format!("invalid config file '{}'", path.display()))?
        }
        None => match fs::read_to_string(DEFAULT_CONFIG_FILE) {
            Ok(raw) => parse_settings(&raw)
                .with_context(|| format!("invalid config file '{DEFAULT_CONFIG_FILE}'"))?,
            Err(_) => Settings::default(),
        },
    };

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

pub fn parse_settings(raw: &str) -> Result<Settings, toml::de::Error> {
    toml::from_str(raw)
}

pub fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("DOCQA_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        match v.parse::<u64>() {
            Ok(0) => settings.request_timeout_secs = None,
            Ok(secs) => settings.request_timeout_secs = Some(secs),
            Err(_) => warn!(value = %v, "config: ignoring invalid APP__REQUEST_TIMEOUT_SECS"),
        }
    }

    if let Some(v) = lookup("APP__DEFAULT_TOP_K") {
        match v.parse::<i64>() {
            Ok(top_k) => settings.default_top_k = top_k,
            Err(_) => warn!(value = %v, "config: ignoring invalid APP__DEFAULT_TOP_K"),
        }
    }

    if let Some(v) = lookup("APP__FORM_FIELDS") {
        settings.default_form_fields = v;
    }

    if let Some(v) = lookup("APP__EXPORT_DIR") {
        settings.export_dir = PathBuf::from(v);
    }
}

pub fn parse_server_url(raw: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw.trim()).with_context(|| format!("invalid server url '{raw}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("server url '{raw}' must use http or https");
    }
    Ok(url)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
