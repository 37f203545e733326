use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use ::config::{Config, Environment, File};
use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_JWT_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub bind_addr: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub resend_api_key: Option<String>,
    pub resend_base_url: String,
    pub mail_from: String,
    pub restaurant_name: String,
    /// Longest a booking or status change waits on its notification email.
    pub notify_timeout_secs: u64,
    pub require_seating_area: bool,
    /// Origin allowed to call the API from a browser; no CORS layer when unset.
    pub cors_origin: Option<String>,
}

/// Plain variables honoured for compatibility, applied after `APP__*`.
const LEGACY_VARS: [(&str, &str); 4] = [
    ("SERVER_BIND", "bind_addr"),
    ("DATABASE_URL", "database_url"),
    ("JWT_SECRET", "jwt_secret"),
    ("RESEND_API_KEY", "resend_api_key"),
];

pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from(
        "server",
        Environment::with_prefix("APP").separator("__"),
        |name| std::env::var(name).ok(),
    )
}

/// Defaults, then `<file_stem>.toml` if present, then `env`, then legacy
/// variables looked up through `legacy`.
pub(crate) fn load_settings_from(
    file_stem: &str,
    env: Environment,
    legacy: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut builder = Config::builder()
        .set_default("bind_addr", "127.0.0.1:8000")?
        .set_default("database_url", "sqlite://./data/reservations.db")?
        .set_default("jwt_secret", DEFAULT_JWT_SECRET)?
        .set_default("token_ttl_minutes", 30_i64)?
        .set_default("resend_base_url", notifier::RESEND_API_URL)?
        .set_default("mail_from", "Bokaap Deli <onboarding@resend.dev>")?
        .set_default("restaurant_name", "Bokaap Deli")?
        .set_default("notify_timeout_secs", 10_u64)?
        .set_default("require_seating_area", false)?
        .add_source(File::with_name(file_stem).required(false))
        .add_source(env);

    for (var, key) in LEGACY_VARS {
        builder = builder.set_override_option(key, legacy(var).filter(|v| !v.trim().is_empty()))?;
    }

    let settings: Settings = builder
        .build()
        .context("failed to read server configuration")?
        .try_deserialize()
        .context("invalid server configuration")?;

    if settings.token_ttl_minutes <= 0 {
        anyhow::bail!(
            "token_ttl_minutes must be positive, got {}",
            settings.token_ttl_minutes
        );
    }
    if settings.notify_timeout_secs == 0 {
        anyhow::bail!("notify_timeout_secs must be at least 1");
    }
    Ok(settings)
}

impl Settings {
    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return "sqlite://./data/reservations.db".to_string();
    }

    if raw_database_url.starts_with("sqlite::memory:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        return format!("sqlite://{}", path.replace('\\', "/"));
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(parent) = sqlite_path(database_url)
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
    else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(&parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    (!path.is_empty()).then(|| PathBuf::from(path))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
