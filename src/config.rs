use std::{
    env,
    path::{Path, PathBuf},
};

use serde::Deserialize;

pub const DEFAULT_ADMIN_USER: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
pub const DEFAULT_OPTIONS_FILE: &str = "/data/options.json";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
    /// IANA timezone name used to decide which sales belong to "today".
    pub timezone: String,
    pub admin: AdminCredentials,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|n| n.parse::<u32>().ok())
            .unwrap_or(10);
        let timezone = env::var("APP_TIMEZONE")
            .ok()
            .filter(|tz| !tz.trim().is_empty())
            .unwrap_or_else(|| "UTC".to_string());
        let options_file = env::var("APP_OPTIONS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_OPTIONS_FILE));
        let admin = AdminCredentials::resolve(|key| env::var(key).ok(), &options_file);
        Ok(Self {
            port,
            database_url,
            host,
            max_connections,
            timezone,
            admin,
        })
    }
}

/// Credentials of the distinguished admin account, reconciled on every start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
struct OptionsFile {
    admin_user: Option<String>,
    admin_password: Option<String>,
}

impl AdminCredentials {
    /// Each field is looked up in the environment first, then in the options
    /// file, then falls back to the built-in default. An unreadable or
    /// malformed options file counts as absent.
    pub fn resolve<F>(lookup_env: F, options_file: &Path) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let options = read_options(options_file);
        let username = lookup_env("ADMIN_USER")
            .filter(|v| !v.is_empty())
            .or(options.admin_user)
            .unwrap_or_else(|| DEFAULT_ADMIN_USER.to_string());
        let password = lookup_env("ADMIN_PASSWORD")
            .filter(|v| !v.is_empty())
            .or(options.admin_password)
            .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string());
        Self { username, password }
    }
}

fn read_options(path: &Path) -> OptionsFile {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return OptionsFile::default(),
    };
    if raw.trim().is_empty() {
        return OptionsFile::default();
    }
    match serde_json::from_str(&raw) {
        Ok(options) => options,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "ignoring malformed options file");
            OptionsFile::default()
        }
    }
}
