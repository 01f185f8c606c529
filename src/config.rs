use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::client::DEFAULT_BASE_URL;
use crate::model::{PlayerIdentity, Region};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read roster file {path}: {source}")]
    RosterRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse roster file {path}: {source}")]
    RosterParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

/// Server settings, read from `LOLBOARD_*` environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub frontend_url: Option<String>,
    pub region: Region,
    pub base_url: String,
    pub roster_path: Option<PathBuf>,
    pub cache_ttl: Duration,
    pub rate_limit_window: Duration,
    pub rate_limit_max_requests: usize,
    pub request_timeout: Duration,
    pub request_delay: Duration,
}

impl AppConfig {
    /// Origins allowed by CORS: the local dashboard in development, the
    /// configured frontend in production.
    pub fn cors_origins(&self) -> Vec<String> {
        match self.env {
            Environment::Development => vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            Environment::Production => self.frontend_url.iter().cloned().collect(),
        }
    }
}

/// Load configuration, reading a `.env` file first if one exists.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    build_app_config(|key| std::env::var(key))
}

/// Build configuration from an env-var lookup function, so tests can feed a map.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default =
        |var: &str, default: &str| -> String { lookup(var).unwrap_or_else(|_| default.to_string()) };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e))
    };

    let env = match or_default("LOLBOARD_ENV", "development").as_str() {
        "production" => Environment::Production,
        _ => Environment::Development,
    };

    let bind_addr = or_default("LOLBOARD_BIND_ADDR", "0.0.0.0:3001")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("LOLBOARD_BIND_ADDR", e))?;

    let region = Region::from_str(&or_default("LOLBOARD_REGION", "na"))
        .map_err(|e| invalid("LOLBOARD_REGION", e))?;

    let rate_limit_max_requests = or_default("LOLBOARD_RATE_LIMIT_MAX_REQUESTS", "10")
        .parse::<usize>()
        .map_err(|e| invalid("LOLBOARD_RATE_LIMIT_MAX_REQUESTS", e))?;

    Ok(AppConfig {
        env,
        bind_addr,
        log_level: or_default("LOLBOARD_LOG_LEVEL", "info"),
        frontend_url: lookup("LOLBOARD_FRONTEND_URL")
            .ok()
            .filter(|url| !url.trim().is_empty()),
        region,
        base_url: or_default("LOLBOARD_BASE_URL", DEFAULT_BASE_URL),
        roster_path: lookup("LOLBOARD_ROSTER_PATH").ok().map(PathBuf::from),
        cache_ttl: Duration::from_secs(parse_u64("LOLBOARD_CACHE_TTL_SECS", "900")?),
        rate_limit_window: Duration::from_secs(parse_u64("LOLBOARD_RATE_LIMIT_WINDOW_SECS", "60")?),
        rate_limit_max_requests,
        request_timeout: Duration::from_secs(parse_u64("LOLBOARD_REQUEST_TIMEOUT_SECS", "15")?),
        request_delay: Duration::from_millis(parse_u64("LOLBOARD_REQUEST_DELAY_MS", "3000")?),
    })
}

fn invalid(var: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: reason.to_string(),
    }
}

/// Load the tracked players from a JSON array of
/// `{"summoner_name": ..., "display_name": ...}` objects, or fall back to
/// [`default_roster`] when no file is configured.
pub fn load_roster(path: Option<&Path>) -> Result<Vec<PlayerIdentity>, ConfigError> {
    let Some(path) = path else {
        return Ok(default_roster());
    };
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::RosterRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::RosterParse {
        path: path.to_path_buf(),
        source,
    })
}

/// The friend group tracked when no roster file is configured.
pub fn default_roster() -> Vec<PlayerIdentity> {
    [
        ("sugarandolive128-NA1", "las begas"),
        ("TheRat-Na11", "Smelliest Clown"),
        ("SchmoneSchwolf-7324", "Death Factory CEO"),
        ("Saladsensei-NA1", "Elite500 of NA"),
        ("Pablo-CEO", "Raptors for Breakfast"),
        ("GROWYRHAIROUT-FUNNY", "Chime Minister"),
        ("Crane-C9LOL", "Mixed Bobby Fischer"),
        ("Salverz-NA1", "Throwing Krugs"),
        ("Willow-flwrs", "Mid lane FREAK"),
    ]
    .into_iter()
    .map(|(summoner, display)| PlayerIdentity::new(summoner).with_display_name(display))
    .collect()
}
