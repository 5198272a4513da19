use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATA_FILE: &str = "data/opera.xlsx";
pub const DEFAULT_THRESHOLD: f64 = 0.20;
pub const DEFAULT_DASHBOARD_URL: &str = "https://dashboard-stream-tbbi.onrender.com/";
pub const DEFAULT_ALLOW_LIST: &str = "data/email.txt";
pub const DEFAULT_AGI_ALLOW_LIST: &str = "data/email_agi.txt";
pub const DEFAULT_BIND: &str = "0.0.0.0:8501";
pub const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;

/// Env files tried in order; later files never override earlier ones.
const ENV_FILES: &[&str] = &["config.env", ".env"];

/// Everything the checker and the dashboard read from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub data_file:            PathBuf,
    /// Ratios at or below this fraction are breaches.
    pub threshold:            f64,
    pub webhook_url:          Option<String>,
    pub webhook_timeout_secs: u64,
    pub dashboard_url:        String,
    pub allow_list:           PathBuf,
    pub agi_allow_list:       PathBuf,
    /// Addresses granted the unfiltered operator view.
    pub supervisors:          Vec<String>,
    pub bind:                 String,
    /// Idle dashboard sessions older than this are discarded.
    pub session_ttl_secs:     u64,
}

impl MonitorConfig {
    /// Load `config.env` / `.env` if present, then read the process environment.
    pub fn load() -> anyhow::Result<Self> {
        for file in ENV_FILES {
            if Path::new(file).exists() {
                dotenv::from_filename(file)
                    .map_err(|e| anyhow::anyhow!("Cannot read {file}: {e}"))?;
                log::debug!("environment loaded from {file}");
            }
        }
        Self::from_env()
    }

    /// Read configuration from the process environment only.
    pub fn from_env() -> anyhow::Result<Self> {
        let threshold = match env::var("OPSMON_THRESHOLD") {
            Ok(raw) => parse_threshold(&raw)?,
            Err(_)  => DEFAULT_THRESHOLD,
        };

        let webhook_timeout_secs = match env::var("OPSMON_WEBHOOK_TIMEOUT_SECS") {
            Ok(raw) => parse_secs("OPSMON_WEBHOOK_TIMEOUT_SECS", &raw)?,
            Err(_)  => DEFAULT_WEBHOOK_TIMEOUT_SECS,
        };

        let session_ttl_secs = match env::var("OPSMON_SESSION_TTL_SECS") {
            Ok(raw) => parse_secs("OPSMON_SESSION_TTL_SECS", &raw)?,
            Err(_)  => DEFAULT_SESSION_TTL_SECS,
        };

        let webhook_url = env::var("TEAMS_WEBHOOK_URL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let supervisors = env::var("OPSMON_SUPERVISORS")
            .map(|raw| parse_list(&raw))
            .unwrap_or_default();

        Ok(Self {
            data_file: path_var("OPSMON_DATA_FILE", DEFAULT_DATA_FILE),
            threshold,
            webhook_url,
            webhook_timeout_secs,
            dashboard_url: env::var("OPSMON_DASHBOARD_URL")
                .unwrap_or_else(|_| DEFAULT_DASHBOARD_URL.to_string()),
            allow_list: path_var("OPSMON_ALLOW_LIST", DEFAULT_ALLOW_LIST),
            agi_allow_list: path_var("OPSMON_AGI_ALLOW_LIST", DEFAULT_AGI_ALLOW_LIST),
            supervisors,
            bind: env::var("OPSMON_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string()),
            session_ttl_secs,
        })
    }

    /// Deterministic defaults for tests: no webhook, no supervisors.
    pub fn default_test() -> Self {
        Self {
            data_file:            PathBuf::from(DEFAULT_DATA_FILE),
            threshold:            DEFAULT_THRESHOLD,
            webhook_url:          None,
            webhook_timeout_secs: DEFAULT_WEBHOOK_TIMEOUT_SECS,
            dashboard_url:        DEFAULT_DASHBOARD_URL.to_string(),
            allow_list:           PathBuf::from(DEFAULT_ALLOW_LIST),
            agi_allow_list:       PathBuf::from(DEFAULT_AGI_ALLOW_LIST),
            supervisors:          Vec::new(),
            bind:                 DEFAULT_BIND.to_string(),
            session_ttl_secs:     DEFAULT_SESSION_TTL_SECS,
        }
    }
}

fn path_var(name: &str, default: &str) -> PathBuf {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

/// A threshold is a fraction in [0, 1].
pub fn parse_threshold(raw: &str) -> anyhow::Result<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid OPSMON_THRESHOLD '{raw}': {e}"))?;
    if !(0.0..=1.0).contains(&value) {
        anyhow::bail!("OPSMON_THRESHOLD must lie in [0, 1], got {value}");
    }
    Ok(value)
}

/// A whole number of seconds, named after the variable it came from.
pub fn parse_secs(name: &str, raw: &str) -> anyhow::Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| anyhow::anyhow!("Invalid {name} '{raw}': {e}"))
}

/// Split a comma-separated list, dropping blanks.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
