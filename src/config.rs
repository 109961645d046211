//! Process configuration from the environment (`.env` honoured via dotenvy).

use chrono::NaiveTime;
use std::path::PathBuf;

use crate::kernel::event::ChatId;

pub const DEFAULT_DB_PATH: &str = "./data/visa_data.sqlite";
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";
pub const DEFAULT_SUMMARY_TIME: &str = "13:00";
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub broadcast_chat_id: ChatId,
    pub db_path: PathBuf,
    /// Daily summaries fire at this UTC time of day.
    pub summary_time: NaiveTime,
    pub api_base: String,
    pub poll_timeout_secs: u64,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick
    /// up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` over an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = required(&lookup, "TELEGRAM_BOT_TOKEN")?;
        let broadcast_raw = required(&lookup, "BROADCAST_CHAT_ID")?;
        let broadcast_chat_id = broadcast_raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key: "BROADCAST_CHAT_ID",
            value: broadcast_raw.clone(),
        })?;

        let summary_raw = lookup("SUMMARY_TIME_UTC").unwrap_or_else(|| DEFAULT_SUMMARY_TIME.to_string());
        let summary_time = parse_time_of_day(&summary_raw).ok_or(ConfigError::Invalid {
            key: "SUMMARY_TIME_UTC",
            value: summary_raw.clone(),
        })?;

        let poll_timeout_secs = match lookup("POLL_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "POLL_TIMEOUT_SECS",
                value: raw.clone(),
            })?,
            None => DEFAULT_POLL_TIMEOUT_SECS,
        };

        Ok(Self {
            bot_token,
            broadcast_chat_id,
            db_path: db_path_from(&lookup),
            summary_time,
            api_base: lookup("TELEGRAM_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            poll_timeout_secs,
        })
    }
}

/// Storage location alone; the console driver needs nothing else.
pub fn db_path_from_env() -> PathBuf {
    db_path_from(&|key: &str| std::env::var(key).ok())
}

fn db_path_from<F>(lookup: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    lookup("VISA_DB_PATH")
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH))
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

/// `HH:MM` or `HH:MM:SS`.
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}
