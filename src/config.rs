// Runtime configuration read from the environment (and `.env`, via dotenv).

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DATABASE_PATH: &str = "data/shieldbot.db";
pub const DEFAULT_NOTIFY_ATTEMPTS: u32 = 5;
pub const DEFAULT_NOTIFY_BACKOFF_SECS: u64 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing {0} environment variable! Create a .env file with your bot token.")]
    Missing(&'static str),

    #[error("{key} must be {expected}, got `{value}`")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotConfig {
    pub token: String,
    pub database_path: PathBuf,
    /// Channel that receives fault escalations, DM relays and `refresh`.
    pub operator_channel_id: Option<u64>,
    pub notify_attempts: u32,
    pub notify_backoff: Duration,
    /// Register commands in this guild only (instant updates while developing).
    pub dev_guild_id: Option<u64>,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup; tests pass a map instead of
    /// touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let token = get("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        let database_path = get("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH));

        let operator_channel_id = parse_opt(get("OPERATOR_CHANNEL_ID"), "OPERATOR_CHANNEL_ID")?;
        let dev_guild_id = parse_opt(get("DEV_GUILD_ID"), "DEV_GUILD_ID")?;

        let notify_attempts = parse_opt::<u32>(get("NOTIFY_ATTEMPTS"), "NOTIFY_ATTEMPTS")?
            .unwrap_or(DEFAULT_NOTIFY_ATTEMPTS);
        if notify_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "NOTIFY_ATTEMPTS",
                expected: "at least 1",
                value: "0".to_string(),
            });
        }

        let notify_backoff = parse_opt::<u64>(get("NOTIFY_BACKOFF_SECS"), "NOTIFY_BACKOFF_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_NOTIFY_BACKOFF_SECS));

        Ok(Self {
            token,
            database_path,
            operator_channel_id,
            notify_attempts,
            notify_backoff,
            dev_guild_id,
        })
    }
}

fn parse_opt<T: std::str::FromStr>(
    value: Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    value
        .map(|v| {
            v.parse::<T>().map_err(|_| ConfigError::Invalid {
                key,
                expected: "a non-negative integer",
                value: v,
            })
        })
        .transpose()
}
