// Runtime configuration read from the environment (and .env, loaded in main).

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Where counting data is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Json,
    Memory,
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub discord_token: String,
    pub data_dir: PathBuf,
    pub store: StoreKind,
    pub persist_timeout: Duration,
    pub retry_interval: Duration,
    /// Register commands in this guild only (instant updates while developing).
    pub dev_guild_id: Option<u64>,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup, so tests don't have to touch the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let discord_token = lookup("DISCORD_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .context(
                "Missing DISCORD_TOKEN environment variable! \
                 Create a .env file with your bot token.",
            )?;

        let data_dir = lookup("COUNTING_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"));

        let store = match lookup("COUNTING_STORE").as_deref() {
            None | Some("json") => StoreKind::Json,
            Some("memory") => StoreKind::Memory,
            Some(other) => bail!("COUNTING_STORE must be `json` or `memory`, got `{other}`"),
        };

        let persist_timeout_ms = parse_number(&lookup, "COUNTING_PERSIST_TIMEOUT_MS", 2_000)?;
        if persist_timeout_ms == 0 {
            bail!("COUNTING_PERSIST_TIMEOUT_MS must be greater than 0");
        }
        let persist_timeout = Duration::from_millis(persist_timeout_ms);
        let retry_secs = parse_number(&lookup, "COUNTING_RETRY_INTERVAL_SECS", 30)?;
        let retry_interval = Duration::from_secs(retry_secs.max(1));

        let dev_guild_id = lookup("COUNTING_DEV_GUILD_ID")
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .with_context(|| format!("COUNTING_DEV_GUILD_ID is not a valid ID: {raw}"))
            })
            .transpose()?;

        Ok(Self {
            discord_token,
            data_dir,
            store,
            persist_timeout,
            retry_interval,
            dev_guild_id,
        })
    }

    pub fn counting_file(&self) -> PathBuf {
        self.data_dir.join("counting.json")
    }
}

fn parse_number(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<u64> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{key} must be a whole number, got `{raw}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<BotConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_token_is_set() {
        let config = config_from(&[("DISCORD_TOKEN", "abc")]).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.store, StoreKind::Json);
        assert_eq!(config.persist_timeout, Duration::from_secs(2));
        assert_eq!(config.retry_interval, Duration::from_secs(30));
        assert_eq!(config.dev_guild_id, None);
        assert_eq!(config.counting_file(), PathBuf::from("data/counting.json"));
    }

    #[test]
    fn missing_token_is_an_error() {
        assert!(config_from(&[]).is_err());
        assert!(config_from(&[("DISCORD_TOKEN", "  ")]).is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("COUNTING_DATA_DIR", "/var/lib/counting"),
            ("COUNTING_STORE", "memory"),
            ("COUNTING_PERSIST_TIMEOUT_MS", "500"),
            ("COUNTING_RETRY_INTERVAL_SECS", "5"),
            ("COUNTING_DEV_GUILD_ID", "1432001978447167611"),
        ])
        .unwrap();

        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.persist_timeout, Duration::from_millis(500));
        assert_eq!(config.retry_interval, Duration::from_secs(5));
        assert_eq!(config.dev_guild_id, Some(1432001978447167611));
    }

    #[test]
    fn bad_numbers_are_errors() {
        let with_token = |key: &str, value: &str| {
            config_from(&[("DISCORD_TOKEN", "abc"), (key, value)])
        };
        assert!(with_token("COUNTING_PERSIST_TIMEOUT_MS", "soon").is_err());
        assert!(with_token("COUNTING_DEV_GUILD_ID", "x").is_err());
        assert!(with_token("COUNTING_STORE", "sqlite").is_err());
    }

    #[test]
    fn zero_persist_timeout_is_rejected() {
        let err = config_from(&[("DISCORD_TOKEN", "abc"), ("COUNTING_PERSIST_TIMEOUT_MS", "0")])
            .unwrap_err();
        assert!(err.to_string().contains("COUNTING_PERSIST_TIMEOUT_MS"));

        let config =
            config_from(&[("DISCORD_TOKEN", "abc"), ("COUNTING_RETRY_INTERVAL_SECS", "0")])
                .unwrap();
        assert_eq!(config.retry_interval, Duration::from_secs(1));
    }
}
