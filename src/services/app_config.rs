use crate::modules::tickets::descriptor::TicketKind;
use crate::services::platform::{ChannelId, UserId};
use anyhow::{Context as _, bail};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::time::Duration;

/// Process configuration, read once at startup from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub discord_token: String,
    pub database_url: String,
    pub owner_ids: HashSet<UserId>,
    pub rewards: RewardConfig,
    pub tickets: TicketConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardConfig {
    /// Credited invites needed before a claim is accepted.
    pub threshold: i64,
    /// Payout units per credited invite.
    pub rate: i64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            rate: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TicketConfig {
    pub categories: HashMap<TicketKind, ChannelId>,
    pub close_grace: Duration,
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            categories: HashMap::new(),
            close_grace: Duration::from_secs(5),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| -> anyhow::Result<String> {
            match lookup(key) {
                Some(v) if !v.trim().is_empty() => Ok(v),
                _ => bail!("{} must be set", key),
            }
        };

        let owner_ids = match lookup("OWNER_IDS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<UserId>().with_context(|| format!("OWNER_IDS: bad user id `{}`", s)))
                .collect::<anyhow::Result<HashSet<_>>>()?,
            None => HashSet::new(),
        };

        let defaults = RewardConfig::default();
        let rewards = RewardConfig {
            threshold: parse_or(&lookup, "REWARD_THRESHOLD", defaults.threshold)?,
            rate: parse_or(&lookup, "REWARD_RATE", defaults.rate)?,
        };
        if rewards.threshold < 0 || rewards.rate < 0 {
            bail!("REWARD_THRESHOLD and REWARD_RATE must not be negative");
        }

        let mut categories = HashMap::new();
        for kind in TicketKind::ALL {
            let key = format!("TICKET_CATEGORY_{}", kind.id().to_uppercase());
            if let Some(raw) = lookup(&key) {
                let id = raw
                    .trim()
                    .parse::<ChannelId>()
                    .with_context(|| format!("{}: bad channel id `{}`", key, raw))?;
                categories.insert(kind, id);
            }
        }

        let grace_secs: u64 = parse_or(&lookup, "TICKET_CLOSE_GRACE_SECS", 5)?;

        Ok(Self {
            discord_token: required("DISCORD_TOKEN")?,
            database_url: required("DATABASE_URL")?,
            owner_ids,
            rewards,
            tickets: TicketConfig {
                categories,
                close_grace: Duration::from_secs(grace_secs),
            },
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value `{}`", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = AppConfig::from_lookup(env(&[
            ("DISCORD_TOKEN", "t"),
            ("DATABASE_URL", "sqlite::memory:"),
        ]))
        .unwrap();

        assert_eq!(config.rewards, RewardConfig { threshold: 5, rate: 3 });
        assert_eq!(config.tickets.close_grace, Duration::from_secs(5));
        assert!(config.owner_ids.is_empty());
    }

    #[test]
    fn reads_overrides() {
        let config = AppConfig::from_lookup(env(&[
            ("DISCORD_TOKEN", "t"),
            ("DATABASE_URL", "postgres://x"),
            ("OWNER_IDS", "1, 2,3"),
            ("REWARD_RATE", "10"),
            ("TICKET_CATEGORY_REWARD", "555"),
        ]))
        .unwrap();

        assert_eq!(config.owner_ids, HashSet::from([1, 2, 3]));
        assert_eq!(config.rewards.rate, 10);
        assert_eq!(config.tickets.categories.get(&TicketKind::Reward), Some(&555));
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(AppConfig::from_lookup(env(&[("DATABASE_URL", "x")])).is_err());

        let err = AppConfig::from_lookup(env(&[
            ("DISCORD_TOKEN", "t"),
            ("DATABASE_URL", "x"),
            ("REWARD_THRESHOLD", "five"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("REWARD_THRESHOLD"));
    }
}
