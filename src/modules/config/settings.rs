use crate::services::error::{EngineError, EngineResult};
use crate::services::gate::{Access, AuthorizationGate};
use crate::services::platform::{ChannelId, GuildId, RoleId, UserId};
use crate::services::store::StateStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum ChannelKind {
    #[name = "welcome"]
    Welcome,
    #[name = "feedback"]
    Feedback,
    #[name = "log"]
    Log,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChannelBindings {
    /// Join notices.
    pub welcome: Option<ChannelId>,
    /// Where ticket openers are asked to leave feedback.
    pub feedback: Option<ChannelId>,
    /// Staff-facing audit messages.
    pub log: Option<ChannelId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AutomodConfig {
    pub enabled: bool,
    pub bypass_role_name: String,
}

impl Default for AutomodConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bypass_role_name: "Invite Bypass".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GuildSettings {
    pub staff_role_ids: BTreeSet<RoleId>,
    pub channels: ChannelBindings,
    pub customer_role_id: Option<RoleId>,
    pub invite_blacklist: BTreeSet<UserId>,
    pub webhook_url: Option<String>,
    pub automod: AutomodConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GuildConfigs {
    pub guilds: HashMap<GuildId, GuildSettings>,
}

impl GuildConfigs {
    pub fn get(&self, guild_id: GuildId) -> Option<&GuildSettings> {
        self.guilds.get(&guild_id)
    }

    pub fn entry(&mut self, guild_id: GuildId) -> &mut GuildSettings {
        self.guilds.entry(guild_id).or_default()
    }

    pub fn is_blacklisted(&self, guild_id: GuildId, user_id: UserId) -> bool {
        self.get(guild_id)
            .is_some_and(|s| s.invite_blacklist.contains(&user_id))
    }
}

pub struct SettingsService {
    store: Arc<StateStore>,
    gate: Arc<AuthorizationGate>,
}

impl SettingsService {
    pub fn new(store: Arc<StateStore>, gate: Arc<AuthorizationGate>) -> Self {
        Self { store, gate }
    }

    /// Current settings, created with defaults on first access.
    pub async fn get(&self, guild_id: GuildId) -> EngineResult<GuildSettings> {
        if let Some(settings) = self.store.guilds.read(|g| g.get(guild_id).cloned()).await {
            return Ok(settings);
        }
        let settings = self
            .store
            .guilds
            .update(|g| g.entry(guild_id).clone())
            .await?;
        Ok(settings)
    }

    async fn modify<R>(
        &self,
        guild_id: GuildId,
        actor_id: UserId,
        f: impl FnOnce(&mut GuildSettings) -> R,
    ) -> EngineResult<R> {
        self.gate.require(guild_id, actor_id, Access::Administrator).await?;
        let out = self.store.guilds.update(|g| f(g.entry(guild_id))).await?;
        Ok(out)
    }

    pub async fn add_staff_role(&self, guild_id: GuildId, actor_id: UserId, role_id: RoleId) -> EngineResult<bool> {
        self.modify(guild_id, actor_id, |s| s.staff_role_ids.insert(role_id)).await
    }

    pub async fn remove_staff_role(&self, guild_id: GuildId, actor_id: UserId, role_id: RoleId) -> EngineResult<bool> {
        self.modify(guild_id, actor_id, |s| s.staff_role_ids.remove(&role_id)).await
    }

    pub async fn set_channel(
        &self,
        guild_id: GuildId,
        actor_id: UserId,
        kind: ChannelKind,
        channel_id: Option<ChannelId>,
    ) -> EngineResult<()> {
        self.modify(guild_id, actor_id, |s| {
            let slot = match kind {
                ChannelKind::Welcome => &mut s.channels.welcome,
                ChannelKind::Feedback => &mut s.channels.feedback,
                ChannelKind::Log => &mut s.channels.log,
            };
            *slot = channel_id;
        })
        .await
    }

    pub async fn set_customer_role(
        &self,
        guild_id: GuildId,
        actor_id: UserId,
        role_id: Option<RoleId>,
    ) -> EngineResult<()> {
        self.modify(guild_id, actor_id, |s| s.customer_role_id = role_id).await
    }

    pub async fn set_webhook(&self, guild_id: GuildId, actor_id: UserId, url: Option<&str>) -> EngineResult<()> {
        let url = match url.map(str::trim).filter(|u| !u.is_empty()) {
            Some(raw) => {
                let parsed = reqwest::Url::parse(raw)
                    .map_err(|e| EngineError::validation(format!("`{}` is not a valid URL: {}", raw, e)))?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(EngineError::validation("webhook URL must use http or https"));
                }
                Some(parsed.to_string())
            }
            None => None,
        };
        self.modify(guild_id, actor_id, |s| s.webhook_url = url).await
    }

    pub async fn set_automod(
        &self,
        guild_id: GuildId,
        actor_id: UserId,
        enabled: bool,
        bypass_role_name: Option<String>,
    ) -> EngineResult<AutomodConfig> {
        if let Some(name) = &bypass_role_name {
            if name.trim().is_empty() {
                return Err(EngineError::validation("bypass role name must not be empty"));
            }
        }
        self.modify(guild_id, actor_id, |s| {
            s.automod.enabled = enabled;
            if let Some(name) = bypass_role_name {
                s.automod.bypass_role_name = name.trim().to_string();
            }
            s.automod.clone()
        })
        .await
    }

    /// Blacklists a user. Their counters and reverse links are left alone;
    /// credit reads as zero until they are removed again.
    pub async fn blacklist_add(&self, guild_id: GuildId, actor_id: UserId, user_id: UserId) -> EngineResult<bool> {
        let added = self
            .modify(guild_id, actor_id, |s| s.invite_blacklist.insert(user_id))
            .await?;
        info!("{} blacklisted {} in guild {}", actor_id, user_id, guild_id);
        Ok(added)
    }

    pub async fn blacklist_remove(&self, guild_id: GuildId, actor_id: UserId, user_id: UserId) -> EngineResult<bool> {
        let removed = self
            .modify(guild_id, actor_id, |s| s.invite_blacklist.remove(&user_id))
            .await?;
        info!("{} removed {} from the blacklist of guild {}", actor_id, user_id, guild_id);
        Ok(removed)
    }

    pub async fn is_blacklisted(&self, guild_id: GuildId, user_id: UserId) -> bool {
        self.store
            .guilds
            .read(|g| g.is_blacklisted(guild_id, user_id))
            .await
    }
}
