use crate::modules::config::settings::SettingsService;
use crate::services::error::EngineResult;
use crate::services::gate::{Access, AuthorizationGate};
use crate::services::platform::{ChannelId, GuildId, MessageId, OutboundMessage, Platform, UserId};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};

static INVITE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:discord\.gg|discord(?:app)?\.com/invite)/[a-z0-9-]+").unwrap()
});

pub fn contains_invite(content: &str) -> bool {
    INVITE_LINK.is_match(content)
}

/// A guild message as seen by the filter.
#[derive(Debug, Clone)]
pub struct IncomingMessage<'a> {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub author_id: UserId,
    pub author_is_bot: bool,
    pub content: &'a str,
}

/// Removes invite links posted by members who are neither staff nor hold the
/// configured bypass role.
pub struct AutomodService {
    platform: Arc<dyn Platform>,
    gate: Arc<AuthorizationGate>,
    settings: Arc<SettingsService>,
}

impl AutomodService {
    pub fn new(platform: Arc<dyn Platform>, gate: Arc<AuthorizationGate>, settings: Arc<SettingsService>) -> Self {
        Self {
            platform,
            gate,
            settings,
        }
    }

    async fn has_bypass_role(&self, guild_id: GuildId, user_id: UserId, role_name: &str) -> Option<bool> {
        let roles = self.platform.role_names(guild_id).await.ok()?;
        let bypass: Vec<_> = roles
            .into_iter()
            .filter(|(_, name)| name.eq_ignore_ascii_case(role_name))
            .map(|(id, _)| id)
            .collect();
        if bypass.is_empty() {
            return Some(false);
        }

        let held = self.platform.member_roles(guild_id, user_id).await.ok()?;
        Some(held.iter().any(|r| bypass.contains(r)))
    }

    /// Returns true when the message was removed.
    pub async fn inspect(&self, message: IncomingMessage<'_>) -> EngineResult<bool> {
        if message.author_is_bot || !contains_invite(message.content) {
            return Ok(false);
        }

        let settings = self.settings.get(message.guild_id).await?;
        if !settings.automod.enabled || self.gate.is_suspended(message.guild_id).await {
            return Ok(false);
        }

        if self.gate.access_level(message.guild_id, message.author_id).await >= Access::Staff {
            return Ok(false);
        }

        match self
            .has_bypass_role(message.guild_id, message.author_id, &settings.automod.bypass_role_name)
            .await
        {
            Some(false) => {}
            Some(true) => return Ok(false),
            None => {
                warn!(
                    "Could not resolve roles of {} in guild {}, leaving message {} alone",
                    message.author_id, message.guild_id, message.message_id
                );
                return Ok(false);
            }
        }

        if let Err(e) = self
            .platform
            .delete_message(message.channel_id, message.message_id)
            .await
        {
            warn!("Failed to delete invite link {}: {}", message.message_id, e);
            return Ok(false);
        }

        info!(
            "Removed invite link from {} in channel {} of guild {}",
            message.author_id, message.channel_id, message.guild_id
        );

        if let Some(log_channel) = settings.channels.log {
            let notice = OutboundMessage::text(format!(
                "🛡️ Removed an invite link posted by <@{}> in <#{}>.",
                message.author_id, message.channel_id
            ));
            if let Err(e) = self.platform.send_message(log_channel, notice).await {
                warn!("Failed to write automod log in guild {}: {}", message.guild_id, e);
            }
        }

        Ok(true)
    }
}
