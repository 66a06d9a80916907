use crate::services::platform::{
    Button, ChannelId, ChannelInfo, ChannelSpec, GuildId, InviteInfo, MessageId, OutboundMessage, Platform,
    PlatformError, RoleId, UserId,
};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

impl From<serenity::Error> for PlatformError {
    fn from(e: serenity::Error) -> Self {
        PlatformError(e.to_string())
    }
}

fn components(buttons: &[Button]) -> Vec<serenity::CreateActionRow> {
    if buttons.is_empty() {
        return vec![];
    }
    buttons
        .chunks(5)
        .map(|row| {
            serenity::CreateActionRow::Buttons(
                row.iter()
                    .map(|b| {
                        serenity::CreateButton::new(b.custom_id.clone())
                            .label(b.label.clone())
                            .style(serenity::ButtonStyle::Primary)
                            .disabled(b.disabled)
                    })
                    .collect(),
            )
        })
        .collect()
}

/// `Platform` over serenity's REST client.
pub struct SerenityPlatform {
    http: Arc<serenity::Http>,
}

impl SerenityPlatform {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Platform for SerenityPlatform {
    async fn fetch_invites(&self, guild_id: GuildId) -> Result<Vec<InviteInfo>, PlatformError> {
        let invites = serenity::GuildId::new(guild_id).invites(&*self.http).await?;
        Ok(invites
            .into_iter()
            .map(|invite| InviteInfo {
                code: invite.code,
                uses: invite.uses,
                inviter_id: invite.inviter.map(|u| u.id.get()),
            })
            .collect())
    }

    async fn send_message(&self, channel_id: ChannelId, message: OutboundMessage) -> Result<MessageId, PlatformError> {
        let builder = serenity::CreateMessage::new()
            .content(message.content)
            .components(components(&message.buttons));
        let sent = serenity::ChannelId::new(channel_id)
            .send_message(&*self.http, builder)
            .await?;
        Ok(sent.id.get())
    }

    async fn edit_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        message: OutboundMessage,
    ) -> Result<(), PlatformError> {
        let builder = serenity::EditMessage::new()
            .content(message.content)
            .components(components(&message.buttons));
        serenity::ChannelId::new(channel_id)
            .edit_message(&*self.http, serenity::MessageId::new(message_id), builder)
            .await?;
        Ok(())
    }

    async fn delete_message(&self, channel_id: ChannelId, message_id: MessageId) -> Result<(), PlatformError> {
        serenity::ChannelId::new(channel_id)
            .delete_message(&*self.http, serenity::MessageId::new(message_id))
            .await?;
        Ok(())
    }

    async fn create_channel(&self, guild_id: GuildId, spec: ChannelSpec) -> Result<ChannelId, PlatformError> {
        let visible = serenity::Permissions::VIEW_CHANNEL
            | serenity::Permissions::SEND_MESSAGES
            | serenity::Permissions::READ_MESSAGE_HISTORY
            | serenity::Permissions::ATTACH_FILES;

        // The @everyone role shares the guild's id.
        let mut overwrites = vec![serenity::PermissionOverwrite {
            allow: serenity::Permissions::empty(),
            deny: serenity::Permissions::VIEW_CHANNEL,
            kind: serenity::PermissionOverwriteType::Role(serenity::RoleId::new(guild_id)),
        }];
        overwrites.extend(spec.member_ids.iter().map(|id| serenity::PermissionOverwrite {
            allow: visible,
            deny: serenity::Permissions::empty(),
            kind: serenity::PermissionOverwriteType::Member(serenity::UserId::new(*id)),
        }));
        overwrites.extend(spec.role_ids.iter().map(|id| serenity::PermissionOverwrite {
            allow: visible,
            deny: serenity::Permissions::empty(),
            kind: serenity::PermissionOverwriteType::Role(serenity::RoleId::new(*id)),
        }));

        let mut builder = serenity::CreateChannel::new(spec.name)
            .kind(serenity::ChannelType::Text)
            .topic(spec.topic)
            .permissions(overwrites);
        if let Some(category_id) = spec.category_id {
            builder = builder.category(serenity::ChannelId::new(category_id));
        }

        let channel = serenity::GuildId::new(guild_id)
            .create_channel(&*self.http, builder)
            .await?;
        Ok(channel.id.get())
    }

    async fn delete_channel(&self, channel_id: ChannelId) -> Result<(), PlatformError> {
        serenity::ChannelId::new(channel_id).delete(&*self.http).await?;
        Ok(())
    }

    async fn list_channels(&self, guild_id: GuildId) -> Result<Vec<ChannelInfo>, PlatformError> {
        let channels = serenity::GuildId::new(guild_id).channels(&*self.http).await?;
        Ok(channels
            .into_values()
            .map(|c| ChannelInfo {
                id: c.id.get(),
                name: c.name,
                topic: c.topic,
            })
            .collect())
    }

    async fn add_role(&self, guild_id: GuildId, user_id: UserId, role_id: RoleId) -> Result<(), PlatformError> {
        self.http
            .add_member_role(
                serenity::GuildId::new(guild_id),
                serenity::UserId::new(user_id),
                serenity::RoleId::new(role_id),
                Some("Ticket operation started"),
            )
            .await?;
        Ok(())
    }

    async fn direct_message(&self, user_id: UserId, content: String) -> Result<(), PlatformError> {
        serenity::UserId::new(user_id)
            .direct_message(&*self.http, serenity::CreateMessage::new().content(content))
            .await?;
        Ok(())
    }

    async fn member_roles(&self, guild_id: GuildId, user_id: UserId) -> Result<Vec<RoleId>, PlatformError> {
        let member = serenity::GuildId::new(guild_id)
            .member(&*self.http, serenity::UserId::new(user_id))
            .await?;
        Ok(member.roles.iter().map(|r| r.get()).collect())
    }

    async fn role_names(&self, guild_id: GuildId) -> Result<Vec<(RoleId, String)>, PlatformError> {
        let roles = serenity::GuildId::new(guild_id).roles(&*self.http).await?;
        Ok(roles
            .into_iter()
            .map(|(id, role)| (id.get(), role.name))
            .collect())
    }

    async fn is_administrator(&self, guild_id: GuildId, user_id: UserId) -> Result<bool, PlatformError> {
        let guild = self.http.get_guild(serenity::GuildId::new(guild_id)).await?;
        if guild.owner_id.get() == user_id {
            return Ok(true);
        }

        let member = guild.member(&*self.http, serenity::UserId::new(user_id)).await?;
        let everyone = serenity::RoleId::new(guild_id);
        Ok(guild
            .roles
            .iter()
            .filter(|(id, _)| **id == everyone || member.roles.contains(id))
            .any(|(_, role)| role.permissions.administrator()))
    }
}
