//! The capability calls the workflows make against the chat platform.
//!
//! Workflows only ever see plain snowflake ids and the small value types
//! below; `services::discord` maps them onto serenity.

use async_trait::async_trait;
use thiserror::Error;

pub type GuildId = u64;
pub type UserId = u64;
pub type ChannelId = u64;
pub type MessageId = u64;
pub type RoleId = u64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct PlatformError(pub String);

/// A live invite and its current use count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteInfo {
    pub code: String,
    pub uses: u64,
    pub inviter_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub name: String,
    pub topic: Option<String>,
}

/// A text channel visible only to the listed members and roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub name: String,
    pub category_id: Option<ChannelId>,
    pub topic: String,
    pub member_ids: Vec<UserId>,
    pub role_ids: Vec<RoleId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub custom_id: String,
    pub label: String,
    pub disabled: bool,
}

impl Button {
    pub fn new(custom_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            custom_id: custom_id.into(),
            label: label.into(),
            disabled: false,
        }
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundMessage {
    pub content: String,
    pub buttons: Vec<Button>,
}

impl OutboundMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            buttons: Vec::new(),
        }
    }

    pub fn with_button(mut self, button: Button) -> Self {
        self.buttons.push(button);
        self
    }
}

#[async_trait]
pub trait Platform: Send + Sync {
    async fn fetch_invites(&self, guild_id: GuildId) -> Result<Vec<InviteInfo>, PlatformError>;

    async fn send_message(
        &self,
        channel_id: ChannelId,
        message: OutboundMessage,
    ) -> Result<MessageId, PlatformError>;

    async fn edit_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        message: OutboundMessage,
    ) -> Result<(), PlatformError>;

    async fn delete_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<(), PlatformError>;

    async fn create_channel(
        &self,
        guild_id: GuildId,
        spec: ChannelSpec,
    ) -> Result<ChannelId, PlatformError>;

    async fn delete_channel(&self, channel_id: ChannelId) -> Result<(), PlatformError>;

    async fn list_channels(&self, guild_id: GuildId) -> Result<Vec<ChannelInfo>, PlatformError>;

    async fn add_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<(), PlatformError>;

    async fn direct_message(&self, user_id: UserId, content: String) -> Result<(), PlatformError>;

    async fn member_roles(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<Vec<RoleId>, PlatformError>;

    /// Role id to role name for every role in the guild.
    async fn role_names(&self, guild_id: GuildId) -> Result<Vec<(RoleId, String)>, PlatformError>;

    async fn is_administrator(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<bool, PlatformError>;
}
