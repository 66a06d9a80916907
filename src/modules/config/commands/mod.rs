use crate::modules::config::settings::ChannelKind;
use crate::services::reply::{self, author_id, guild_id};
use crate::{Context, Error};
use poise::ChoiceParameter as _;
use poise::serenity_prelude as serenity;

fn mention_channel(id: Option<u64>) -> String {
    id.map(|c| format!("<#{}>", c)).unwrap_or_else(|| "not set".to_string())
}

/// Server configuration
#[poise::command(
    slash_command,
    guild_only,
    subcommands(
        "show", "staff_add", "staff_remove", "channel", "customer_role", "webhook", "automod",
        "blacklist_add", "blacklist_remove"
    ),
    default_member_permissions = "ADMINISTRATOR"
)]
pub async fn config(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Show the current configuration
#[poise::command(slash_command, guild_only)]
pub async fn show(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let result = ctx.data().settings.get(guild_id).await;
    let suspended = ctx.data().gate.is_suspended(guild_id).await;

    reply::respond_private(ctx, result, |s| {
        let staff = if s.staff_role_ids.is_empty() {
            "none".to_string()
        } else {
            s.staff_role_ids
                .iter()
                .map(|r| format!("<@&{}>", r))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut response = String::from("⚙️ **Configuration**\n\n");
        response.push_str(&format!("👮 Staff roles: {}\n", staff));
        response.push_str(&format!("👋 Welcome channel: {}\n", mention_channel(s.channels.welcome)));
        response.push_str(&format!("⭐ Feedback channel: {}\n", mention_channel(s.channels.feedback)));
        response.push_str(&format!("📜 Log channel: {}\n", mention_channel(s.channels.log)));
        response.push_str(&format!(
            "🛒 Customer role: {}\n",
            s.customer_role_id
                .map(|r| format!("<@&{}>", r))
                .unwrap_or_else(|| "not set".to_string())
        ));
        response.push_str(&format!(
            "💸 Payout webhook: {}\n",
            if s.webhook_url.is_some() { "configured" } else { "not set" }
        ));
        response.push_str(&format!(
            "🛡️ Automod: {} (bypass role `{}`)\n",
            if s.automod.enabled { "on" } else { "off" },
            s.automod.bypass_role_name
        ));
        response.push_str(&format!("⛔ Blacklisted users: {}\n", s.invite_blacklist.len()));
        if suspended {
            response.push_str("\n⏸️ The bot is suspended in this server.");
        }
        response
    })
    .await
}

/// Add a staff role
#[poise::command(slash_command, guild_only, rename = "staff-add")]
pub async fn staff_add(
    ctx: Context<'_>,
    #[description = "Role whose members count as staff"] role: serenity::Role,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let result = ctx
        .data()
        .settings
        .add_staff_role(guild_id, author_id(ctx), role.id.get())
        .await;
    reply::respond_private(ctx, result, |added| {
        if added {
            format!("✅ <@&{}> is now a staff role.", role.id)
        } else {
            format!("ℹ️ <@&{}> already was a staff role.", role.id)
        }
    })
    .await
}

/// Remove a staff role
#[poise::command(slash_command, guild_only, rename = "staff-remove")]
pub async fn staff_remove(
    ctx: Context<'_>,
    #[description = "Role to remove"] role: serenity::Role,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let result = ctx
        .data()
        .settings
        .remove_staff_role(guild_id, author_id(ctx), role.id.get())
        .await;
    reply::respond_private(ctx, result, |removed| {
        if removed {
            format!("✅ <@&{}> is no longer a staff role.", role.id)
        } else {
            format!("ℹ️ <@&{}> was not a staff role.", role.id)
        }
    })
    .await
}

/// Bind or clear one of the bot's channels
#[poise::command(slash_command, guild_only)]
pub async fn channel(
    ctx: Context<'_>,
    #[description = "Which channel to set"] kind: ChannelKind,
    #[description = "Leave empty to clear"]
    #[channel_types("Text", "News")]
    channel: Option<serenity::GuildChannel>,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let channel_id = channel.map(|c| c.id.get());
    let result = ctx
        .data()
        .settings
        .set_channel(guild_id, author_id(ctx), kind, channel_id)
        .await;
    reply::respond_private(ctx, result, |_| {
        format!("✅ {} channel: {}", kind.name(), mention_channel(channel_id))
    })
    .await
}

/// Set the role granted when a ticket's operation timer starts
#[poise::command(slash_command, guild_only, rename = "customer-role")]
pub async fn customer_role(
    ctx: Context<'_>,
    #[description = "Leave empty to clear"] role: Option<serenity::Role>,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let role_id = role.map(|r| r.id.get());
    let result = ctx
        .data()
        .settings
        .set_customer_role(guild_id, author_id(ctx), role_id)
        .await;
    reply::respond_private(ctx, result, |_| match role_id {
        Some(id) => format!("✅ Customer role set to <@&{}>.", id),
        None => "✅ Customer role cleared.".to_string(),
    })
    .await
}

/// Set the webhook reward payouts are sent to
#[poise::command(slash_command, guild_only)]
pub async fn webhook(
    ctx: Context<'_>,
    #[description = "http(s) URL, leave empty to clear"] url: Option<String>,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let result = ctx
        .data()
        .settings
        .set_webhook(guild_id, author_id(ctx), url.as_deref())
        .await;
    reply::respond_private(ctx, result, |_| {
        if url.is_some() {
            "✅ Payout webhook saved.".to_string()
        } else {
            "✅ Payout webhook cleared.".to_string()
        }
    })
    .await
}

/// Turn invite-link removal on or off
#[poise::command(slash_command, guild_only)]
pub async fn automod(
    ctx: Context<'_>,
    #[description = "Remove invite links from regular members"] enabled: bool,
    #[description = "Name of the role that may post invite links"] bypass_role: Option<String>,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let result = ctx
        .data()
        .settings
        .set_automod(guild_id, author_id(ctx), enabled, bypass_role)
        .await;
    reply::respond_private(ctx, result, |automod| {
        format!(
            "🛡️ Automod is {}. Members with the `{}` role may post invites.",
            if automod.enabled { "on" } else { "off" },
            automod.bypass_role_name
        )
    })
    .await
}

/// Stop a user from earning invites
#[poise::command(slash_command, guild_only, rename = "blacklist-add")]
pub async fn blacklist_add(
    ctx: Context<'_>,
    #[description = "User to blacklist"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let result = ctx
        .data()
        .settings
        .blacklist_add(guild_id, author_id(ctx), user.id.get())
        .await;
    reply::respond_private(ctx, result, |_| {
        format!("⛔ <@{}> is blacklisted; their invites count as 0 until removed.", user.id)
    })
    .await
}

/// Let a blacklisted user earn invites again
#[poise::command(slash_command, guild_only, rename = "blacklist-remove")]
pub async fn blacklist_remove(
    ctx: Context<'_>,
    #[description = "User to remove from the blacklist"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let result = ctx
        .data()
        .settings
        .blacklist_remove(guild_id, author_id(ctx), user.id.get())
        .await;
    reply::respond_private(ctx, result, |removed| {
        if removed {
            format!("✅ <@{}> was removed from the blacklist.", user.id)
        } else {
            format!("ℹ️ <@{}> was not blacklisted.", user.id)
        }
    })
    .await
}

/// Bot owner controls
#[poise::command(slash_command, guild_only, subcommands("suspend", "resume"))]
pub async fn bot(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Pause every workflow in this server (bot owners only)
#[poise::command(slash_command, guild_only)]
pub async fn suspend(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let result = ctx.data().gate.suspend(guild_id, author_id(ctx)).await;
    reply::respond_private(ctx, result, |changed| {
        if changed {
            "⏸️ The bot is now suspended in this server.".to_string()
        } else {
            "ℹ️ The bot was already suspended here.".to_string()
        }
    })
    .await
}

/// Lift a suspension (bot owners only)
#[poise::command(slash_command, guild_only)]
pub async fn resume(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let result = ctx.data().gate.resume(guild_id, author_id(ctx)).await;
    reply::respond_private(ctx, result, |changed| {
        if changed {
            "▶️ The bot is active again in this server.".to_string()
        } else {
            "ℹ️ The bot was not suspended here.".to_string()
        }
    })
    .await
}

pub fn commands() -> Vec<poise::Command<crate::Data, Error>> {
    vec![config(), bot()]
}
