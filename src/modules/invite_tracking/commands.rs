use crate::services::reply::{self, author_id, guild_id};
use crate::{Context, Error};
use poise::serenity_prelude as serenity;

/// Invite statistics and ledger management
#[poise::command(
    slash_command,
    guild_only,
    subcommands(
        "stats", "leaderboard", "who", "list", "add", "remove", "reset", "resetall", "bind", "unbind",
        "backup", "restore"
    )
)]
pub async fn invites(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Show how many invites a user is credited with
#[poise::command(slash_command, guild_only)]
pub async fn stats(
    ctx: Context<'_>,
    #[description = "User to check (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let target = user.as_ref().unwrap_or_else(|| ctx.author());
    let tracker = &ctx.data().tracker;

    let stats = tracker.stats(target.id.get()).await;
    let credited = tracker.credit_for(guild_id, target.id.get()).await;

    let mut response = format!("📊 **Invites of {}**: **{}**\n\n", target.name, credited);
    response.push_str(&format!("📈 Joins: **{}**\n", stats.joins));
    response.push_str(&format!("🔁 Rejoins: **{}**\n", stats.rejoins));
    response.push_str(&format!("❌ Left: **{}**\n", stats.left));
    response.push_str(&format!("✍️ Manual: **{}**\n", stats.manual));
    if ctx.data().settings.is_blacklisted(guild_id, target.id.get()).await {
        response.push_str("\n⛔ This user is blacklisted and earns no invites.");
    }

    reply::say(ctx, response, false).await
}

/// Show the top inviters of this server
#[poise::command(slash_command, guild_only)]
pub async fn leaderboard(
    ctx: Context<'_>,
    #[description = "Number of users to show (default: 10)"]
    #[min = 1]
    #[max = 50]
    limit: Option<u32>,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let limit = limit.unwrap_or(10) as usize;
    let top = ctx.data().tracker.leaderboard(guild_id, limit).await;

    let mut response = format!("🏆 **Top {} Inviters**\n\n", limit);
    if top.is_empty() {
        response.push_str("No invite data available yet.");
    }
    for (idx, (user_id, credited)) in top.iter().enumerate() {
        let medal = match idx {
            0 => "🥇",
            1 => "🥈",
            2 => "🥉",
            _ => "  ",
        };
        response.push_str(&format!("{} **#{}** <@{}> - {} invites\n", medal, idx + 1, user_id, credited));
    }

    reply::say(ctx, response, false).await
}

/// Show who invited a member
#[poise::command(slash_command, guild_only)]
pub async fn who(
    ctx: Context<'_>,
    #[description = "Member to look up"] user: serenity::User,
) -> Result<(), Error> {
    let response = match ctx.data().tracker.inviter_of(user.id.get()).await {
        Some(inviter_id) => format!("👤 {} was invited by <@{}>.", user.name, inviter_id),
        None => format!("🤷 Nobody is credited for inviting {}.", user.name),
    };
    reply::say(ctx, response, true).await
}

/// List the members a user has invited
#[poise::command(slash_command, guild_only)]
pub async fn list(
    ctx: Context<'_>,
    #[description = "Inviter (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let target = user.as_ref().unwrap_or_else(|| ctx.author());
    let rows = ctx.data().tracker.invited_by(target.id.get()).await;

    let mut response = format!("📋 **Members invited by {}**\n\n", target.name);
    if rows.is_empty() {
        response.push_str("Nobody yet.");
    }
    for (member_id, record) in rows.iter().take(25) {
        let status = if record.active { "✅" } else { "❌" };
        response.push_str(&format!(
            "{} <@{}> joined <t:{}:R>{}\n",
            status,
            member_id,
            record.joined_at.timestamp(),
            record
                .invite_code
                .as_ref()
                .map(|c| format!(" via `{}`", c))
                .unwrap_or_default()
        ));
    }
    if rows.len() > 25 {
        response.push_str(&format!("…and {} more.", rows.len() - 25));
    }

    reply::say(ctx, response, true).await
}

/// Add invites to a user (administrators only)
#[poise::command(slash_command, guild_only)]
pub async fn add(
    ctx: Context<'_>,
    #[description = "User to credit"] user: serenity::User,
    #[description = "Invites to add"]
    #[min = 1]
    amount: i64,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let result = ctx
        .data()
        .tracker
        .adjust_manual(guild_id, author_id(ctx), user.id.get(), amount)
        .await;
    reply::respond(ctx, result, |stats| {
        format!("✅ Added {} invites to <@{}> (manual total: {}).", amount, user.id, stats.manual)
    })
    .await
}

/// Remove invites from a user (administrators only)
#[poise::command(slash_command, guild_only)]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "User to debit"] user: serenity::User,
    #[description = "Invites to remove"]
    #[min = 1]
    amount: i64,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let result = ctx
        .data()
        .tracker
        .adjust_manual(guild_id, author_id(ctx), user.id.get(), -amount)
        .await;
    reply::respond(ctx, result, |stats| {
        format!("✅ Removed {} invites from <@{}> (manual total: {}).", amount, user.id, stats.manual)
    })
    .await
}

/// Reset a user's invites and detach them from everyone they invited
#[poise::command(slash_command, guild_only)]
pub async fn reset(
    ctx: Context<'_>,
    #[description = "User to reset"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let result = ctx
        .data()
        .tracker
        .reset(guild_id, author_id(ctx), user.id.get())
        .await;
    reply::respond(ctx, result, |_| format!("🧹 Invites of <@{}> were reset.", user.id)).await
}

/// Wipe the whole invite ledger
#[poise::command(slash_command, guild_only)]
pub async fn resetall(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let result = ctx.data().tracker.reset_all(guild_id, author_id(ctx)).await;
    reply::respond(ctx, result, |_| "🧹 The invite ledger was wiped.".to_string()).await
}

/// Credit every join through an invite code to a user
#[poise::command(slash_command, guild_only)]
pub async fn bind(
    ctx: Context<'_>,
    #[description = "Invite code"] code: String,
    #[description = "User to credit"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let result = ctx
        .data()
        .tracker
        .bind_code(guild_id, author_id(ctx), &code, user.id.get())
        .await;
    reply::respond_private(ctx, result, |previous| match previous {
        Some(old) => format!("🔗 `{}` now credits <@{}> (was <@{}>).", code.trim(), user.id, old),
        None => format!("🔗 `{}` now credits <@{}>.", code.trim(), user.id),
    })
    .await
}

/// Remove a code binding
#[poise::command(slash_command, guild_only)]
pub async fn unbind(
    ctx: Context<'_>,
    #[description = "Invite code"] code: String,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let result = ctx.data().tracker.unbind_code(guild_id, author_id(ctx), &code).await;
    reply::respond_private(ctx, result, |owner| {
        format!("🔗 `{}` no longer credits <@{}>.", code.trim(), owner)
    })
    .await
}

/// Save a copy of the invite ledger
#[poise::command(slash_command, guild_only)]
pub async fn backup(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let result = ctx.data().tracker.backup(guild_id, author_id(ctx)).await;
    reply::respond_private(ctx, result, |at| format!("💾 Ledger backed up at <t:{}:f>.", at.timestamp())).await
}

/// Replace the invite ledger with the last backup
#[poise::command(slash_command, guild_only)]
pub async fn restore(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let result = ctx.data().tracker.restore(guild_id, author_id(ctx)).await;
    reply::respond_private(ctx, result, |at| {
        format!("♻️ Ledger restored from the backup of <t:{}:f>.", at.timestamp())
    })
    .await
}

pub fn commands() -> Vec<poise::Command<crate::Data, Error>> {
    vec![invites()]
}
