use crate::modules::tickets::descriptor::TicketKind;
use crate::services::duration::parse_duration;
use crate::services::reply::{self, author_id, guild_id};
use crate::{Context, Error};

/// Support, order, sale and reward tickets
#[poise::command(slash_command, guild_only, subcommands("panel", "open", "close", "operation"))]
pub async fn ticket(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Post the ticket panel in this channel (staff only)
#[poise::command(slash_command, guild_only)]
pub async fn panel(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let result = ctx
        .data()
        .tickets
        .post_panel(guild_id, ctx.channel_id().get(), author_id(ctx))
        .await;
    reply::respond_private(ctx, result, |_| "🎫 Ticket panel posted.".to_string()).await
}

/// Open a private ticket with staff
#[poise::command(slash_command, guild_only)]
pub async fn open(
    ctx: Context<'_>,
    #[description = "What the ticket is about"] kind: TicketKind,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    ctx.defer_ephemeral().await?;
    let result = ctx.data().tickets.open(guild_id, author_id(ctx), kind).await;
    reply::respond_private(ctx, result, |ticket| {
        format!("🎫 Your ticket is ready: <#{}>", ticket.channel_id)
    })
    .await
}

/// Close the ticket in this channel
#[poise::command(slash_command, guild_only)]
pub async fn close(
    ctx: Context<'_>,
    #[description = "Why the ticket is being closed"] reason: String,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let result = ctx
        .data()
        .tickets
        .close(guild_id, ctx.channel_id().get(), author_id(ctx), &reason)
        .await;
    reply::respond_private(ctx, result, |summary| {
        if summary.opener_notified {
            "🔒 Ticket closed, the opener has been notified.".to_string()
        } else {
            "🔒 Ticket closed. The opener could not be messaged.".to_string()
        }
    })
    .await
}

/// Operation timers on the ticket in this channel
#[poise::command(slash_command, guild_only, subcommands("start", "cancel"))]
pub async fn operation(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Grant the customer role and delete this ticket after a delay (staff only)
#[poise::command(slash_command, guild_only)]
pub async fn start(
    ctx: Context<'_>,
    #[description = "Delay before the ticket is deleted, e.g. 30m or 1h30m"] duration: String,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let result = match parse_duration(&duration) {
        Ok(delay) => {
            ctx.data()
                .tickets
                .start_operation(guild_id, ctx.channel_id().get(), author_id(ctx), delay)
                .await
        }
        Err(e) => Err(e),
    };
    reply::respond(ctx, result, |replaced| {
        let mut response = format!("⏱️ This ticket will be deleted in **{}**.", duration.trim());
        if replaced {
            response.push_str(" The previous timer was cancelled.");
        }
        response
    })
    .await
}

/// Cancel the pending operation timer (staff only)
#[poise::command(slash_command, guild_only)]
pub async fn cancel(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let result = ctx
        .data()
        .tickets
        .cancel_operation(guild_id, ctx.channel_id().get(), author_id(ctx))
        .await;
    reply::respond(ctx, result, |cancelled| {
        if cancelled {
            "⏹️ Operation timer cancelled.".to_string()
        } else {
            "ℹ️ There is no active timer on this ticket.".to_string()
        }
    })
    .await
}

pub fn commands() -> Vec<poise::Command<crate::Data, Error>> {
    vec![ticket()]
}
