use crate::services::error::{EngineError, EngineResult};
use crate::services::platform::{GuildId, UserId};
use crate::{Context, Error};
use anyhow::Context as _;
use poise::serenity_prelude as serenity;
use tracing::{debug, error, warn};

pub fn guild_id(ctx: Context<'_>) -> Result<GuildId, Error> {
    Ok(ctx
        .guild_id()
        .context("this command only works inside a server")?
        .get())
}

pub fn author_id(ctx: Context<'_>) -> UserId {
    ctx.author().id.get()
}

pub async fn say(ctx: Context<'_>, content: impl Into<String>, ephemeral: bool) -> Result<(), Error> {
    ctx.send(
        poise::CreateReply::default()
            .content(content)
            .ephemeral(ephemeral),
    )
    .await?;
    Ok(())
}

/// Logs a failed operation at the level its kind deserves.
pub fn log_failure(operation: &str, err: &EngineError) {
    match err {
        EngineError::Persistence(_) => error!("{} failed: {}", operation, err),
        EngineError::External(_) => warn!("{} failed: {}", operation, err),
        _ => debug!("{} rejected: {}", operation, err),
    }
}

pub fn describe(err: &EngineError) -> String {
    match err {
        EngineError::Persistence(_) => "❌ Something went wrong while saving, please try again.".to_string(),
        _ => format!("❌ {}", err),
    }
}

/// Replies with the rendered value, or an ephemeral error message.
pub async fn respond<T>(
    ctx: Context<'_>,
    result: EngineResult<T>,
    render: impl FnOnce(T) -> String,
) -> Result<(), Error> {
    match result {
        Ok(value) => say(ctx, render(value), false).await,
        Err(e) => {
            log_failure(&ctx.command().qualified_name, &e);
            say(ctx, describe(&e), true).await
        }
    }
}

/// Same as `respond`, but the success message is only shown to the caller.
pub async fn respond_private<T>(
    ctx: Context<'_>,
    result: EngineResult<T>,
    render: impl FnOnce(T) -> String,
) -> Result<(), Error> {
    match result {
        Ok(value) => say(ctx, render(value), true).await,
        Err(e) => {
            log_failure(&ctx.command().qualified_name, &e);
            say(ctx, describe(&e), true).await
        }
    }
}

pub fn ephemeral(content: impl Into<String>) -> serenity::CreateInteractionResponse {
    serenity::CreateInteractionResponse::Message(
        serenity::CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true),
    )
}
