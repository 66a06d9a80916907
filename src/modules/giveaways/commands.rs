use crate::modules::giveaways::scheduler::LaunchRequest;
use crate::services::duration::parse_duration;
use crate::services::error::{EngineError, EngineResult};
use crate::services::platform::MessageId;
use crate::services::reply::{self, author_id, guild_id};
use crate::{Context, Error};
use poise::serenity_prelude as serenity;

fn parse_message_id(raw: &str) -> EngineResult<MessageId> {
    raw.trim()
        .parse::<MessageId>()
        .map_err(|_| EngineError::validation(format!("`{}` is not a message id", raw.trim())))
}

/// Giveaways
#[poise::command(slash_command, guild_only, subcommands("start", "end", "reroll", "list"))]
pub async fn giveaway(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Start a giveaway (staff only)
#[poise::command(slash_command, guild_only)]
pub async fn start(
    ctx: Context<'_>,
    #[description = "How long it runs, e.g. 1d or 2h30m"] duration: String,
    #[description = "Number of winners"]
    #[min = 1]
    #[max = 50]
    winners: u32,
    #[description = "What is being given away"] prize: String,
    #[description = "Credited invites needed to enter"]
    #[min = 0]
    min_invites: Option<i64>,
    #[description = "Channel to post in (defaults to this one)"]
    #[channel_types("Text", "News")]
    channel: Option<serenity::GuildChannel>,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let channel_id = channel.map(|c| c.id).unwrap_or_else(|| ctx.channel_id());

    let result = match parse_duration(&duration) {
        Ok(duration) => {
            ctx.data()
                .giveaways
                .launch(
                    guild_id,
                    author_id(ctx),
                    LaunchRequest {
                        channel_id: channel_id.get(),
                        duration,
                        winner_count: winners,
                        prize,
                        min_invites: min_invites.unwrap_or(0),
                    },
                )
                .await
        }
        Err(e) => Err(e),
    };
    reply::respond_private(ctx, result, |g| {
        format!("🎉 Giveaway for **{}** started in <#{}>.", g.prize, g.channel_id)
    })
    .await
}

/// End a giveaway now (host or staff)
#[poise::command(slash_command, guild_only)]
pub async fn end(
    ctx: Context<'_>,
    #[description = "Message id of the giveaway"] message_id: String,
) -> Result<(), Error> {
    let result = match parse_message_id(&message_id) {
        Ok(id) => ctx.data().giveaways.end(id, author_id(ctx)).await,
        Err(e) => Err(e),
    };
    reply::respond_private(ctx, result, |g| {
        if g.last_winners.is_empty() {
            format!("🏁 Giveaway for **{}** ended without entries.", g.prize)
        } else {
            format!("🏁 Giveaway for **{}** ended.", g.prize)
        }
    })
    .await
}

/// Draw new winners for a giveaway (host or staff)
#[poise::command(slash_command, guild_only)]
pub async fn reroll(
    ctx: Context<'_>,
    #[description = "Message id of the giveaway"] message_id: String,
) -> Result<(), Error> {
    let result = match parse_message_id(&message_id) {
        Ok(id) => ctx.data().giveaways.reroll(id, author_id(ctx)).await,
        Err(e) => Err(e),
    };
    reply::respond_private(ctx, result, |winners| {
        format!("🔁 Rerolled, {} new winner(s) announced.", winners.len())
    })
    .await
}

/// List running giveaways
#[poise::command(slash_command, guild_only)]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let active = ctx.data().giveaways.list_active(guild_id).await;

    let mut response = String::from("🎉 **Running giveaways**\n\n");
    if active.is_empty() {
        response.push_str("None right now.");
    }
    for g in &active {
        response.push_str(&format!(
            "• **{}** in <#{}> (`{}`), {} entries, ends <t:{}:R>\n",
            g.prize,
            g.channel_id,
            g.message_id,
            g.entries.len(),
            g.ends_at.timestamp()
        ));
    }

    reply::say(ctx, response, true).await
}

pub fn commands() -> Vec<poise::Command<crate::Data, Error>> {
    vec![giveaway()]
}
