use crate::{Data, Error};
use poise::serenity_prelude as serenity;
use tracing::{error, info, warn};

pub fn handler<'a>(
    ctx: &'a serenity::Context,
    event: &'a serenity::FullEvent,
    data: &'a Data,
) -> poise::BoxFuture<'a, Result<(), Error>> {
    Box::pin(async move { handle_event(ctx, event, data).await })
}

async fn handle_event(
    _ctx: &serenity::Context,
    event: &serenity::FullEvent,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::InviteCreate { data: invite, .. } => {
            if let Some(guild_id) = invite.guild_id {
                refresh(data, guild_id.get()).await;
            }
        }
        serenity::FullEvent::InviteDelete { data: invite, .. } => {
            if let Some(guild_id) = invite.guild_id {
                refresh(data, guild_id.get()).await;
            }
        }
        // Fires for every guild on startup and reconnect.
        serenity::FullEvent::GuildCreate { guild, .. } => {
            refresh(data, guild.id.get()).await;
        }
        serenity::FullEvent::GuildMemberAddition { new_member, .. } => {
            if new_member.user.bot {
                return Ok(());
            }
            let guild_id = new_member.guild_id.get();
            let member_id = new_member.user.id.get();

            match data.tracker.handle_member_join(guild_id, member_id).await {
                Ok(outcome) => data.tracker.announce_join(guild_id, member_id, &outcome).await,
                Err(e) => error!("Failed to record join of {} in guild {}: {}", member_id, guild_id, e),
            }
        }
        serenity::FullEvent::GuildMemberRemoval { guild_id, user, .. } => {
            if user.bot {
                return Ok(());
            }
            match data.tracker.handle_member_leave(user.id.get()).await {
                Ok(Some(inviter_id)) => info!(
                    "{} left guild {}, debited inviter {}",
                    user.id, guild_id, inviter_id
                ),
                Ok(None) => {}
                Err(e) => error!("Failed to record leave of {} in guild {}: {}", user.id, guild_id, e),
            }
        }
        _ => {}
    }

    Ok(())
}

async fn refresh(data: &Data, guild_id: u64) {
    if let Err(e) = data.tracker.refresh_snapshot(guild_id).await {
        warn!("Failed to refresh invite snapshot of guild {}: {}", guild_id, e);
    }
}
