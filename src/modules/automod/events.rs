use crate::modules::automod::filter::IncomingMessage;
use crate::{Data, Error};
use poise::serenity_prelude as serenity;
use tracing::error;

pub fn handler<'a>(
    _ctx: &'a serenity::Context,
    event: &'a serenity::FullEvent,
    data: &'a Data,
) -> poise::BoxFuture<'a, Result<(), Error>> {
    Box::pin(async move {
        let serenity::FullEvent::Message { new_message, .. } = event else {
            return Ok(());
        };
        let Some(guild_id) = new_message.guild_id else {
            return Ok(());
        };

        let message = IncomingMessage {
            guild_id: guild_id.get(),
            channel_id: new_message.channel_id.get(),
            message_id: new_message.id.get(),
            author_id: new_message.author.id.get(),
            author_is_bot: new_message.author.bot,
            content: &new_message.content,
        };
        if let Err(e) = data.automod.inspect(message).await {
            error!("Automod failed on message {}: {}", new_message.id, e);
        }
        Ok(())
    })
}
