use crate::modules::giveaways::model::EntryToggle;
use crate::services::reply;
use crate::{Data, Error};
use poise::serenity_prelude as serenity;

/// The entry button under a giveaway announcement.
pub async fn handle_component(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    data: &Data,
) -> Result<(), Error> {
    let content = match data
        .giveaways
        .toggle_entry(interaction.message.id.get(), interaction.user.id.get())
        .await
    {
        Ok(EntryToggle::Joined) => "🎉 You entered the giveaway. Good luck!".to_string(),
        Ok(EntryToggle::Left) => "👋 You left the giveaway.".to_string(),
        Err(e) => {
            reply::log_failure("giveaway entry", &e);
            reply::describe(&e)
        }
    };

    interaction
        .create_response(&ctx.http, reply::ephemeral(content))
        .await?;
    Ok(())
}
