use crate::modules::EventHandler;
use crate::{Data, Error};
use poise::serenity_prelude as serenity;
use std::sync::{Arc, LazyLock};
use tracing::{error, info};

static MODULE_HANDLERS: LazyLock<Vec<(&'static str, EventHandler)>> = LazyLock::new(|| {
    crate::modules::get_modules()
        .into_iter()
        .flat_map(|m| {
            let id = m.definition.id;
            m.event_handlers.into_iter().map(move |h| (id, h))
        })
        .collect()
});

/// Gateway events that are not commands.
pub async fn handle_event(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Ready { data_about_bot, .. } => {
            info!("Logged in as {}", data_about_bot.user.name);
        }
        serenity::FullEvent::GuildCreate { guild, is_new, .. } => {
            if is_new.unwrap_or(false) {
                info!("Joined new guild: {} ({})", guild.name, guild.id);
            }
        }
        serenity::FullEvent::GuildDelete { incomplete, .. } => {
            info!("Left guild: {}", incomplete.id);
        }
        serenity::FullEvent::InteractionCreate { interaction, .. } => {
            handle_interactions(ctx, interaction, data);
        }
        _ => {}
    }

    let event = Arc::new(event.clone());
    for (module_id, handler) in MODULE_HANDLERS.iter() {
        let ctx = ctx.clone();
        let event = event.clone();
        let data = data.clone();
        let handler = *handler;
        let module_id = *module_id;

        tokio::spawn(async move {
            if let Err(e) = handler(&ctx, &event, &data).await {
                error!("Error in event handler for module {}: {:?}", module_id, e);
            }
        });
    }

    Ok(())
}

fn handle_interactions(ctx: &serenity::Context, interaction: &serenity::Interaction, data: &Data) {
    let ctx = ctx.clone();
    let data = data.clone();

    match interaction {
        serenity::Interaction::Component(component) => {
            let component = component.clone();
            tokio::spawn(async move {
                let custom_id = component.data.custom_id.as_str();

                let result = if custom_id == crate::modules::giveaways::scheduler::ENTER_BUTTON_ID {
                    crate::modules::giveaways::events::handle_component(&ctx, &component, &data).await
                } else if custom_id.starts_with("ticket:") {
                    crate::modules::tickets::events::handle_component(&ctx, &component, &data).await
                } else {
                    Ok(())
                };

                if let Err(e) = result {
                    error!("Error handling component {}: {:?}", component.data.custom_id, e);
                }
            });
        }
        serenity::Interaction::Modal(modal) => {
            let modal = modal.clone();
            tokio::spawn(async move {
                if modal.data.custom_id == crate::modules::tickets::events::CLOSE_MODAL_ID {
                    if let Err(e) = crate::modules::tickets::events::handle_modal(&ctx, &modal, &data).await {
                        error!("Error handling ticket close modal: {:?}", e);
                    }
                }
            });
        }
        _ => {}
    }
}
