use crate::modules::tickets::descriptor::TicketKind;
use crate::modules::tickets::machine::{CLOSE_BUTTON_ID, OPEN_BUTTON_PREFIX};
use crate::services::reply;
use crate::{Data, Error};
use poise::serenity_prelude as serenity;

pub const CLOSE_MODAL_ID: &str = "ticket:close_modal";
const REASON_INPUT_ID: &str = "reason";

/// Panel buttons and the close button inside a ticket.
pub async fn handle_component(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    data: &Data,
) -> Result<(), Error> {
    let Some(guild_id) = interaction.guild_id else {
        return Ok(());
    };
    let custom_id = interaction.data.custom_id.as_str();

    if custom_id == CLOSE_BUTTON_ID {
        // Closing needs a reason, ask for one.
        let modal = serenity::CreateModal::new(CLOSE_MODAL_ID, "Close ticket").components(vec![
            serenity::CreateActionRow::InputText(
                serenity::CreateInputText::new(serenity::InputTextStyle::Paragraph, "Reason", REASON_INPUT_ID)
                    .required(true)
                    .max_length(500),
            ),
        ]);
        interaction
            .create_response(&ctx.http, serenity::CreateInteractionResponse::Modal(modal))
            .await?;
        return Ok(());
    }

    let Some(kind) = custom_id.strip_prefix(OPEN_BUTTON_PREFIX) else {
        return Ok(());
    };

    let content = match kind.parse::<TicketKind>() {
        Ok(kind) => match data
            .tickets
            .open(guild_id.get(), interaction.user.id.get(), kind)
            .await
        {
            Ok(ticket) => format!("🎫 Your ticket is ready: <#{}>", ticket.channel_id),
            Err(e) => {
                reply::log_failure("ticket open", &e);
                reply::describe(&e)
            }
        },
        Err(e) => reply::describe(&e),
    };

    interaction
        .create_response(&ctx.http, reply::ephemeral(content))
        .await?;
    Ok(())
}

pub async fn handle_modal(
    ctx: &serenity::Context,
    interaction: &serenity::ModalInteraction,
    data: &Data,
) -> Result<(), Error> {
    let Some(guild_id) = interaction.guild_id else {
        return Ok(());
    };

    let reason = interaction
        .data
        .components
        .iter()
        .flat_map(|row| row.components.iter())
        .find_map(|component| match component {
            serenity::ActionRowComponent::InputText(input) if input.custom_id == REASON_INPUT_ID => {
                input.value.clone()
            }
            _ => None,
        })
        .unwrap_or_default();

    let content = match data
        .tickets
        .close(
            guild_id.get(),
            interaction.channel_id.get(),
            interaction.user.id.get(),
            &reason,
        )
        .await
    {
        Ok(_) => "🔒 Ticket closed.".to_string(),
        Err(e) => {
            reply::log_failure("ticket close", &e);
            reply::describe(&e)
        }
    };

    interaction
        .create_response(&ctx.http, reply::ephemeral(content))
        .await?;
    Ok(())
}
