use crate::{Context, Error};

/// List every module and its commands
#[poise::command(slash_command, guild_only)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    let commands = &ctx.framework().options().commands;

    let mut response = String::from("📖 **Commands**\n");
    for module in ctx.data().module_definitions.iter() {
        response.push_str(&format!("\n**{}**: {}\n", module.name, module.description));
        for command in commands
            .iter()
            .filter(|c| c.category.as_deref() == Some(module.id))
        {
            if command.subcommands.is_empty() {
                response.push_str(&format!("`/{}`\n", command.name));
            }
            for sub in &command.subcommands {
                response.push_str(&format!(
                    "`/{} {}` {}\n",
                    command.name,
                    sub.name,
                    sub.description.as_deref().unwrap_or_default()
                ));
            }
        }
    }

    // Stay under the message length limit.
    let mut chunks = vec![String::new()];
    for line in response.lines() {
        if chunks.last().is_some_and(|c| c.len() + line.len() + 1 > 1900) {
            chunks.push(String::new());
        }
        if let Some(chunk) = chunks.last_mut() {
            chunk.push_str(line);
            chunk.push('\n');
        }
    }

    for chunk in chunks {
        ctx.send(poise::CreateReply::default().content(chunk).ephemeral(true))
            .await?;
    }

    Ok(())
}
