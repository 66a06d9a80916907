use crate::modules::rewards::workflow::ClaimForm;
use crate::services::reply::{self, author_id, guild_id};
use crate::{Context, Error};

/// Invite rewards
#[poise::command(slash_command, guild_only, subcommands("check", "claim"))]
pub async fn reward(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Check whether you can claim a reward
#[poise::command(slash_command, guild_only)]
pub async fn check(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let rewards = &ctx.data().rewards;
    let eligibility = rewards.check_eligible(guild_id, author_id(ctx)).await;

    let response = if eligibility.ok {
        format!(
            "🎁 You have **{}** invites and can claim **{}**. Use `/reward claim`.",
            eligibility.invites,
            rewards.payout_for(eligibility.invites)
        )
    } else {
        format!(
            "⏳ You have **{}** invites. You need **{}** to claim a reward.",
            eligibility.invites, eligibility.threshold
        )
    };
    reply::say(ctx, response, true).await
}

/// Claim your invite reward; your invites are reset once it is sent
#[poise::command(slash_command, guild_only)]
pub async fn claim(
    ctx: Context<'_>,
    #[description = "Where the payout should be sent"] account: String,
    #[description = "Anything staff should know"] note: Option<String>,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    ctx.defer_ephemeral().await?;

    let result = ctx
        .data()
        .rewards
        .claim(guild_id, author_id(ctx), ClaimForm { account, note })
        .await;
    reply::respond_private(ctx, result, |receipt| {
        format!(
            "✅ Claim sent for **{}** invites, payout **{}**. Your invites have been reset.",
            receipt.invites, receipt.amount
        )
    })
    .await
}

pub fn commands() -> Vec<poise::Command<crate::Data, Error>> {
    vec![reward()]
}
