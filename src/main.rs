use anyhow::Context as _;
use clap::Parser as _;
use dotenvy::dotenv;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod db;
mod modules;
mod services;

use services::app_config::AppConfig;
use services::store::StateStore;

#[derive(clap::Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Publish commands. If no guild ID is provided, publish globally.
    #[arg(long, num_args = 0..)]
    publish: Option<Vec<u64>>,

    /// Clear all commands instead of publishing them.
    #[arg(long)]
    clear: bool,

    /// Rollback the specified number of migrations and run all migrations again.
    #[arg(long, num_args = 0..=1, default_missing_value = "1")]
    refresh_migrations: Option<u32>,
}

// Custom user data passed to all command functions
#[derive(Clone)]
pub struct Data {
    pub gate: Arc<services::gate::AuthorizationGate>,
    pub settings: Arc<modules::config::settings::SettingsService>,
    pub tracker: Arc<modules::invite_tracking::tracking::InviteTracker>,
    pub rewards: Arc<modules::rewards::workflow::RewardService>,
    pub tickets: Arc<modules::tickets::machine::TicketService>,
    pub giveaways: Arc<modules::giveaways::scheduler::GiveawayService>,
    pub automod: Arc<modules::automod::filter::AutomodService>,
    pub module_definitions: Arc<Vec<modules::ModuleDefinition>>,
}

pub type Error = anyhow::Error;
pub type Context<'a> = poise::Context<'a, Data, Error>;

fn build_data(config: Arc<AppConfig>, store: Arc<StateStore>, http: Arc<serenity::Http>) -> Data {
    let platform: Arc<dyn services::platform::Platform> =
        Arc::new(services::discord::SerenityPlatform::new(http));

    let gate = Arc::new(services::gate::AuthorizationGate::new(
        store.clone(),
        platform.clone(),
        config.owner_ids.clone(),
    ));
    let settings = Arc::new(modules::config::settings::SettingsService::new(
        store.clone(),
        gate.clone(),
    ));
    let tracker = Arc::new(modules::invite_tracking::tracking::InviteTracker::new(
        store.clone(),
        platform.clone(),
        gate.clone(),
    ));
    let rewards = Arc::new(modules::rewards::workflow::RewardService::new(
        tracker.clone(),
        settings.clone(),
        gate.clone(),
        Arc::new(services::webhook::WebhookNotifier::new()),
        config.rewards,
    ));
    let tickets = Arc::new(modules::tickets::machine::TicketService::new(
        platform.clone(),
        gate.clone(),
        settings.clone(),
        tracker.clone(),
        config.tickets.clone(),
        config.rewards.threshold,
    ));
    let giveaways = Arc::new(modules::giveaways::scheduler::GiveawayService::new(
        store,
        platform.clone(),
        gate.clone(),
        tracker.clone(),
    ));
    let automod = Arc::new(modules::automod::filter::AutomodService::new(
        platform,
        gate.clone(),
        settings.clone(),
    ));

    Data {
        gate,
        settings,
        tracker,
        rewards,
        tickets,
        giveaways,
        automod,
        module_definitions: Arc::new(modules::definitions()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting invite bot...");

    let config = Arc::new(AppConfig::from_env().context("Invalid configuration")?);

    // Establish database connection
    let db = db::establish_connection(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    // Run migrations
    use sea_orm_migration::MigratorTrait;
    if let Some(depth) = args.refresh_migrations {
        info!("Refreshing migrations (down {}, then up)...", depth);
        db::migrations::Migrator::down(&db, Some(depth))
            .await
            .context("Failed to rollback migration")?;
    }

    db::migrations::Migrator::up(&db, None)
        .await
        .context("Failed to run migrations")?;

    if args.refresh_migrations.is_some() {
        info!("Migrations refreshed successfully.");
        return Ok(());
    }

    let commands = modules::commands();

    // Handle command registration if requested
    if let Some(publish_args) = args.publish {
        let http = serenity::Http::new(&config.discord_token);
        let bot_user = http
            .get_current_user()
            .await
            .context("Failed to fetch bot user info")?;
        http.set_application_id(serenity::ApplicationId::new(bot_user.id.get()));
        info!("Fetched Application ID: {}", bot_user.id);

        let empty_commands = vec![];
        let commands = if args.clear { &empty_commands } else { &commands };

        if publish_args.is_empty() {
            if args.clear {
                info!("Clearing commands globally...");
            } else {
                info!("Registering commands globally...");
            }

            if let Err(e) = poise::builtins::register_globally(&http, commands).await {
                error!("Failed to register commands globally: {}", e);
            } else {
                info!("Global command operation successful");
            }
        } else {
            for guild_id in publish_args {
                if args.clear {
                    info!("Clearing commands in guild {}...", guild_id);
                } else {
                    info!("Registering commands in guild {}...", guild_id);
                }

                if let Err(e) =
                    poise::builtins::register_in_guild(&http, commands, serenity::GuildId::new(guild_id)).await
                {
                    error!("Failed to register commands in guild {}: {}", guild_id, e);
                } else {
                    info!("Guild command operation successful for guild {}", guild_id);
                }
            }
        }
        return Ok(());
    }

    let backend = Arc::new(services::store::DatabaseBackend::new(db));
    let store = Arc::new(
        StateStore::open(backend)
            .await
            .context("Failed to load stored state")?,
    );

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::MESSAGE_CONTENT;

    let framework_options = poise::FrameworkOptions {
        commands,
        event_handler: |ctx, event, framework, data| {
            Box::pin(services::event_manager::handle_event(ctx, event, framework, data))
        },
        on_error: |error| {
            Box::pin(async move {
                if let poise::FrameworkError::Command { error, ctx, .. } = &error {
                    error!("Command {} failed: {:?}", ctx.command().qualified_name, error);
                }
                if let Err(e) = poise::builtins::on_error(error).await {
                    error!("Error while handling error: {}", e);
                }
            })
        },
        ..Default::default()
    };

    let token = config.discord_token.clone();
    let framework = poise::Framework::builder()
        .options(framework_options)
        .setup(move |ctx, ready, _framework| {
            Box::pin(async move {
                info!("Connected as {}", ready.user.name);
                let data = build_data(config, store, ctx.http.clone());

                // Giveaways outlive the process; re-arm their completion timers.
                data.giveaways.resume_all().await;
                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .context("Failed to create client")?;

    info!("Bot is ready!");
    client.start_autosharded().await.context("Client error")?;

    Ok(())
}
