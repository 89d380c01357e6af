// This is the entry point of shieldbot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (SQLite stores)
// - `discord/` = Discord-specific adapters (commands, events)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands and event handlers

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use crate::config::BotConfig;
use crate::core::isolation::IsolationService;
use crate::core::modlog::ModLogService;
use crate::core::notify::OperatorNotifier;
use crate::core::permissions::PermissionService;
use crate::discord::operator::OperatorLink;
use crate::discord::Data;
use crate::infra::isolation::SqliteRoleStore;
use crate::infra::permissions::SqlitePermissionStore;
use anyhow::Context as _;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let config = BotConfig::from_env()?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    let pool = infra::database::connect(&config.database_path).await?;

    let permission_store = SqlitePermissionStore::new(pool.clone());
    permission_store
        .migrate()
        .await
        .context("Failed to migrate permission tables")?;

    let role_store = SqliteRoleStore::new(pool);
    role_store
        .migrate()
        .await
        .context("Failed to migrate saved role table")?;

    let permissions = Arc::new(PermissionService::new(permission_store));
    let cached_guilds = permissions
        .warm_cache()
        .await
        .context("Failed to load permission overrides")?;
    info!(guilds = cached_guilds, "Permission cache warmed");

    let isolation = Arc::new(IsolationService::new(role_store, Arc::clone(&permissions)));
    let modlog = Arc::new(ModLogService::new(Arc::clone(&permissions)));
    let notifier = Arc::new(OperatorNotifier::new(
        config.notify_attempts,
        config.notify_backoff,
    ));

    if config.operator_channel_id.is_none() {
        warn!("OPERATOR_CHANNEL_ID not set; faults will only be logged");
    }

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS // Rejoin detection
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::DIRECT_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT; // `refresh` and DM relay

    let operator_channel_id = config.operator_channel_id;
    let dev_guild_id = config.dev_guild_id;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: discord::commands::all(),
            on_error: |error| Box::pin(discord::supervisor::on_error(error)),
            event_handler: |ctx, event, framework, data| {
                Box::pin(discord::events::event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!(user = %ready.user.name, "Connected to Discord");

                discord::commands::register(ctx, &framework.options().commands, dev_guild_id)
                    .await?;
                info!(
                    count = framework.options().commands.len(),
                    dev_guild_id, "Commands registered"
                );

                let operator = operator_channel_id.map(|channel_id| {
                    Arc::new(OperatorLink::new(ctx.http.clone(), channel_id, notifier))
                });

                if let Some(operator) = &operator {
                    let notice = format!(
                        "Bot has started ({})",
                        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
                    );
                    if let Err(e) = operator.send(&notice).await {
                        error!("Failed to announce startup: {}", e);
                    }
                }

                Ok(Data {
                    permissions,
                    isolation,
                    modlog,
                    operator,
                    dev_guild_id,
                })
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&config.token, intents)
        .framework(framework)
        .await
        .context("Error creating client")?;

    // Stop the shards cleanly on Ctrl+C. Saved role sets are already durable.
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
            shard_manager.shutdown_all().await;
        }
    });

    client.start().await.context("Error running bot")?;
    Ok(())
}
