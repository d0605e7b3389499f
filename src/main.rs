// This is the entry point of the counting bot.
//
// **Architecture Overview:**
// - `core/` = Counting rules and the service (platform-agnostic)
// - `infra/` = Store implementations and environment config
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

use crate::core::counting::{CountingService, CountingSettings, CountingStore};
use crate::discord::commands::presence;
use crate::discord::counting::submission_handler::handle_counting_message;
use crate::discord::{Data, Error};
use crate::infra::config::{BotConfig, StoreKind};
use crate::infra::counting::{InMemoryCountingStore, JsonCountingStore};
use anyhow::Context as _;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Event handler for non-command Discord events.
/// Every guild message goes through the counting game.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    if let serenity::FullEvent::Message { new_message } = event {
        handle_counting_message(ctx, new_message, data).await;
    }

    Ok(())
}

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

    let store: Box<dyn CountingStore> = match config.store {
        StoreKind::Json => {
            // Keep runtime data in a dedicated folder so the repo root stays tidy.
            std::fs::create_dir_all(&config.data_dir).with_context(|| {
                format!("Failed to create data directory {}", config.data_dir.display())
            })?;
            let path = config.counting_file();
            tracing::info!("Using JSON counting store at {}", path.display());
            Box::new(JsonCountingStore::open(&path).context("Failed to open counting store")?)
        }
        StoreKind::Memory => {
            tracing::warn!("Using in-memory counting store, counts will not survive a restart");
            Box::new(InMemoryCountingStore::new())
        }
    };

    let settings = CountingSettings {
        persist_timeout: config.persist_timeout,
    };
    let counting = Arc::new(
        CountingService::load(store, settings)
            .await
            .context("Failed to load counting data")?,
    );

    let data = Data {
        counting: Arc::clone(&counting),
    };

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required to read the numbers
        | serenity::GatewayIntents::GUILDS;

    let dev_guild_id = config.dev_guild_id;
    let retry_interval = config.retry_interval;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![discord::commands::counting::counting()],
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                tracing::info!("🤖 Bot is starting up...");

                match dev_guild_id {
                    // Guild commands update instantly, handy while developing.
                    Some(guild_id) => {
                        poise::builtins::register_in_guild(
                            ctx,
                            &framework.options().commands,
                            serenity::GuildId::new(guild_id),
                        )
                        .await?
                    }
                    None => {
                        poise::builtins::register_globally(ctx, &framework.options().commands)
                            .await?
                    }
                }

                tracing::info!("✅ Commands registered!");
                presence::on_ready(ctx);

                // Background retry for counting writes that failed or timed out.
                let counting = Arc::clone(&data.counting);
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(retry_interval);
                    loop {
                        ticker.tick().await;
                        if counting.pending_writes() == 0 {
                            continue;
                        }
                        let flushed = counting.flush_pending().await;
                        tracing::info!(
                            flushed,
                            remaining = counting.pending_writes(),
                            "Retried pending counting writes"
                        );
                    }
                });

                tracing::info!("🚀 Bot is ready!");
                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .await
        .context("Error creating client")?;

    client.start().await.context("Error running bot")?;
    Ok(())
}
