//! # Bot Module
//!
//! Discord-facing side of the queue bot.
//!
//! - [`commands`] registers the slash commands
//! - [`handlers`] turns interactions into [`service::MusicCommand`]s and
//!   renders the replies
//! - [`service`] runs each command against the guild's player
//! - [`voice`] joins and leaves voice channels through songbird
//! - [`notifier`] posts queue announcements to text channels
//!
//! ## Example
//!
//! ```rust,no_run
//! let notifier = Arc::new(SerenityNotifier::new(Arc::new(Http::new(&config.discord_token))));
//! let registry = Arc::new(GuildRegistry::new(config.player_settings(), notifier));
//! let service = MusicService::new(registry, resolver, attachments, voice);
//! let bot = QueueBot::new(config, Arc::new(service));
//! ```

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;
pub mod notifier;
pub mod service;
pub mod voice;

use crate::config::Config;
use service::MusicService;

/// Serenity event handler for the queue bot.
pub struct QueueBot {
    config: Arc<Config>,
    pub service: Arc<MusicService>,
}

impl QueueBot {
    pub fn new(config: Config, service: Arc<MusicService>) -> Self {
        Self {
            config: Arc::new(config),
            service,
        }
    }

    /// Registers slash commands, per guild when a development guild is
    /// configured (instant) and globally otherwise.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registering slash commands...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ Bot is not a member of guild {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id)
                    .await
                    .map_err(|e| {
                        error!("❌ Error registering guild commands: {:?}", e);
                        anyhow::anyhow!(
                            "Could not register guild commands. Check the bot has the 'applications.commands' scope."
                        )
                    })?;
                info!("✅ Guild commands registered for {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registering global commands: {:?}", e);
                    anyhow::anyhow!(
                        "Could not register global commands. Check the bot has the 'applications.commands' scope."
                    )
                })?;
                info!("✅ Global commands registered");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for QueueBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} servers", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error registering commands: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("Error handling command: {:?}", e);
            }
        }
    }

    /// Drops the guild's queue when the bot is disconnected from voice by
    /// someone else.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        if let Some(guild_id) = new.guild_id {
            info!("🔌 Bot disconnected from voice in guild {}", guild_id);
            self.service.on_voice_disconnected(guild_id).await;
        }
    }
}
