use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::Songbird;
use std::sync::Arc;
use tracing::{error, info};

use crate::{
    audio::{output::AudioOutput, songbird_output::SongbirdOutput},
    error::BotError,
};

/// Joins and leaves voice channels.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// Connects (or moves) to `channel_id` and returns the output for that call.
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn AudioOutput>, BotError>;

    async fn leave(&self, guild_id: GuildId) -> Result<(), BotError>;
}

/// Voice connections through songbird.
pub struct SongbirdGateway {
    manager: Arc<Songbird>,
    http: reqwest::Client,
}

impl SongbirdGateway {
    pub fn new(manager: Arc<Songbird>, http: reqwest::Client) -> Self {
        Self { manager, http }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn AudioOutput>, BotError> {
        let call = self.manager.join(guild_id, channel_id).await.map_err(|e| {
            error!("Error joining voice in guild {}: {:?}", guild_id, e);
            BotError::connection("Could not connect to the voice channel!")
        })?;

        info!("🔊 Connected to voice channel {} in guild {}", channel_id, guild_id);
        Ok(Arc::new(SongbirdOutput::new(call, self.http.clone())))
    }

    async fn leave(&self, guild_id: GuildId) -> Result<(), BotError> {
        self.manager.remove(guild_id).await.map_err(|e| {
            error!("Error leaving voice in guild {}: {:?}", guild_id, e);
            BotError::connection("Not connected to a voice channel!")
        })?;

        info!("👋 Disconnected from voice in guild {}", guild_id);
        Ok(())
    }
}
