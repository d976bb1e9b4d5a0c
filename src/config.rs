use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::audio::registry::PlayerSettings;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Development guild for fast command registration

    // Audio
    pub default_volume: f32,
    pub max_queue_size: usize,

    // Paths
    pub cache_dir: PathBuf,
    pub ytdlp_path: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")?.parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Audio
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()?,
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,

            // Paths
            cache_dir: std::env::var("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir().join("voice-queue-bot")),
            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),
        };

        std::fs::create_dir_all(&config.cache_dir)?;

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Volume must be between 0.0 and 1.0
    /// - Queue size must be greater than 0
    /// - The yt-dlp path must not be empty
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_volume) {
            anyhow::bail!(
                "Default volume must be between 0.0 and 1.0, got: {}",
                self.default_volume
            );
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.ytdlp_path.trim().is_empty() {
            anyhow::bail!("YTDLP_PATH must not be empty");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The Discord token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Audio: {}% default vol, {} max queue\n  \
            Paths: cache={}, yt-dlp={}",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            (self.default_volume * 100.0).round() as u32,
            self.max_queue_size,
            self.cache_dir.display(),
            self.ytdlp_path,
        )
    }

    pub fn player_settings(&self) -> PlayerSettings {
        PlayerSettings {
            default_volume: self.default_volume,
            max_queue_size: self.max_queue_size,
        }
    }
}

/// Fallback values used when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            default_volume: 0.5,
            max_queue_size: 1000,

            cache_dir: std::env::temp_dir().join("voice-queue-bot"),
            ytdlp_path: "yt-dlp".to_string(),
        }
    }
}
