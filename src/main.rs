use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod ui;

use crate::audio::registry::GuildRegistry;
use crate::bot::{
    notifier::SerenityNotifier, service::MusicService, voice::SongbirdGateway, QueueBot,
};
use crate::config::Config;
use crate::sources::{AttachmentFetcher, TrackResolver, YtDlpExtractor};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("voice_queue_bot=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Starting Voice Queue Bot v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config).await;
    }

    info!("{}", config.summary());

    let extractor = YtDlpExtractor::new(config.ytdlp_path.clone());
    match extractor.verify().await {
        Ok(version) => info!("✅ yt-dlp {} available", version),
        Err(e) => error!("❌ {}; /play will fail until it is installed", e),
    }

    let http = reqwest::Client::new();
    let songbird = Songbird::serenity();

    let notifier = SerenityNotifier::new(Arc::new(Http::new(&config.discord_token)));
    let registry = Arc::new(GuildRegistry::new(
        config.player_settings(),
        Arc::new(notifier),
    ));
    let service = Arc::new(MusicService::new(
        registry,
        TrackResolver::new(Arc::new(extractor)),
        AttachmentFetcher::new(http.clone(), config.cache_dir.clone()),
        Arc::new(SongbirdGateway::new(songbird.clone(), http)),
    ));

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let handler = QueueBot::new(config.clone(), service.clone());
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    // Leave voice everywhere before the shards go down
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error registering Ctrl+C handler: {:?}", e);
            return;
        }
        info!("⚠️ Shutdown signal received, closing...");
        service.disconnect_all().await;
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}

async fn health_check(config: &Config) -> Result<()> {
    let yt_dlp = YtDlpExtractor::new(config.ytdlp_path.clone()).verify().await;

    let ffmpeg = async_process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await?;

    if yt_dlp.is_ok() && ffmpeg.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("Missing dependencies (yt-dlp, ffmpeg)");
    }
}
