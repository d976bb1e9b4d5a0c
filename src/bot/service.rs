use futures::future::join_all;
use serenity::model::id::{ChannelId, GuildId};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use super::voice::VoiceGateway;
use crate::{
    audio::{
        player::{Enqueued, GuildPlayer},
        queue::PlaybackState,
        registry::GuildRegistry,
    },
    error::BotError,
    sources::{AttachmentFetcher, Track, TrackResolver},
};

/// Pending entries shown by the `queue` command.
pub const QUEUE_LISTING_LIMIT: usize = 10;

/// A parsed user command, independent of how it arrived.
#[derive(Debug, Clone, PartialEq)]
pub enum MusicCommand {
    Join,
    Leave,
    Play(String),
    File(Option<AttachmentRef>),
    Skip,
    Queue,
    Clear,
    Pause,
    Resume,
    Stop,
    Volume(i64),
    Help,
}

impl MusicCommand {
    /// Commands that may take longer than an interaction's response window.
    pub fn is_slow(&self) -> bool {
        matches!(
            self,
            MusicCommand::Join | MusicCommand::Play(_) | MusicCommand::File(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentRef {
    pub filename: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoiceChannelRef {
    pub id: ChannelId,
    pub name: String,
}

/// Who invoked a command and from where.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub guild_id: GuildId,
    /// Text channel the command was sent from.
    pub text_channel: ChannelId,
    /// The caller's current voice channel, if any.
    pub caller_channel: Option<VoiceChannelRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    Embed(EmbedReply),
}

/// What an embed reply shows; decides its styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedKind {
    Queue,
    Help,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbedReply {
    pub kind: EmbedKind,
    pub title: String,
    pub description: Option<String>,
    pub fields: Vec<(String, String)>,
}

impl Reply {
    fn text(message: impl Into<String>) -> Self {
        Reply::Text(message.into())
    }
}

/// Executes music commands against the guild registry.
///
/// Every command maps to one controller operation and produces exactly one
/// reply; errors never escape, they become the reply.
pub struct MusicService {
    registry: Arc<GuildRegistry>,
    resolver: TrackResolver,
    attachments: AttachmentFetcher,
    voice: Arc<dyn VoiceGateway>,
}

impl MusicService {
    pub fn new(
        registry: Arc<GuildRegistry>,
        resolver: TrackResolver,
        attachments: AttachmentFetcher,
        voice: Arc<dyn VoiceGateway>,
    ) -> Self {
        Self {
            registry,
            resolver,
            attachments,
            voice,
        }
    }

    pub async fn execute(&self, invocation: &Invocation, command: MusicCommand) -> Reply {
        match self.dispatch(invocation, command).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Command failed in guild {}: {}", invocation.guild_id, e);
                Reply::Text(e.to_string())
            }
        }
    }

    /// The bot was disconnected from voice by someone else.
    pub async fn on_voice_disconnected(&self, guild_id: GuildId) {
        if let Some(player) = self.registry.get(guild_id) {
            match player.detach_output().await {
                Ok(true) => info!("🔌 Voice connection lost in guild {}, queue cleared", guild_id),
                Ok(false) => {}
                Err(e) => warn!("Could not detach output in guild {}: {}", guild_id, e),
            }
        }
    }

    /// Clears every guild and leaves its voice channel. Used on shutdown.
    pub async fn disconnect_all(&self) {
        let guilds = self.registry.guild_ids();
        info!("👋 Leaving voice in {} guilds", guilds.len());

        join_all(guilds.into_iter().map(|guild_id| async move {
            if let Some(player) = self.registry.get(guild_id) {
                if matches!(player.detach_output().await, Ok(true)) {
                    if let Err(e) = self.voice.leave(guild_id).await {
                        warn!("Could not leave voice in guild {}: {}", guild_id, e);
                    }
                }
            }
        }))
        .await;
    }

    async fn dispatch(
        &self,
        invocation: &Invocation,
        command: MusicCommand,
    ) -> Result<Reply, BotError> {
        let guild_id = invocation.guild_id;

        match command {
            MusicCommand::Join => {
                let channel = invocation.caller_channel.as_ref().ok_or_else(|| {
                    BotError::connection("You need to be in a voice channel first!")
                })?;
                let player = self.registry.get_or_create(guild_id);
                self.connect(&player, channel).await?;
                Ok(Reply::text(format!("Joined {}!", channel.name)))
            }
            MusicCommand::Leave => {
                let Some(player) = self.connected_player(guild_id).await? else {
                    return Ok(Reply::text("Not connected to a voice channel!"));
                };
                player.detach_output().await?;
                self.voice.leave(guild_id).await?;
                Ok(Reply::text("Disconnected from voice channel!"))
            }
            MusicCommand::Play(query) => {
                let player = self.ensure_connected(invocation).await?;
                let track = self.resolver.resolve(&query).await?;
                self.enqueue(invocation, &player, track).await
            }
            MusicCommand::File(attachment) => {
                let Some(attachment) = attachment else {
                    return Ok(Reply::text("Please attach an audio file!"));
                };
                let player = self.ensure_connected(invocation).await?;
                let track = self
                    .attachments
                    .fetch(&attachment.filename, &attachment.url)
                    .await?;
                self.enqueue(invocation, &player, track).await
            }
            MusicCommand::Skip => {
                let skipped = match self.registry.get(guild_id) {
                    Some(player) => player.skip().await?,
                    None => None,
                };
                Ok(match skipped {
                    Some(_) => Reply::text("Skipped current song!"),
                    None => Reply::text("Nothing is currently playing!"),
                })
            }
            MusicCommand::Queue => self.queue_listing(guild_id).await,
            MusicCommand::Clear => {
                if let Some(player) = self.registry.get(guild_id) {
                    player.clear().await?;
                }
                Ok(Reply::text("Queue cleared!"))
            }
            MusicCommand::Pause => {
                let paused = match self.registry.get(guild_id) {
                    Some(player) => player.pause().await?,
                    None => false,
                };
                Ok(if paused {
                    Reply::text("Paused!")
                } else {
                    Reply::text("Nothing is currently playing!")
                })
            }
            MusicCommand::Resume => {
                let resumed = match self.registry.get(guild_id) {
                    Some(player) => player.resume().await?,
                    None => false,
                };
                Ok(if resumed {
                    Reply::text("Resumed!")
                } else {
                    Reply::text("Nothing is paused!")
                })
            }
            MusicCommand::Stop => {
                let stopped = match self.registry.get(guild_id) {
                    Some(player) => player.stop().await?,
                    None => false,
                };
                Ok(if stopped {
                    Reply::text("Stopped playing and cleared queue!")
                } else {
                    Reply::text("Nothing is currently playing!")
                })
            }
            MusicCommand::Volume(percent) => {
                let Some(player) = self.registry.get(guild_id) else {
                    return Err(BotError::connection("Not connected to a voice channel!"));
                };
                player.set_volume(percent).await?;
                Ok(Reply::text(format!("Volume set to {percent}%")))
            }
            MusicCommand::Help => Ok(help()),
        }
    }

    async fn connected_player(&self, guild_id: GuildId) -> Result<Option<GuildPlayer>, BotError> {
        match self.registry.get(guild_id) {
            Some(player) if player.is_connected().await? => Ok(Some(player)),
            _ => Ok(None),
        }
    }

    /// Joins the caller's channel unless the guild already has an output.
    /// A single attempt; there is no retry.
    async fn ensure_connected(&self, invocation: &Invocation) -> Result<GuildPlayer, BotError> {
        let player = self.registry.get_or_create(invocation.guild_id);
        if player.is_connected().await? {
            return Ok(player);
        }

        let channel = invocation
            .caller_channel
            .as_ref()
            .ok_or_else(|| BotError::connection("You need to be in a voice channel!"))?;
        self.connect(&player, channel).await?;
        Ok(player)
    }

    async fn connect(&self, player: &GuildPlayer, channel: &VoiceChannelRef) -> Result<(), BotError> {
        let output = self.voice.join(player.guild_id(), channel.id).await?;
        // Moving channels keeps the same call, so an existing output stays valid
        if !player.is_connected().await? {
            player.attach_output(output).await?;
        }
        Ok(())
    }

    /// Later tracks are announced where the latest `play` or `file` came from.
    async fn enqueue(
        &self,
        invocation: &Invocation,
        player: &GuildPlayer,
        track: Track,
    ) -> Result<Reply, BotError> {
        player.announce_to(invocation.text_channel).await?;

        let title = track.title().to_string();
        let reply = match player.enqueue(track).await? {
            Enqueued::Started(current) => {
                format!("Added to queue: **{title}**\nNow playing: **{}**", current.title())
            }
            Enqueued::Queued(position) => {
                debug!(
                    "Queued '{}' at position {} in guild {}",
                    title, position, invocation.guild_id
                );
                format!("Added to queue: **{title}**")
            }
        };
        Ok(Reply::Text(reply))
    }

    async fn queue_listing(&self, guild_id: GuildId) -> Result<Reply, BotError> {
        let Some(player) = self.registry.get(guild_id) else {
            return Ok(Reply::text("Queue is empty!"));
        };
        let snapshot = player.snapshot(QUEUE_LISTING_LIMIT).await?;
        if snapshot.current.is_none() && snapshot.pending_total == 0 {
            return Ok(Reply::text("Queue is empty!"));
        }

        let description = snapshot
            .upcoming_titles()
            .iter()
            .enumerate()
            .map(|(i, title)| format!("{}. {}", i + 1, title))
            .collect::<Vec<_>>()
            .join("\n");

        let mut fields = Vec::new();
        if let Some(current) = &snapshot.current {
            fields.push(("Now Playing".to_string(), now_playing(current, snapshot.state)));
        }

        Ok(Reply::Embed(EmbedReply {
            kind: EmbedKind::Queue,
            title: "Music Queue".to_string(),
            description: (!description.is_empty()).then_some(description),
            fields,
        }))
    }
}

/// Linked title plus length, e.g. `[Song](https://...) (3m 25s) (paused)`.
fn now_playing(track: &Track, state: PlaybackState) -> String {
    let mut line = match track.page_url() {
        Some(url) => format!("[{}]({})", track.title(), url),
        None => track.title().to_string(),
    };
    if let Some(duration) = track.duration() {
        let whole_seconds = Duration::from_secs(duration.as_secs());
        line.push_str(&format!(" ({})", humantime::format_duration(whole_seconds)));
    }
    if state == PlaybackState::Paused {
        line.push_str(" (paused)");
    }
    line
}

fn help() -> Reply {
    let fields = [
        ("/join", "Join voice channel"),
        ("/leave", "Leave voice channel"),
        ("/play <url/search>", "Play from YouTube/Facebook or search"),
        ("/file", "Play uploaded audio file"),
        ("/skip", "Skip current song"),
        ("/queue", "Show current queue"),
        ("/clear", "Clear queue"),
        ("/pause", "Pause current song"),
        ("/resume", "Resume paused song"),
        ("/stop", "Stop and clear queue"),
        ("/volume <0-100>", "Set volume"),
    ];

    Reply::Embed(EmbedReply {
        kind: EmbedKind::Help,
        title: "Music Bot Commands".to_string(),
        description: None,
        fields: fields
            .into_iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
    })
}
