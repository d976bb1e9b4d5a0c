use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        notifier::ChatNotifier,
        output::{AudioOutput, CompletionSignal, PlaybackOutcome},
        queue::{GuildQueueState, PlaybackState, QueueSnapshot},
        registry::PlayerSettings,
    },
    error::BotError,
    sources::{SourceKind, Track},
};

/// Result of adding a track to a guild's queue.
#[derive(Debug, Clone)]
pub enum Enqueued {
    /// The queue was idle and playback started; carries the track now playing.
    Started(Track),
    /// Waiting at this 1-based position in the pending list.
    Queued(usize),
}

/// Messages processed by a guild's controller task, one at a time.
pub(crate) enum GuildCommand {
    Enqueue {
        track: Track,
        reply: oneshot::Sender<Result<Enqueued, BotError>>,
    },
    Skip {
        reply: oneshot::Sender<Option<Track>>,
    },
    Pause {
        reply: oneshot::Sender<bool>,
    },
    Resume {
        reply: oneshot::Sender<bool>,
    },
    Clear {
        reply: oneshot::Sender<()>,
    },
    Stop {
        reply: oneshot::Sender<bool>,
    },
    SetVolume {
        percent: i64,
        reply: oneshot::Sender<Result<f32, BotError>>,
    },
    AttachOutput {
        output: Arc<dyn AudioOutput>,
        reply: oneshot::Sender<()>,
    },
    DetachOutput {
        reply: oneshot::Sender<bool>,
    },
    IsConnected {
        reply: oneshot::Sender<bool>,
    },
    AnnounceTo {
        channel_id: ChannelId,
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        limit: usize,
        reply: oneshot::Sender<QueueSnapshot>,
    },
    /// Posted by the output transport through a [`CompletionSignal`].
    Completed {
        generation: u64,
        outcome: PlaybackOutcome,
    },
}

/// Handle to a guild's playback controller.
///
/// Every operation is a message to the guild's own task, so operations and
/// completion signals for one guild never run concurrently, while different
/// guilds progress independently.
#[derive(Clone)]
pub struct GuildPlayer {
    guild_id: GuildId,
    mailbox: mpsc::UnboundedSender<GuildCommand>,
}

impl GuildPlayer {
    /// Spawns the controller task for `guild_id` on the current runtime.
    pub fn spawn(
        guild_id: GuildId,
        settings: PlayerSettings,
        notifier: Arc<dyn ChatNotifier>,
    ) -> Self {
        let (mailbox, inbox) = mpsc::unbounded_channel();
        let controller =
            PlaybackController::new(guild_id, settings, notifier, mailbox.downgrade());
        tokio::spawn(controller.run(inbox));

        Self { guild_id, mailbox }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Appends a track; starts playback if the guild was idle.
    pub async fn enqueue(&self, track: Track) -> Result<Enqueued, BotError> {
        self.request(|reply| GuildCommand::Enqueue { track, reply })
            .await?
    }

    /// Stops the current track so the queue advances. Returns the skipped
    /// track, or `None` when nothing was playing.
    pub async fn skip(&self) -> Result<Option<Track>, BotError> {
        self.request(|reply| GuildCommand::Skip { reply }).await
    }

    /// Returns `false` when nothing was playing.
    pub async fn pause(&self) -> Result<bool, BotError> {
        self.request(|reply| GuildCommand::Pause { reply }).await
    }

    /// Returns `false` when nothing was paused.
    pub async fn resume(&self) -> Result<bool, BotError> {
        self.request(|reply| GuildCommand::Resume { reply }).await
    }

    /// Empties the queue and halts any active track. Valid in any state.
    pub async fn clear(&self) -> Result<(), BotError> {
        self.request(|reply| GuildCommand::Clear { reply }).await
    }

    /// Like [`GuildPlayer::clear`], but returns `false` when there is no
    /// output to stop.
    pub async fn stop(&self) -> Result<bool, BotError> {
        self.request(|reply| GuildCommand::Stop { reply }).await
    }

    /// Sets the volume in percent (`0..=100`) and returns the applied factor.
    pub async fn set_volume(&self, percent: i64) -> Result<f32, BotError> {
        self.request(|reply| GuildCommand::SetVolume { percent, reply })
            .await?
    }

    pub async fn attach_output(&self, output: Arc<dyn AudioOutput>) -> Result<(), BotError> {
        self.request(|reply| GuildCommand::AttachOutput { output, reply })
            .await
    }

    /// Unbinds the output and clears the queue. Returns whether an output
    /// was bound.
    pub async fn detach_output(&self) -> Result<bool, BotError> {
        self.request(|reply| GuildCommand::DetachOutput { reply }).await
    }

    pub async fn is_connected(&self) -> Result<bool, BotError> {
        self.request(|reply| GuildCommand::IsConnected { reply }).await
    }

    /// Text channel that receives "Now playing" messages when the queue
    /// advances on its own. The latest caller wins.
    pub async fn announce_to(&self, channel_id: ChannelId) -> Result<(), BotError> {
        self.request(|reply| GuildCommand::AnnounceTo { channel_id, reply })
            .await
    }

    /// Current state, current track and the first `limit` pending tracks.
    pub async fn snapshot(&self, limit: usize) -> Result<QueueSnapshot, BotError> {
        self.request(|reply| GuildCommand::Snapshot { limit, reply })
            .await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> GuildCommand,
    ) -> Result<T, BotError> {
        let (reply, response) = oneshot::channel();
        self.mailbox
            .send(build(reply))
            .map_err(|_| BotError::Unavailable)?;
        response.await.map_err(|_| BotError::Unavailable)
    }
}

/// The per-guild state machine. Owned by exactly one task.
struct PlaybackController {
    guild_id: GuildId,
    queue: GuildQueueState,
    state: PlaybackState,
    output: Option<Arc<dyn AudioOutput>>,
    volume: f32,
    /// Identifies the latest started track; completions carrying an older
    /// value belong to a track that was already cleared away.
    generation: u64,
    /// Generation already asked to stop by a skip whose completion has not
    /// arrived yet.
    skip_pending: Option<u64>,
    notifier: Arc<dyn ChatNotifier>,
    announce_channel: Option<ChannelId>,
    mailbox: mpsc::WeakUnboundedSender<GuildCommand>,
}

impl PlaybackController {
    fn new(
        guild_id: GuildId,
        settings: PlayerSettings,
        notifier: Arc<dyn ChatNotifier>,
        mailbox: mpsc::WeakUnboundedSender<GuildCommand>,
    ) -> Self {
        Self {
            guild_id,
            queue: GuildQueueState::new(settings.max_queue_size),
            state: PlaybackState::Idle,
            output: None,
            volume: settings.default_volume,
            generation: 0,
            skip_pending: None,
            notifier,
            announce_channel: None,
            mailbox,
        }
    }

    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<GuildCommand>) {
        debug!("Player task started for guild {}", self.guild_id);

        while let Some(command) = inbox.recv().await {
            self.handle(command).await;
        }

        debug!("Player task stopped for guild {}", self.guild_id);
    }

    async fn handle(&mut self, command: GuildCommand) {
        match command {
            GuildCommand::Enqueue { track, reply } => {
                let _ = reply.send(self.enqueue(track).await);
            }
            GuildCommand::Skip { reply } => {
                let _ = reply.send(self.skip().await);
            }
            GuildCommand::Pause { reply } => {
                let _ = reply.send(self.pause().await);
            }
            GuildCommand::Resume { reply } => {
                let _ = reply.send(self.resume().await);
            }
            GuildCommand::Clear { reply } => {
                self.clear().await;
                let _ = reply.send(());
            }
            GuildCommand::Stop { reply } => {
                let _ = reply.send(self.stop().await);
            }
            GuildCommand::SetVolume { percent, reply } => {
                let _ = reply.send(self.set_volume(percent).await);
            }
            GuildCommand::AttachOutput { output, reply } => {
                self.attach_output(output).await;
                let _ = reply.send(());
            }
            GuildCommand::DetachOutput { reply } => {
                let _ = reply.send(self.detach_output().await);
            }
            GuildCommand::IsConnected { reply } => {
                let _ = reply.send(self.output.is_some());
            }
            GuildCommand::AnnounceTo { channel_id, reply } => {
                self.announce_channel = Some(channel_id);
                let _ = reply.send(());
            }
            GuildCommand::Snapshot { limit, reply } => {
                let _ = reply.send(self.queue.snapshot(self.state, limit));
            }
            GuildCommand::Completed {
                generation,
                outcome,
            } => {
                self.on_completion(generation, outcome).await;
            }
        }
    }

    async fn enqueue(&mut self, track: Track) -> Result<Enqueued, BotError> {
        let position = self.queue.push(track)?;

        if self.state != PlaybackState::Idle || self.output.is_none() {
            return Ok(Enqueued::Queued(position));
        }

        // The command reply already tells the caller what started
        self.advance(false).await?;
        match self.queue.current() {
            Some(current) if self.state == PlaybackState::Playing => {
                Ok(Enqueued::Started(current.clone()))
            }
            _ => Ok(Enqueued::Queued(self.queue.pending_len())),
        }
    }

    /// Promotes the next pending track and starts it. A track the output
    /// refuses to start is dropped and the next one is tried, so a bad entry
    /// never stalls the queue. Returns the last start failure if the queue
    /// ran dry because of failures. With `announce`, the started track is
    /// posted to the announcement channel.
    async fn advance(&mut self, announce: bool) -> Result<(), BotError> {
        let mut last_failure = None;

        loop {
            let Some(output) = self.output.clone() else {
                // Without an output the head stays pending until one is attached
                self.state = PlaybackState::Idle;
                return Ok(());
            };

            let Some(track) = self.queue.promote_next() else {
                self.state = PlaybackState::Idle;
                info!("📭 Queue finished for guild {}", self.guild_id);
                return last_failure.map_or(Ok(()), Err);
            };

            self.generation += 1;
            let Some(mailbox) = self.mailbox.upgrade() else {
                self.queue.finish_current();
                self.state = PlaybackState::Idle;
                return Ok(());
            };
            let completion = CompletionSignal::new(self.guild_id, self.generation, mailbox);

            match output.play(&track, self.volume, completion).await {
                Ok(()) => {
                    info!("🎵 Now playing in guild {}: {}", self.guild_id, track.title());
                    self.state = PlaybackState::Playing;
                    if announce {
                        self.announce(&track);
                    }
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "❌ Could not start '{}' in guild {}: {}",
                        track.title(),
                        self.guild_id,
                        e
                    );
                    self.queue.finish_current();
                    last_failure = Some(e);
                }
            }
        }
    }

    /// Runs once per started track, whatever ended it.
    async fn on_completion(&mut self, generation: u64, outcome: PlaybackOutcome) {
        if generation != self.generation || self.queue.current().is_none() {
            debug!(
                "Ignoring stale completion {} in guild {} (current {})",
                generation, self.guild_id, self.generation
            );
            return;
        }

        match &outcome {
            PlaybackOutcome::Finished => debug!("Track finished in guild {}", self.guild_id),
            PlaybackOutcome::Failed(reason) => {
                error!("❌ Player error in guild {}: {}", self.guild_id, reason)
            }
        }

        self.queue.finish_current();
        self.state = PlaybackState::Idle;
        self.skip_pending = None;

        if let Err(e) = self.advance(true).await {
            error!("Error starting next track in guild {}: {}", self.guild_id, e);
        }
    }

    fn announce(&self, track: &Track) {
        let Some(channel_id) = self.announce_channel else {
            return;
        };
        let text = match track.kind() {
            SourceKind::UploadedFile => format!("Now playing uploaded file: **{}**", track.title()),
            SourceKind::Resolved => format!("Now playing: **{}**", track.title()),
        };
        self.notifier.send_text(channel_id, text);
    }

    async fn skip(&mut self) -> Option<Track> {
        if self.state == PlaybackState::Idle {
            return None;
        }
        // At most one stop per started track
        if self.skip_pending == Some(self.generation) {
            return None;
        }

        let skipped = self.queue.current().cloned();
        self.skip_pending = Some(self.generation);
        if let Some(output) = &self.output {
            // The transport answers with the track's completion, which advances
            output.stop().await;
        }
        info!("⏭️ Skip requested in guild {}", self.guild_id);
        skipped
    }

    async fn pause(&mut self) -> bool {
        if self.state != PlaybackState::Playing {
            return false;
        }
        if let Some(output) = &self.output {
            output.pause().await;
        }
        self.state = PlaybackState::Paused;
        info!("⏸️ Playback paused in guild {}", self.guild_id);
        true
    }

    async fn resume(&mut self) -> bool {
        if self.state != PlaybackState::Paused {
            return false;
        }
        if let Some(output) = &self.output {
            output.resume().await;
        }
        self.state = PlaybackState::Playing;
        info!("▶️ Playback resumed in guild {}", self.guild_id);
        true
    }

    async fn clear(&mut self) {
        let was_active = self.state != PlaybackState::Idle;

        // Outstanding completions now refer to a cleared track
        self.generation += 1;
        self.queue.clear();
        self.state = PlaybackState::Idle;

        if was_active {
            if let Some(output) = &self.output {
                output.stop().await;
            }
        }
    }

    async fn stop(&mut self) -> bool {
        if self.output.is_none() {
            return false;
        }
        self.clear().await;
        info!("⏹️ Playback stopped in guild {}", self.guild_id);
        true
    }

    async fn set_volume(&mut self, percent: i64) -> Result<f32, BotError> {
        let Some(output) = &self.output else {
            return Err(BotError::connection("Not connected to a voice channel!"));
        };
        if !(0..=100).contains(&percent) {
            return Err(BotError::validation("Volume must be between 0 and 100!"));
        }

        let volume = percent as f32 / 100.0;
        output.set_volume(volume).await;
        self.volume = volume;
        info!("🔊 Volume set to {}% in guild {}", percent, self.guild_id);
        Ok(volume)
    }

    async fn attach_output(&mut self, output: Arc<dyn AudioOutput>) {
        self.output = Some(output);
        info!("🔊 Output attached in guild {}", self.guild_id);

        if self.state == PlaybackState::Idle && self.queue.pending_len() > 0 {
            if let Err(e) = self.advance(true).await {
                error!("Error starting queued track in guild {}: {}", self.guild_id, e);
            }
        }
    }

    async fn detach_output(&mut self) -> bool {
        if self.output.is_none() {
            return false;
        }
        self.clear().await;
        self.output = None;
        info!("👋 Output detached in guild {}", self.guild_id);
        true
    }
}
