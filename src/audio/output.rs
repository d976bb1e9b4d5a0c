use async_trait::async_trait;
use serenity::model::id::GuildId;
use tokio::sync::mpsc;
use tracing::debug;

use super::player::GuildCommand;
use crate::{error::BotError, sources::Track};

/// How a started track ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Natural end of stream or a forced stop; the two are indistinguishable.
    Finished,
    /// The transport failed while playing.
    Failed(String),
}

/// One-shot notification that a started track is over.
///
/// Bound to a single start of a single guild. Consumed on use, so a track can
/// complete at most once. It may be fired from any thread; it only posts into
/// the guild's mailbox.
#[derive(Debug)]
pub struct CompletionSignal {
    guild_id: GuildId,
    generation: u64,
    mailbox: mpsc::UnboundedSender<GuildCommand>,
}

impl CompletionSignal {
    pub(crate) fn new(
        guild_id: GuildId,
        generation: u64,
        mailbox: mpsc::UnboundedSender<GuildCommand>,
    ) -> Self {
        Self {
            guild_id,
            generation,
            mailbox,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn complete(self, outcome: PlaybackOutcome) {
        let message = GuildCommand::Completed {
            generation: self.generation,
            outcome,
        };
        if self.mailbox.send(message).is_err() {
            debug!(
                "Completion for guild {} dropped, player is gone",
                self.guild_id
            );
        }
    }
}

/// The audio output bound to one guild's voice connection.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Starts `track`, replacing whatever was playing. `completion` must be
    /// fired exactly once when the track ends for any reason, including
    /// [`AudioOutput::stop`].
    async fn play(
        &self,
        track: &Track,
        volume: f32,
        completion: CompletionSignal,
    ) -> Result<(), BotError>;

    /// Halts the current track. The transport reports it through the
    /// track's completion signal.
    async fn stop(&self);

    async fn pause(&self);

    async fn resume(&self);

    /// `volume` is a linear factor in `0.0..=1.0`.
    async fn set_volume(&self, volume: f32);
}
