use async_trait::async_trait;
use parking_lot::Mutex;
use songbird::{
    input::{File, HttpRequest, Input},
    tracks::TrackHandle,
    Call, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent,
};
use std::sync::Arc;
use tracing::{debug, warn};

use super::output::{AudioOutput, CompletionSignal, PlaybackOutcome};
use crate::{
    error::BotError,
    sources::{StreamLocator, Track},
};

/// Plays tracks on a guild's songbird call.
pub struct SongbirdOutput {
    call: Arc<tokio::sync::Mutex<Call>>,
    http: reqwest::Client,
    current: Mutex<Option<TrackHandle>>,
}

impl SongbirdOutput {
    pub fn new(call: Arc<tokio::sync::Mutex<Call>>, http: reqwest::Client) -> Self {
        Self {
            call,
            http,
            current: Mutex::new(None),
        }
    }

    fn input_for(&self, track: &Track) -> Input {
        match track.locator() {
            StreamLocator::Remote(url) => HttpRequest::new(self.http.clone(), url.clone()).into(),
            StreamLocator::Local(path) => {
                let path: &std::path::Path = path;
                File::new(path.to_path_buf()).into()
            }
        }
    }

    fn current(&self) -> Option<TrackHandle> {
        self.current.lock().clone()
    }
}

#[async_trait]
impl AudioOutput for SongbirdOutput {
    async fn play(
        &self,
        track: &Track,
        volume: f32,
        completion: CompletionSignal,
    ) -> Result<(), BotError> {
        let input = self.input_for(track);

        let handle = {
            let mut call = self.call.lock().await;
            call.play_only_input(input)
        };
        if let Err(e) = handle.set_volume(volume) {
            debug!("Could not set initial volume: {}", e);
        }

        // End and Error share the signal; whichever fires first consumes it
        let watcher = TrackEndWatcher {
            completion: Arc::new(Mutex::new(Some(completion))),
            _track: track.clone(),
        };
        handle
            .add_event(Event::Track(TrackEvent::Error), watcher.clone())
            .and_then(|_| handle.add_event(Event::Track(TrackEvent::End), watcher))
            .map_err(|e| {
                let _ = handle.stop();
                BotError::playback(format!("could not watch track: {e}"))
            })?;

        *self.current.lock() = Some(handle);
        Ok(())
    }

    async fn stop(&self) {
        if let Some(handle) = self.current.lock().take() {
            if let Err(e) = handle.stop() {
                debug!("Track already gone on stop: {}", e);
            }
        }
    }

    async fn pause(&self) {
        if let Some(handle) = self.current() {
            if let Err(e) = handle.pause() {
                warn!("Could not pause track: {}", e);
            }
        }
    }

    async fn resume(&self) {
        if let Some(handle) = self.current() {
            if let Err(e) = handle.play() {
                warn!("Could not resume track: {}", e);
            }
        }
    }

    async fn set_volume(&self, volume: f32) {
        if let Some(handle) = self.current() {
            if let Err(e) = handle.set_volume(volume) {
                warn!("Could not change volume: {}", e);
            }
        }
    }
}

/// Turns songbird's end/error events into the track's completion signal.
///
/// Holds a clone of the track so an uploaded file outlives its playback.
#[derive(Clone)]
struct TrackEndWatcher {
    completion: Arc<Mutex<Option<CompletionSignal>>>,
    _track: Track,
}

#[async_trait]
impl VoiceEventHandler for TrackEndWatcher {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let outcome = match ctx {
            EventContext::Track(states) => states
                .iter()
                .find_map(|(state, _)| match &state.playing {
                    songbird::tracks::PlayMode::Errored(e) => {
                        Some(PlaybackOutcome::Failed(format!("{e:?}")))
                    }
                    _ => None,
                })
                .unwrap_or(PlaybackOutcome::Finished),
            _ => PlaybackOutcome::Finished,
        };

        if let Some(completion) = self.completion.lock().take() {
            debug!("Track over in guild {}: {:?}", completion.guild_id(), outcome);
            completion.complete(outcome);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{player::GuildCommand, testing::track};
    use serenity::model::id::GuildId;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_end_and_error_complete_once() {
        let (mailbox, mut inbox) = mpsc::unbounded_channel();
        let completion = CompletionSignal::new(GuildId::new(1), 7, mailbox);
        let watcher = TrackEndWatcher {
            completion: Arc::new(Mutex::new(Some(completion))),
            _track: track("A"),
        };
        let error_watcher = watcher.clone();

        // Both registrations fire for the same track
        assert!(error_watcher.act(&EventContext::Track(&[])).await.is_none());
        assert!(watcher.act(&EventContext::Track(&[])).await.is_none());

        assert!(matches!(
            inbox.try_recv(),
            Ok(GuildCommand::Completed {
                generation: 7,
                outcome: PlaybackOutcome::Finished,
            })
        ));
        assert!(inbox.try_recv().is_err());
    }
}
