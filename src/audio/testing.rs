//! In-memory output transport and notifier for controller and command tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::ChannelId;
use std::{collections::HashSet, sync::Arc};

use super::{
    notifier::ChatNotifier,
    output::{AudioOutput, CompletionSignal, PlaybackOutcome},
};
use crate::{error::BotError, sources::Track};

pub fn track(title: &str) -> Track {
    Track::resolved(title, format!("https://cdn.example/{}", title.replace(' ', "-")))
}

/// Track backed by a real temporary file, like a stored upload.
pub fn uploaded_track(filename: &str) -> Track {
    let path = tempfile::NamedTempFile::new().unwrap().into_temp_path();
    Track::uploaded(filename, path)
}

/// Keeps every message instead of sending it.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(ChannelId, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<(ChannelId, String)> {
        self.sent.lock().clone()
    }
}

impl ChatNotifier for RecordingNotifier {
    fn send_text(&self, channel_id: ChannelId, text: String) {
        self.sent.lock().push((channel_id, text));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    Play { title: String, volume: f32 },
    Stop,
    Pause,
    Resume,
    Volume(f32),
}

/// Records every call and lets the test decide when tracks end.
#[derive(Default)]
pub struct FakeOutput {
    events: Mutex<Vec<OutputEvent>>,
    active: Mutex<Option<CompletionSignal>>,
    refused: Mutex<HashSet<String>>,
    deferred: Mutex<Option<Vec<CompletionSignal>>>,
}

impl FakeOutput {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `play` fails for tracks with this title.
    pub fn refuse(&self, title: &str) {
        self.refused.lock().insert(title.to_string());
    }

    /// Stopped tracks report their completion only on [`FakeOutput::release_stopped`].
    pub fn defer_stops(&self) {
        *self.deferred.lock() = Some(Vec::new());
    }

    pub fn release_stopped(&self) -> usize {
        let parked = self
            .deferred
            .lock()
            .as_mut()
            .map(std::mem::take)
            .unwrap_or_default();
        let count = parked.len();
        for signal in parked {
            signal.complete(PlaybackOutcome::Finished);
        }
        count
    }

    /// Ends the active track naturally. Returns `false` if nothing was active.
    pub fn finish(&self) -> bool {
        self.complete_active(PlaybackOutcome::Finished)
    }

    pub fn fail(&self, reason: &str) -> bool {
        self.complete_active(PlaybackOutcome::Failed(reason.to_string()))
    }

    pub fn events(&self) -> Vec<OutputEvent> {
        self.events.lock().clone()
    }

    /// Titles of every track that started, in order.
    pub fn played(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                OutputEvent::Play { title, .. } => Some(title.clone()),
                _ => None,
            })
            .collect()
    }

    fn complete_active(&self, outcome: PlaybackOutcome) -> bool {
        let signal = self.active.lock().take();
        match signal {
            Some(signal) => {
                signal.complete(outcome);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl AudioOutput for FakeOutput {
    async fn play(
        &self,
        track: &Track,
        volume: f32,
        completion: CompletionSignal,
    ) -> Result<(), BotError> {
        if self.refused.lock().contains(track.title()) {
            return Err(BotError::playback(format!("cannot decode {}", track.title())));
        }

        self.events.lock().push(OutputEvent::Play {
            title: track.title().to_string(),
            volume,
        });
        *self.active.lock() = Some(completion);
        Ok(())
    }

    async fn stop(&self) {
        self.events.lock().push(OutputEvent::Stop);

        let Some(signal) = self.active.lock().take() else {
            return;
        };
        let mut deferred = self.deferred.lock();
        match deferred.as_mut() {
            Some(parked) => parked.push(signal),
            None => signal.complete(PlaybackOutcome::Finished),
        }
    }

    async fn pause(&self) {
        self.events.lock().push(OutputEvent::Pause);
    }

    async fn resume(&self) {
        self.events.lock().push(OutputEvent::Resume);
    }

    async fn set_volume(&self, volume: f32) {
        self.events.lock().push(OutputEvent::Volume(volume));
    }
}
