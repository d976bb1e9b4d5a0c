use std::collections::VecDeque;
use tracing::{debug, info};

use crate::{error::BotError, sources::Track};

/// Where a guild's playback state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

/// Pending tracks plus the one bound to the output.
///
/// Only the guild's controller task touches this, so it needs no locking.
#[derive(Debug)]
pub struct GuildQueueState {
    pending: VecDeque<Track>,
    current: Option<Track>,
    max_size: usize,
}

impl GuildQueueState {
    pub fn new(max_size: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            current: None,
            max_size,
        }
    }

    /// Appends a track and returns its 1-based position in `pending`.
    pub fn push(&mut self, track: Track) -> Result<usize, BotError> {
        if self.pending.len() >= self.max_size {
            return Err(BotError::validation(format!(
                "The queue is full (maximum {} songs)",
                self.max_size
            )));
        }

        info!("➕ Added to queue: {}", track.title());
        self.pending.push_back(track);
        Ok(self.pending.len())
    }

    /// Moves the head of `pending` into `current` (strict FIFO).
    pub fn promote_next(&mut self) -> Option<Track> {
        let next = self.pending.pop_front();
        match &next {
            Some(track) => debug!("➡️ Next in queue: {}", track.title()),
            None => debug!("📭 Queue is empty"),
        }
        self.current = next.clone();
        next
    }

    /// Drops the current track once its playback is over.
    pub fn finish_current(&mut self) -> Option<Track> {
        self.current.take()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.current = None;
        info!("🗑️ Queue cleared");
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Copies out what listings need: current, the first `limit` pending
    /// tracks, and the full pending count.
    pub fn snapshot(&self, state: PlaybackState, limit: usize) -> QueueSnapshot {
        QueueSnapshot {
            state,
            current: self.current.clone(),
            upcoming: self.pending.iter().take(limit).cloned().collect(),
            pending_total: self.pending.len(),
        }
    }
}

/// Point-in-time view of a guild's queue.
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub state: PlaybackState,
    pub current: Option<Track>,
    pub upcoming: Vec<Track>,
    pub pending_total: usize,
}

impl QueueSnapshot {
    pub fn upcoming_titles(&self) -> Vec<&str> {
        self.upcoming.iter().map(Track::title).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(n: u32) -> Track {
        Track::resolved(format!("Song {n}"), format!("https://cdn.example/{n}"))
    }

    #[test]
    fn test_promote_is_fifo() {
        let mut queue = GuildQueueState::new(10);
        for n in 1..=3 {
            queue.push(track(n)).unwrap();
        }

        let order: Vec<String> = std::iter::from_fn(|| queue.promote_next())
            .map(|t| t.title().to_string())
            .collect();
        assert_eq!(order, vec!["Song 1", "Song 2", "Song 3"]);
        assert!(queue.current().is_none());
    }

    #[test]
    fn test_push_reports_position() {
        let mut queue = GuildQueueState::new(10);
        assert_eq!(queue.push(track(1)).unwrap(), 1);
        assert_eq!(queue.push(track(2)).unwrap(), 2);
        queue.promote_next();
        assert_eq!(queue.push(track(3)).unwrap(), 2);
    }

    #[test]
    fn test_push_rejects_when_full() {
        let mut queue = GuildQueueState::new(2);
        queue.push(track(1)).unwrap();
        queue.push(track(2)).unwrap();
        assert!(matches!(queue.push(track(3)), Err(BotError::Validation(_))));
        assert_eq!(queue.pending_len(), 2);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut queue = GuildQueueState::new(10);
        queue.push(track(1)).unwrap();
        queue.push(track(2)).unwrap();
        queue.promote_next();
        assert!(queue.current().is_some());
        assert_eq!(queue.pending_len(), 1);

        queue.clear();
        assert_eq!(queue.pending_len(), 0);
        assert!(queue.current().is_none());
    }

    #[test]
    fn test_snapshot_truncates_upcoming() {
        let mut queue = GuildQueueState::new(100);
        for n in 1..=13 {
            queue.push(track(n)).unwrap();
        }
        queue.promote_next();

        let snapshot = queue.snapshot(PlaybackState::Playing, 10);
        assert_eq!(snapshot.current.as_ref().map(Track::title), Some("Song 1"));
        assert_eq!(snapshot.pending_total, 12);
        assert_eq!(snapshot.upcoming.len(), 10);
        assert_eq!(snapshot.upcoming_titles().first(), Some(&"Song 2"));
        assert_eq!(snapshot.upcoming_titles().last(), Some(&"Song 11"));
    }
}
