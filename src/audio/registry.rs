use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::info;

use super::{notifier::ChatNotifier, player::GuildPlayer};

/// Defaults applied to every newly created guild player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerSettings {
    /// Linear volume factor for tracks before anyone changes it.
    pub default_volume: f32,
    pub max_queue_size: usize,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            default_volume: 0.5,
            max_queue_size: 1000,
        }
    }
}

/// Maps each guild to its own player, created on first use.
///
/// Lookups for different guilds never contend on a shared lock, and two
/// concurrent first uses of the same guild still end up with one player.
pub struct GuildRegistry {
    players: DashMap<GuildId, GuildPlayer>,
    settings: PlayerSettings,
    notifier: Arc<dyn ChatNotifier>,
}

impl GuildRegistry {
    pub fn new(settings: PlayerSettings, notifier: Arc<dyn ChatNotifier>) -> Self {
        Self {
            players: DashMap::new(),
            settings,
            notifier,
        }
    }

    pub fn get_or_create(&self, guild_id: GuildId) -> GuildPlayer {
        self.players
            .entry(guild_id)
            .or_insert_with(|| {
                info!("🎛️ Creating player for guild {}", guild_id);
                GuildPlayer::spawn(guild_id, self.settings, self.notifier.clone())
            })
            .clone()
    }

    /// Looks up an existing player without creating one.
    pub fn get(&self, guild_id: GuildId) -> Option<GuildPlayer> {
        self.players.get(&guild_id).map(|player| player.clone())
    }

    pub fn guild_ids(&self) -> Vec<GuildId> {
        self.players.iter().map(|entry| *entry.key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{track, RecordingNotifier};

    fn registry(settings: PlayerSettings) -> GuildRegistry {
        GuildRegistry::new(settings, RecordingNotifier::new())
    }

    #[tokio::test]
    async fn test_get_or_create_returns_same_player() {
        let registry = registry(PlayerSettings::default());
        let guild = GuildId::new(42);
        assert!(registry.get(guild).is_none());

        let first = registry.get_or_create(guild);
        first.enqueue(track("A")).await.unwrap();

        let second = registry.get_or_create(guild);
        assert_eq!(registry.guild_ids(), vec![guild]);
        assert_eq!(second.snapshot(10).await.unwrap().pending_total, 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_creates_one_player() {
        let registry = Arc::new(registry(PlayerSettings::default()));
        let guild = GuildId::new(7);

        let tasks: Vec<_> = (0..16)
            .map(|n| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry
                        .get_or_create(guild)
                        .enqueue(track(&format!("Song {n}")))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(registry.guild_ids(), vec![guild]);
        let snapshot = registry.get(guild).unwrap().snapshot(100).await.unwrap();
        assert_eq!(snapshot.pending_total, 16);
    }

    #[tokio::test]
    async fn test_guilds_get_separate_players() {
        let registry = registry(PlayerSettings {
            default_volume: 0.5,
            max_queue_size: 1,
        });
        let first = registry.get_or_create(GuildId::new(1));
        let second = registry.get_or_create(GuildId::new(2));

        first.enqueue(track("A")).await.unwrap();
        // The other guild's limit is untouched
        second.enqueue(track("B")).await.unwrap();
        assert!(first.enqueue(track("C")).await.is_err());

        let mut ids = registry.guild_ids();
        ids.sort();
        assert_eq!(ids, vec![GuildId::new(1), GuildId::new(2)]);
        assert!(registry.get(GuildId::new(3)).is_none());
    }
}
