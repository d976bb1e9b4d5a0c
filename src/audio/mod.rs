//! # Audio Module
//!
//! Per-guild playback queues and the chaining that moves from one track to
//! the next.
//!
//! ## Architecture
//!
//! ### [`player`] - Guild Controller
//! - One task per guild owns that guild's queue and playback state
//! - Commands and track completions arrive through the same mailbox, so
//!   they are handled strictly one after another
//! - A skip only stops the output; the resulting completion advances
//!
//! ### [`queue`] - Queue State
//! - Strict FIFO pending list plus the current track
//! - Bounded size, snapshots for listings
//!
//! ### [`output`] - Output Seam
//! - [`output::AudioOutput`] abstracts the voice transport
//! - [`output::CompletionSignal`] reports the end of each started track once
//!
//! ### [`notifier`] - Announcements
//! - [`notifier::ChatNotifier`] posts "Now playing" when the queue moves on
//!   without a command
//!
//! ### [`registry`] - Guild Registry
//! - Lazily creates one [`player::GuildPlayer`] per guild
//!
//! ### [`songbird_output`] - Voice Transport
//! - Plays tracks on a songbird call and wires track events to completion
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use serenity::all::GuildId;
//! # async fn example(
//! #     output: Arc<dyn AudioOutput>,
//! #     notifier: Arc<dyn ChatNotifier>,
//! #     track: Track,
//! # ) -> Result<(), BotError> {
//! let registry = GuildRegistry::new(PlayerSettings::default(), notifier);
//! let player = registry.get_or_create(GuildId::new(123456789));
//!
//! player.attach_output(output).await?;
//! player.enqueue(track).await?;
//! player.skip().await?;
//! # Ok(())
//! # }
//! ```

pub mod notifier;
pub mod output;
pub mod player;
pub mod queue;
pub mod registry;
pub mod songbird_output;

#[cfg(test)]
pub mod testing;
