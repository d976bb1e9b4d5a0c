use serenity::{builder::CreateMessage, http::Http, model::id::ChannelId};
use std::sync::Arc;
use tracing::warn;

use crate::audio::notifier::ChatNotifier;

/// Sends announcements through the Discord REST API.
pub struct SerenityNotifier {
    http: Arc<Http>,
}

impl SerenityNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

impl ChatNotifier for SerenityNotifier {
    fn send_text(&self, channel_id: ChannelId, text: String) {
        let http = self.http.clone();
        tokio::spawn(async move {
            let message = CreateMessage::new().content(text);
            if let Err(e) = channel_id.send_message(&*http, message).await {
                warn!("Could not post to channel {}: {:?}", channel_id, e);
            }
        });
    }
}
