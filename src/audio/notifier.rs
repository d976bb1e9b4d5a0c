use serenity::model::id::ChannelId;

/// Posts short messages to a text channel.
///
/// Called from inside a guild's controller task, so implementations must not
/// block: hand the send off and return.
pub trait ChatNotifier: Send + Sync {
    fn send_text(&self, channel_id: ChannelId, text: String);
}
