use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::{CommandData, CommandDataOptionValue, CommandInteraction},
        id::{GuildId, UserId},
    },
    prelude::Context,
};
use tracing::info;

use super::{
    service::{AttachmentRef, Invocation, MusicCommand, Reply, VoiceChannelRef},
    QueueBot,
};
use crate::ui::embeds;

/// Handles a slash command: one command, one reply.
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &QueueBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Command used outside a server"))?;

    info!(
        "📝 /{} used by {} in guild {}",
        command.data.name, command.user.name, guild_id
    );

    let Some(music_command) = parse_command(&command.data) else {
        command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content("❌ Unknown command")
                        .ephemeral(true),
                ),
            )
            .await?;
        return Ok(());
    };

    let invocation = Invocation {
        guild_id,
        text_channel: command.channel_id,
        caller_channel: caller_voice_channel(ctx, guild_id, command.user.id),
    };

    if music_command.is_slow() {
        // Joining and resolving can outlast the initial response window
        command.defer(&ctx.http).await?;
        let reply = bot.service.execute(&invocation, music_command).await;
        command.edit_response(&ctx.http, edit_for(reply)).await?;
    } else {
        let reply = bot.service.execute(&invocation, music_command).await;
        command
            .create_response(&ctx.http, CreateInteractionResponse::Message(message_for(reply)))
            .await?;
    }

    Ok(())
}

fn parse_command(data: &CommandData) -> Option<MusicCommand> {
    let command = match data.name.as_str() {
        "join" => MusicCommand::Join,
        "leave" => MusicCommand::Leave,
        "play" => {
            let query = data
                .options
                .iter()
                .find(|opt| opt.name == "query")
                .and_then(|opt| opt.value.as_str())?;
            MusicCommand::Play(query.to_string())
        }
        "file" => MusicCommand::File(attachment_option(data, "audio")),
        "skip" => MusicCommand::Skip,
        "queue" => MusicCommand::Queue,
        "clear" => MusicCommand::Clear,
        "pause" => MusicCommand::Pause,
        "resume" => MusicCommand::Resume,
        "stop" => MusicCommand::Stop,
        "volume" => {
            let level = data
                .options
                .iter()
                .find(|opt| opt.name == "level")
                .and_then(|opt| opt.value.as_i64())?;
            MusicCommand::Volume(level)
        }
        "help" => MusicCommand::Help,
        _ => return None,
    };
    Some(command)
}

fn attachment_option(data: &CommandData, name: &str) -> Option<AttachmentRef> {
    let option = data.options.iter().find(|opt| opt.name == name)?;
    let CommandDataOptionValue::Attachment(id) = &option.value else {
        return None;
    };
    let attachment = data.resolved.attachments.get(id)?;

    Some(AttachmentRef {
        filename: attachment.filename.clone(),
        url: attachment.url.clone(),
    })
}

/// The caller's voice channel according to the gateway cache.
fn caller_voice_channel(
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
) -> Option<VoiceChannelRef> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    let id = guild.voice_states.get(&user_id)?.channel_id?;
    let name = guild
        .channels
        .get(&id)
        .map(|channel| channel.name.clone())
        .unwrap_or_else(|| id.to_string());

    Some(VoiceChannelRef { id, name })
}

fn message_for(reply: Reply) -> CreateInteractionResponseMessage {
    match reply {
        Reply::Text(text) => CreateInteractionResponseMessage::new().content(text),
        Reply::Embed(embed) => CreateInteractionResponseMessage::new().embed(embeds::render(&embed)),
    }
}

fn edit_for(reply: Reply) -> EditInteractionResponse {
    match reply {
        Reply::Text(text) => EditInteractionResponse::new().content(text),
        Reply::Embed(embed) => EditInteractionResponse::new().embed(embeds::render(&embed)),
    }
}
