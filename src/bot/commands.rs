use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

/// Registers the slash commands globally.
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registers the slash commands for one guild (development).
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

fn all_commands() -> Vec<CreateCommand> {
    vec![
        join_command(),
        leave_command(),
        play_command(),
        file_command(),
        skip_command(),
        queue_command(),
        clear_command(),
        pause_command(),
        resume_command(),
        stop_command(),
        volume_command(),
        help_command(),
    ]
}

// Voice connection

fn join_command() -> CreateCommand {
    CreateCommand::new("join").description("Join your voice channel")
}

fn leave_command() -> CreateCommand {
    CreateCommand::new("leave").description("Leave the voice channel")
}

// Playback

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Play from YouTube/Facebook or search")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "query", "URL or search terms")
                .required(true),
        )
}

fn file_command() -> CreateCommand {
    CreateCommand::new("file")
        .description("Play an uploaded audio file")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Attachment,
                "audio",
                "mp3, wav, ogg, m4a or flac file",
            )
            .required(true),
        )
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Skip the current song")
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pause the current song")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Resume the paused song")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Stop playing and clear the queue")
}

fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Set the playback volume")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "level", "Volume (0-100)")
                .required(true),
        )
}

// Queue

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue").description("Show the current queue")
}

fn clear_command() -> CreateCommand {
    CreateCommand::new("clear").description("Clear the queue")
}

fn help_command() -> CreateCommand {
    CreateCommand::new("help").description("Show the music commands")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_command_is_registered_once() {
        let names: Vec<String> = all_commands()
            .iter()
            .map(|command| {
                serde_json::to_value(command).unwrap()["name"]
                    .as_str()
                    .unwrap()
                    .to_string()
            })
            .collect();

        let mut unique = names.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(names.len(), 12);
        assert_eq!(unique.len(), names.len());
        assert!(names.iter().any(|name| name == "file"));
    }
}
