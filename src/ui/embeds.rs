use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::bot::service::{EmbedKind, EmbedReply};

/// Colour palette shared by every embed.
pub mod colors {
    use serenity::all::Colour;

    pub const MUSIC_GREEN: Colour = Colour::new(0x00ff00);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
}

const STANDARD_FOOTER: &str = "🎵 Voice Queue Bot";

/// Builds the Discord embed for a command reply.
pub fn render(reply: &EmbedReply) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title(&reply.title)
        .color(colour_for(reply.kind));

    if let Some(description) = &reply.description {
        embed = embed.description(description);
    }

    for (name, value) in &reply.fields {
        embed = embed.field(name, value, false);
    }

    embed
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

fn colour_for(kind: EmbedKind) -> serenity::all::Colour {
    match kind {
        EmbedKind::Queue => colors::MUSIC_GREEN,
        EmbedKind::Help => colors::INFO_BLUE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_keeps_fields_in_order() {
        let reply = EmbedReply {
            kind: EmbedKind::Queue,
            title: "Music Queue".to_string(),
            description: Some("1. A\n2. B".to_string()),
            fields: vec![("Now Playing".to_string(), "Intro".to_string())],
        };

        let json = serde_json::to_value(render(&reply)).unwrap();
        assert_eq!(json["title"], "Music Queue");
        assert_eq!(json["description"], "1. A\n2. B");
        assert_eq!(json["color"], 0x00ff00);
        assert_eq!(json["fields"][0]["name"], "Now Playing");
        assert_eq!(json["fields"][0]["value"], "Intro");
        assert_eq!(json["fields"][0]["inline"], false);
    }

    #[test]
    fn test_colour_follows_kind_not_title() {
        let reply = EmbedReply {
            kind: EmbedKind::Help,
            title: "Music Queue".to_string(),
            description: None,
            fields: Vec::new(),
        };

        let json = serde_json::to_value(render(&reply)).unwrap();
        assert_eq!(json["color"], 0x3490dc);
    }
}
