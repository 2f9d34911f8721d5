use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::player::QueueSnapshot;
use crate::sources::TrackDescriptor;

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎶 Onda Music";

/// Pistas pendientes listadas como máximo en el embed de cola
const MAX_LISTED: usize = 15;

/// Crea un embed para mostrar la pista actual
pub fn create_now_playing_embed(track: &TrackDescriptor) -> CreateEmbed {
    CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", track.title))
        .color(colors::SUCCESS_GREEN)
        .field("⏱️ Duración", format_duration(track.duration), true)
        .field(
            "👤 Solicitada por",
            format!("<@{}>", track.requested_by),
            true,
        )
        .url(&track.stream_locator)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed con la cola: la pista actual arriba y las pendientes
/// numeradas en orden de reproducción
pub fn create_queue_embed(snapshot: &QueueSnapshot) -> CreateEmbed {
    let mut description = String::new();

    if let Some(current) = &snapshot.current {
        description.push_str(&format!(
            "▶️ **{}** [{}]\n\n",
            current.title,
            format_duration(current.duration)
        ));
    }

    if snapshot.pending.is_empty() {
        description.push_str("No hay más pistas en espera");
    } else {
        for (index, track) in snapshot.pending.iter().take(MAX_LISTED).enumerate() {
            description.push_str(&format!(
                "`{}.` {} [{}]\n",
                index + 1,
                track.title,
                format_duration(track.duration)
            ));
        }
        if snapshot.pending.len() > MAX_LISTED {
            description.push_str(&format!(
                "… y {} más\n",
                snapshot.pending.len() - MAX_LISTED
            ));
        }
    }

    CreateEmbed::default()
        .title("📜 Cola de reproducción")
        .description(description)
        .color(colors::INFO_BLUE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Texto de ayuda con todos los comandos
pub fn help_text(prefix: &str) -> String {
    format!(
        "**Comandos disponibles:**\n\
        `{p}play <búsqueda o URL>` — Busca una pista y la pone en la cola\n\
        `{p}skip` — Salta la pista actual\n\
        `{p}queue` — Muestra la cola de reproducción\n\
        `{p}nowplaying` — Muestra lo que suena ahora\n\
        `{p}stop` — Vacía la cola y desconecta el bot del canal de voz\n\
        `{p}chat <mensaje>` — Habla con el asistente\n\
        `{p}clearchat` — Borra tu historial de conversación\n\
        `{p}help` — Muestra esta ayuda",
        p = prefix
    )
}

/// m:ss (o h:mm:ss); sin duración se asume transmisión en vivo
pub fn format_duration(duration: Option<Duration>) -> String {
    let Some(duration) = duration else {
        return "🔴 En vivo".to_string();
    };

    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}
