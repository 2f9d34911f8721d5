use anyhow::Result;
use serenity::{
    builder::{CreateMessage, EditMessage},
    model::channel::Message,
    prelude::Context,
};
use tracing::{error, warn};

use crate::{
    bot::{commands::Command, OndaBot},
    player::{PlayError, SkipOutcome},
    ui::embeds,
};

/// Límite práctico por mensaje de Discord, con margen
const MAX_MESSAGE_CHARS: usize = 1900;

pub async fn dispatch(
    ctx: &Context,
    msg: &Message,
    bot: &OndaBot,
    command: Command<'_>,
) -> Result<()> {
    match command {
        Command::Play { query } => handle_play(ctx, msg, bot, query).await,
        Command::Skip => handle_skip(ctx, msg, bot).await,
        Command::Stop => handle_stop(ctx, msg, bot).await,
        Command::Queue => handle_queue(ctx, msg, bot).await,
        Command::NowPlaying => handle_nowplaying(ctx, msg, bot).await,
        Command::Chat { prompt } => handle_chat(ctx, msg, bot, prompt).await,
        Command::ClearChat => handle_clearchat(ctx, msg, bot).await,
        Command::Help => handle_help(ctx, msg, bot).await,
    }
}

async fn handle_play(ctx: &Context, msg: &Message, bot: &OndaBot, query: &str) -> Result<()> {
    let Some(guild_id) = msg.guild_id else {
        check_msg(
            msg.reply(&ctx.http, "❌ Este comando solo funciona dentro de un servidor")
                .await,
        );
        return Ok(());
    };

    // canal de voz del autor, sin retener la guardia del caché a través de awaits
    let voice_channel = {
        ctx.cache.guild(guild_id).and_then(|guild| {
            guild
                .voice_states
                .get(&msg.author.id)
                .and_then(|voice_state| voice_state.channel_id)
        })
    };

    let Some(voice_channel) = voice_channel else {
        check_msg(
            msg.reply(
                &ctx.http,
                "🔇 Tienes que estar en un canal de voz para pedir música",
            )
            .await,
        );
        return Ok(());
    };

    let progress = msg
        .channel_id
        .say(&ctx.http, format!("🔍 Buscando **{query}**…"))
        .await;

    let text = match bot
        .player
        .play(guild_id, msg.author.id, msg.channel_id, voice_channel, query)
        .await
    {
        Ok(outcome) if outcome.started => {
            format!("🎵 Reproduciendo ahora: **{}**", outcome.title)
        }
        Ok(outcome) => format!(
            "➕ En cola (posición #{}): **{}**",
            outcome.position, outcome.title
        ),
        Err(err) => play_error_text(err),
    };

    match progress {
        Ok(mut progress) => {
            if let Err(why) = progress
                .edit(&ctx.http, EditMessage::new().content(text))
                .await
            {
                warn!("Error al editar mensaje de progreso: {why:?}");
            }
        }
        Err(_) => check_msg(msg.channel_id.say(&ctx.http, text).await),
    }

    Ok(())
}

fn play_error_text(err: PlayError) -> String {
    match err {
        PlayError::Resolve(e) => format!("❌ {e}"),
        PlayError::VoiceJoinFailed { reason } => {
            format!("❌ No pude entrar al canal de voz: {reason}")
        }
        PlayError::QueueFull(e) => format!("🚫 {e}"),
        PlayError::SessionClosed => {
            "⚠️ La reproducción se desconectó mientras buscaba; vuelve a intentarlo".to_string()
        }
    }
}

async fn handle_skip(ctx: &Context, msg: &Message, bot: &OndaBot) -> Result<()> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };

    let text = match bot.player.skip(guild_id).await {
        SkipOutcome::Skipped { title } => format!("⏭️ Saltada: **{title}**"),
        SkipOutcome::NothingPlaying => "❌ No hay nada que saltar".to_string(),
    };
    check_msg(msg.channel_id.say(&ctx.http, text).await);

    Ok(())
}

async fn handle_stop(ctx: &Context, msg: &Message, bot: &OndaBot) -> Result<()> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };

    bot.player.disconnect(guild_id).await;
    check_msg(
        msg.channel_id
            .say(&ctx.http, "👋 Cola vaciada y desconectado del canal de voz")
            .await,
    );

    Ok(())
}

async fn handle_queue(ctx: &Context, msg: &Message, bot: &OndaBot) -> Result<()> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };

    match bot.player.queue_snapshot(guild_id).await {
        Some(snapshot) if !(snapshot.current.is_none() && snapshot.pending.is_empty()) => {
            let embed = embeds::create_queue_embed(&snapshot);
            check_msg(
                msg.channel_id
                    .send_message(&ctx.http, CreateMessage::new().embed(embed))
                    .await,
            );
        }
        _ => check_msg(msg.channel_id.say(&ctx.http, "📜 La cola está vacía").await),
    }

    Ok(())
}

async fn handle_nowplaying(ctx: &Context, msg: &Message, bot: &OndaBot) -> Result<()> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };

    match bot.player.now_playing(guild_id).await {
        Some(track) => {
            let embed = embeds::create_now_playing_embed(&track);
            check_msg(
                msg.channel_id
                    .send_message(&ctx.http, CreateMessage::new().embed(embed))
                    .await,
            );
        }
        None => check_msg(
            msg.channel_id
                .say(&ctx.http, "❌ No suena nada ahora mismo")
                .await,
        ),
    }

    Ok(())
}

async fn handle_chat(ctx: &Context, msg: &Message, bot: &OndaBot, prompt: &str) -> Result<()> {
    let Some(chat) = bot.chat.as_ref() else {
        check_msg(
            msg.reply(&ctx.http, "🤖 El chat IA no está configurado en este bot")
                .await,
        );
        return Ok(());
    };

    let _ = msg.channel_id.broadcast_typing(&ctx.http).await;

    let context = chat.manager.context_for(msg.author.id, prompt);
    match chat.client.complete(&context).await {
        Ok(answer) => {
            chat.manager.record_exchange(msg.author.id, prompt, &answer);
            for chunk in split_message(&answer) {
                check_msg(msg.channel_id.say(&ctx.http, chunk).await);
            }
        }
        Err(e) => {
            error!("Error del chat IA: {e:?}");
            check_msg(
                msg.reply(&ctx.http, "⚠️ El asistente no respondió, inténtalo más tarde")
                    .await,
            );
        }
    }

    Ok(())
}

async fn handle_clearchat(ctx: &Context, msg: &Message, bot: &OndaBot) -> Result<()> {
    let Some(chat) = bot.chat.as_ref() else {
        check_msg(
            msg.reply(&ctx.http, "🤖 El chat IA no está configurado en este bot")
                .await,
        );
        return Ok(());
    };

    let text = if chat.manager.clear(msg.author.id) {
        "🧹 Historial de conversación borrado"
    } else {
        "📭 No había historial que borrar"
    };
    check_msg(msg.reply(&ctx.http, text).await);

    Ok(())
}

async fn handle_help(ctx: &Context, msg: &Message, bot: &OndaBot) -> Result<()> {
    check_msg(
        msg.channel_id
            .say(&ctx.http, embeds::help_text(&bot.config.command_prefix))
            .await,
    );
    Ok(())
}

/// Trocea una respuesta larga respetando el límite de Discord
fn split_message(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if current.chars().count() >= MAX_MESSAGE_CHARS {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Si un mensaje no se pudo enviar, solo se deja constancia en el log
fn check_msg(result: serenity::Result<Message>) {
    if let Err(why) = result {
        warn!("Error al enviar mensaje: {why:?}");
    }
}
