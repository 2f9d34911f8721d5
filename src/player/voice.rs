use async_trait::async_trait;
use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{Input, YoutubeDl},
    tracks::TrackHandle,
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use super::driver::{DriverError, StreamEnded, StreamToken, VoiceDriver, VoiceJoinError};
use super::ChannelNotifier;
use crate::sources::TrackDescriptor;

/// Driver de producción sobre songbird: una `Call` por guild y el input
/// de yt-dlp integrado para convertir el localizador en audio.
pub struct SongbirdDriver {
    manager: Arc<Songbird>,
    http_client: reqwest::Client,
    calls: DashMap<GuildId, Arc<Mutex<Call>>>,
    current_tracks: DashMap<GuildId, TrackHandle>,
}

impl SongbirdDriver {
    pub fn new(manager: Arc<Songbird>, http_client: reqwest::Client) -> Self {
        Self {
            manager,
            http_client,
            calls: DashMap::new(),
            current_tracks: DashMap::new(),
        }
    }
}

#[async_trait]
impl VoiceDriver for SongbirdDriver {
    async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), VoiceJoinError> {
        match self.manager.join(guild_id, channel_id).await {
            Ok(call) => {
                self.calls.insert(guild_id, call);
                info!(
                    "🔊 Conectado al canal de voz {} en guild {}",
                    channel_id, guild_id
                );
                Ok(())
            }
            Err(e) => {
                // permisos, canal lleno o timeout de gateway: todos acaban aquí
                error!("Error al conectar a voz en guild {}: {:?}", guild_id, e);
                Err(VoiceJoinError {
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn start(
        &self,
        guild_id: GuildId,
        track: &TrackDescriptor,
        signals: mpsc::UnboundedSender<StreamEnded>,
    ) -> Result<StreamToken, DriverError> {
        let call = self
            .calls
            .get(&guild_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| DriverError::StartFailed("sin conexión de voz activa".to_string()))?;

        let token = StreamToken::next();
        let input: Input =
            YoutubeDl::new(self.http_client.clone(), track.stream_locator.clone()).into();

        let track_handle = {
            let mut handler = call.lock().await;
            handler.play_input(input)
        };

        let registered = track_handle
            .add_event(
                Event::Track(TrackEvent::End),
                StreamEndNotifier {
                    token,
                    signals: signals.clone(),
                },
            )
            .and_then(|_| {
                track_handle.add_event(
                    Event::Track(TrackEvent::Error),
                    StreamErrorNotifier { token, signals },
                )
            });

        if let Err(e) = registered {
            let _ = track_handle.stop();
            return Err(DriverError::StartFailed(format!(
                "no se pudieron registrar los eventos del stream: {e}"
            )));
        }

        self.current_tracks.insert(guild_id, track_handle);
        debug!("▶️ Stream arrancado en guild {}", guild_id);
        Ok(token)
    }

    async fn stop(&self, guild_id: GuildId) {
        if let Some((_, track)) = self.current_tracks.remove(&guild_id) {
            let _ = track.stop();
        }
    }

    async fn leave(&self, guild_id: GuildId) -> Result<(), DriverError> {
        self.current_tracks.remove(&guild_id);
        self.calls.remove(&guild_id);
        self.manager
            .remove(guild_id)
            .await
            .map_err(|e| DriverError::LeaveFailed(e.to_string()))
    }
}

/// Reenvía el fin normal del stream a la sesión dueña
struct StreamEndNotifier {
    token: StreamToken,
    signals: mpsc::UnboundedSender<StreamEnded>,
}

#[async_trait]
impl VoiceEventHandler for StreamEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        // la sesión puede haber muerto ya; un send fallido es inofensivo
        let _ = self.signals.send(StreamEnded {
            token: self.token,
            error: None,
        });
        None
    }
}

/// Reenvía un error de reproducción a la sesión dueña
struct StreamErrorNotifier {
    token: StreamToken,
    signals: mpsc::UnboundedSender<StreamEnded>,
}

#[async_trait]
impl VoiceEventHandler for StreamErrorNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let reason = match ctx {
            EventContext::Track(track_list) => track_list
                .iter()
                .map(|(state, _)| format!("{:?}", state.playing))
                .next()
                .unwrap_or_else(|| "error de reproducción".to_string()),
            _ => "error de reproducción".to_string(),
        };
        let _ = self.signals.send(StreamEnded {
            token: self.token,
            error: Some(reason),
        });
        None
    }
}

/// Notificador real: avisos de una línea por el HTTP de Discord
pub struct SerenityNotifier {
    http: Arc<serenity::http::Http>,
}

impl SerenityNotifier {
    pub fn new(http: Arc<serenity::http::Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ChannelNotifier for SerenityNotifier {
    async fn notify(&self, channel: ChannelId, message: String) {
        if let Err(why) = channel.say(&self.http, message).await {
            warn!("Error al enviar aviso al canal {}: {why:?}", channel);
        }
    }
}
