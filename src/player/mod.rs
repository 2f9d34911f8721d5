pub mod driver;
pub mod queue;
pub mod registry;
pub mod session;
pub mod voice;

#[cfg(test)]
pub(crate) mod test_util;

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::sync::Arc;
use thiserror::Error;

use crate::sources::{ResolveError, SourceResolver, TrackDescriptor};
use driver::VoiceDriver;
use queue::QueueFull;
use registry::SessionRegistry;
use session::SessionContext;

/// Resultado de un `play` aceptado
#[derive(Debug, Clone, PartialEq)]
pub struct PlayOutcome {
    pub title: String,
    /// Posición 1-based entre las pendientes al encolar
    pub position: usize,
    /// `true` si esta petición arrancó la reproducción (no había nada sonando)
    pub started: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipOutcome {
    Skipped { title: String },
    NothingPlaying,
}

/// Foto de la cola de un guild para mostrarla
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub current: Option<TrackDescriptor>,
    pub pending: Vec<TrackDescriptor>,
}

#[derive(Debug, Error)]
pub enum PlayError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("no se pudo conectar al canal de voz: {reason}")]
    VoiceJoinFailed { reason: String },
    #[error(transparent)]
    QueueFull(#[from] QueueFull),
    #[error("la reproducción se desconectó antes de poder encolar la pista")]
    SessionClosed,
}

/// Avisos de una línea al canal de texto de origen (fallos de pista y
/// similares). La implementación real habla con el HTTP de Discord.
#[async_trait]
pub trait ChannelNotifier: Send + Sync + 'static {
    async fn notify(&self, channel: ChannelId, message: String);
}

/// Fachada del reproductor para la capa de comandos: resuelve fuentes y
/// delega cada operación en la sesión del guild correspondiente.
pub struct PlayerService {
    registry: Arc<SessionRegistry>,
    resolver: Arc<dyn SourceResolver>,
    driver: Arc<dyn VoiceDriver>,
    notifier: Arc<dyn ChannelNotifier>,
    max_queue_size: usize,
}

impl PlayerService {
    pub fn new(
        registry: Arc<SessionRegistry>,
        resolver: Arc<dyn SourceResolver>,
        driver: Arc<dyn VoiceDriver>,
        notifier: Arc<dyn ChannelNotifier>,
        max_queue_size: usize,
    ) -> Self {
        Self {
            registry,
            resolver,
            driver,
            notifier,
            max_queue_size,
        }
    }

    /// Resuelve `query` y encola la pista en la sesión del guild,
    /// creándola si no existe. La resolución (I/O lenta) corre fuera de
    /// la sección crítica de la sesión.
    pub async fn play(
        &self,
        guild_id: GuildId,
        requester: UserId,
        text_channel: ChannelId,
        voice_channel: ChannelId,
        query: &str,
    ) -> Result<PlayOutcome, PlayError> {
        // capturar la sesión ANTES de resolver: si una desconexión gana la
        // carrera mientras resolvemos, el resultado se descarta en lugar de
        // levantar una sesión nueva; y si la resolución falla, no queda
        // ninguna sesión vacía creada a medias
        let existing = self.registry.get(guild_id);

        let track = self.resolver.resolve(query, requester).await?;

        let session = match existing {
            Some(session) => session,
            None => {
                let context = SessionContext {
                    guild_id,
                    text_channel,
                    voice_channel,
                    max_queue_size: self.max_queue_size,
                    driver: self.driver.clone(),
                    notifier: self.notifier.clone(),
                    registry: self.registry.clone(),
                };
                self.registry
                    .get_or_create(guild_id, move |session_id| {
                        session::spawn(context, session_id)
                    })
            }
        };

        session.play(track).await
    }

    pub async fn skip(&self, guild_id: GuildId) -> SkipOutcome {
        match self.registry.get(guild_id) {
            Some(session) => session
                .skip()
                .await
                .unwrap_or(SkipOutcome::NothingPlaying),
            None => SkipOutcome::NothingPlaying,
        }
    }

    /// Idempotente: desconectar un guild sin sesión no hace nada
    pub async fn disconnect(&self, guild_id: GuildId) {
        if let Some(session) = self.registry.get(guild_id) {
            session.disconnect().await;
        }
    }

    pub async fn queue_snapshot(&self, guild_id: GuildId) -> Option<QueueSnapshot> {
        match self.registry.get(guild_id) {
            Some(session) => session.queue_snapshot().await,
            None => None,
        }
    }

    pub async fn now_playing(&self, guild_id: GuildId) -> Option<TrackDescriptor> {
        match self.registry.get(guild_id) {
            Some(session) => session.now_playing().await,
            None => None,
        }
    }
}
